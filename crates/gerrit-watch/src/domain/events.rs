//! Gerrit stream events.
//!
//! Events arrive as loosely typed JSON objects. Anything missing the `type`
//! discriminator or the `change` object is rejected; every other field is read
//! leniently, so a field of the wrong shape becomes an empty string or `None`
//! instead of failing the whole event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::EventError;

/// Wire discriminators of the event types the table understands.
pub const PATCHSET_CREATED: &str = "patchset-created";
pub const COMMENT_ADDED: &str = "comment-added";
pub const CHANGE_MERGED: &str = "change-merged";
pub const CHANGE_RESTORED: &str = "change-restored";
pub const CHANGE_ABANDONED: &str = "change-abandoned";

/// A Gerrit account as it appears in events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(deserialize_with = "lenient::string")]
    pub username: String,
    #[serde(deserialize_with = "lenient::string")]
    pub email: String,
}

impl Account {
    /// Best available short name: username, then full name, then email.
    pub fn display_name(&self) -> &str {
        [&self.username, &self.name, &self.email]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// The change an event refers to. `url` is its identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Change {
    #[serde(deserialize_with = "lenient::string")]
    pub project: String,
    #[serde(deserialize_with = "lenient::string")]
    pub branch: String,
    #[serde(deserialize_with = "lenient::string")]
    pub subject: String,
    #[serde(deserialize_with = "lenient::string")]
    pub topic: String,
    #[serde(deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(deserialize_with = "lenient::object")]
    pub owner: Account,
}

/// Revision metadata. Timestamps are epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchSet {
    #[serde(deserialize_with = "lenient::epoch", skip_serializing_if = "Option::is_none")]
    pub created_on: Option<i64>,
    #[serde(deserialize_with = "lenient::epoch", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
}

impl PatchSet {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_on.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.last_updated.and_then(|s| DateTime::from_timestamp(s, 0))
    }
}

/// A vote attached to a comment. `value` is `None` when it did not parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Approval {
    #[serde(rename = "type", deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient::epoch")]
    pub value: Option<i64>,
}

impl Approval {
    pub fn new(kind: impl Into<String>, value: i64) -> Self {
        Self {
            kind: kind.into(),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PatchsetCreated {
    #[serde(deserialize_with = "lenient::object")]
    pub change: Change,
    #[serde(deserialize_with = "lenient::object")]
    pub patch_set: PatchSet,
    #[serde(deserialize_with = "lenient::object")]
    pub uploader: Account,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentAdded {
    #[serde(deserialize_with = "lenient::object")]
    pub change: Change,
    #[serde(deserialize_with = "lenient::string")]
    pub comment: String,
    #[serde(deserialize_with = "lenient::approvals")]
    pub approvals: Vec<Approval>,
    #[serde(deserialize_with = "lenient::object")]
    pub author: Account,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeMerged {
    #[serde(deserialize_with = "lenient::object")]
    pub change: Change,
    #[serde(deserialize_with = "lenient::object")]
    pub submitter: Account,
}

/// Shared shape of `change-restored` and `change-abandoned`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeReason {
    #[serde(deserialize_with = "lenient::object")]
    pub change: Change,
    #[serde(deserialize_with = "lenient::string")]
    pub reason: String,
}

/// Any well-formed event whose type has no mutation rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherEvent {
    #[serde(skip)]
    pub kind: String,
    #[serde(deserialize_with = "lenient::object")]
    pub change: Change,
}

/// One event from the stream, the replay log or the prefetch query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventRecord {
    PatchsetCreated(PatchsetCreated),
    CommentAdded(CommentAdded),
    ChangeMerged(ChangeMerged),
    ChangeRestored(ChangeReason),
    ChangeAbandoned(ChangeReason),
    Other(OtherEvent),
}

impl EventRecord {
    /// Decode a raw stream object.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let obj = value.as_object().ok_or(EventError::NotAnObject)?;
        let kind = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or(EventError::MissingType)?
            .to_owned();
        if !obj.get("change").is_some_and(Value::is_object) {
            return Err(EventError::MissingChange);
        }

        let decoded = match kind.as_str() {
            PATCHSET_CREATED => serde_json::from_value(value).map(Self::PatchsetCreated),
            COMMENT_ADDED => serde_json::from_value(value).map(Self::CommentAdded),
            CHANGE_MERGED => serde_json::from_value(value).map(Self::ChangeMerged),
            CHANGE_RESTORED => serde_json::from_value(value).map(Self::ChangeRestored),
            CHANGE_ABANDONED => serde_json::from_value(value).map(Self::ChangeAbandoned),
            _ => serde_json::from_value::<OtherEvent>(value).map(|mut other| {
                other.kind = kind.clone();
                Self::Other(other)
            }),
        };
        decoded.map_err(|source| EventError::Malformed { kind, source })
    }

    /// Decode one line of the record log.
    pub fn from_line(line: &str) -> Result<Self, EventError> {
        let value = serde_json::from_str(line).map_err(EventError::InvalidJson)?;
        Self::from_value(value)
    }

    /// Build a synthetic `patchset-created` from one `gerrit query` result row.
    ///
    /// Returns `None` for the trailing stats row and for rows without a url.
    pub fn from_query_result(row: &Value) -> Option<Self> {
        if row.get("type").and_then(Value::as_str) == Some("stats") {
            return None;
        }
        let change: Change = serde_json::from_value(row.clone()).ok()?;
        if change.url.is_empty() {
            return None;
        }
        let patch_set = PatchSet {
            created_on: row.get("createdOn").and_then(lenient::epoch_of),
            last_updated: row.get("lastUpdated").and_then(lenient::epoch_of),
        };
        let uploader = change.owner.clone();
        Some(Self::PatchsetCreated(PatchsetCreated {
            change,
            patch_set,
            uploader,
        }))
    }

    /// Wire discriminator, e.g. `comment-added`.
    pub fn kind(&self) -> &str {
        match self {
            Self::PatchsetCreated(_) => PATCHSET_CREATED,
            Self::CommentAdded(_) => COMMENT_ADDED,
            Self::ChangeMerged(_) => CHANGE_MERGED,
            Self::ChangeRestored(_) => CHANGE_RESTORED,
            Self::ChangeAbandoned(_) => CHANGE_ABANDONED,
            Self::Other(other) => &other.kind,
        }
    }

    pub fn change(&self) -> &Change {
        match self {
            Self::PatchsetCreated(e) => &e.change,
            Self::CommentAdded(e) => &e.change,
            Self::ChangeMerged(e) => &e.change,
            Self::ChangeRestored(e) | Self::ChangeAbandoned(e) => &e.change,
            Self::Other(e) => &e.change,
        }
    }

    /// Creation time of the patch set, for `patchset-created` only.
    pub fn patch_set_created_on(&self) -> Option<i64> {
        match self {
            Self::PatchsetCreated(e) => e.patch_set.created_on,
            _ => None,
        }
    }

    /// Encode back to the wire shape, `type` included.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = match self {
            Self::PatchsetCreated(e) => serde_json::to_value(e)?,
            Self::CommentAdded(e) => serde_json::to_value(e)?,
            Self::ChangeMerged(e) => serde_json::to_value(e)?,
            Self::ChangeRestored(e) | Self::ChangeAbandoned(e) => serde_json::to_value(e)?,
            Self::Other(e) => serde_json::to_value(e)?,
        };
        if let Value::Object(map) = &mut value {
            map.insert("type".to_owned(), Value::String(self.kind().to_owned()));
        }
        Ok(value)
    }
}

/// Deserializers that default instead of failing on a wrong shape.
mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::Approval;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            _ => String::new(),
        })
    }

    pub fn epoch<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(epoch_of(&Value::deserialize(d)?))
    }

    pub fn epoch_of(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn object<'de, D, T>(d: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(d)?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    pub fn approvals<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Approval>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}

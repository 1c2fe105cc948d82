//! Rows of the review table and their status.

use chrono::{DateTime, Utc};

use super::events::{Approval, PatchsetCreated};
use super::text::{truncate, COMMENT_WIDTH, SUBJECT_WIDTH};

/// Color class a renderer maps to a concrete style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    Neutral,
    Positive,
    Negative,
    Warning,
}

/// Lifecycle or review state shown in the status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReviewStatus {
    Open,
    Merged,
    Restored,
    Abandoned,
    Failed,
    Verified,
    Succeeded,
    Rejected,
    Approved,
}

impl ReviewStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Merged => "Merged",
            Self::Restored => "Restored",
            Self::Abandoned => "Abandoned",
            Self::Failed => "Failed",
            Self::Verified => "Verified",
            Self::Succeeded => "Succeeded",
            Self::Rejected => "Rejected",
            Self::Approved => "Approved",
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            Self::Open | Self::Restored => StatusClass::Neutral,
            Self::Merged | Self::Succeeded | Self::Approved => StatusClass::Positive,
            Self::Failed | Self::Rejected => StatusClass::Negative,
            Self::Abandoned | Self::Verified => StatusClass::Warning,
        }
    }

    /// Classify a single vote. `VRIF -1` means the verifier ran and reported.
    pub fn from_vote(kind: &str, value: i64) -> Option<Self> {
        match (kind, value) {
            ("VRIF", -2) => Some(Self::Failed),
            ("VRIF", -1) => Some(Self::Verified),
            ("VRIF", 2) => Some(Self::Succeeded),
            ("CRVW", -2) => Some(Self::Rejected),
            ("CRVW", 2) => Some(Self::Approved),
            _ => None,
        }
    }

    /// Status implied by a vote list; the last classifiable vote wins.
    pub fn from_approvals(approvals: &[Approval]) -> Option<Self> {
        approvals
            .iter()
            .filter_map(|a| a.value.and_then(|v| Self::from_vote(&a.kind, v)))
            .last()
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One tracked change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRow {
    pub username: String,
    pub topic: String,
    url: String,
    pub project: String,
    pub subject: String,
    pub created_on: Option<DateTime<Utc>>,
    pub updated_on: Option<DateTime<Utc>>,
    pub status: ReviewStatus,
    pub comment: String,
}

impl ReviewRow {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            username: String::new(),
            topic: String::new(),
            url: url.into(),
            project: String::new(),
            subject: String::new(),
            created_on: None,
            updated_on: None,
            status: ReviewStatus::Open,
            comment: String::new(),
        }
    }

    /// Row for a change seen for the first time. `now` backs a missing `lastUpdated`.
    pub fn from_patchset(event: &PatchsetCreated, now: DateTime<Utc>) -> Self {
        let change = &event.change;
        Self {
            username: event.uploader.display_name().to_owned(),
            topic: change.topic.clone(),
            url: change.url.clone(),
            project: change.project.clone(),
            subject: truncate(&change.subject, SUBJECT_WIDTH),
            created_on: event.patch_set.created_at(),
            updated_on: Some(event.patch_set.updated_at().unwrap_or(now)),
            status: ReviewStatus::Open,
            comment: String::new(),
        }
    }

    /// Identity key. Never changes after creation.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_comment(&mut self, text: &str) {
        self.comment = truncate(text, COMMENT_WIDTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{Account, Change, PatchSet};

    #[test]
    fn test_last_vote_wins() {
        let approvals = vec![Approval::new("VRIF", 2), Approval::new("CRVW", -2)];
        assert_eq!(
            ReviewStatus::from_approvals(&approvals),
            Some(ReviewStatus::Rejected)
        );

        let approvals = vec![Approval::new("CRVW", -2), Approval::new("VRIF", 2)];
        assert_eq!(
            ReviewStatus::from_approvals(&approvals),
            Some(ReviewStatus::Succeeded)
        );
    }

    #[test]
    fn test_unclassifiable_votes_are_ignored() {
        let approvals = vec![
            Approval::new("VRIF", -2),
            Approval::new("CRVW", 1),
            Approval::new("Code-Review", 2),
            Approval {
                kind: "CRVW".into(),
                value: None,
            },
        ];
        assert_eq!(
            ReviewStatus::from_approvals(&approvals),
            Some(ReviewStatus::Failed)
        );
        assert_eq!(ReviewStatus::from_approvals(&[]), None);
        assert_eq!(
            ReviewStatus::from_approvals(&[Approval::new("CRVW", 1)]),
            None
        );
    }

    #[test]
    fn test_row_from_patchset_falls_back_to_now() {
        let now = DateTime::from_timestamp(5_000, 0).unwrap();
        let event = PatchsetCreated {
            change: Change {
                url: "u".into(),
                project: "p".into(),
                subject: "s".into(),
                ..Change::default()
            },
            patch_set: PatchSet {
                created_on: Some(1_000),
                last_updated: None,
            },
            uploader: Account {
                username: "ada".into(),
                ..Account::default()
            },
        };
        let row = ReviewRow::from_patchset(&event, now);
        assert_eq!(row.url(), "u");
        assert_eq!(row.username, "ada");
        assert_eq!(row.created_on, DateTime::from_timestamp(1_000, 0));
        assert_eq!(row.updated_on, Some(now));
        assert_eq!(row.status, ReviewStatus::Open);
    }
}

//! Named comparators over review rows.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::row::ReviewRow;

/// Row field a sort key orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    CreatedOn,
    UpdatedOn,
    Subject,
    Username,
    Project,
    Topic,
}

/// Three-way comparison of two rows.
pub type Comparator = fn(&ReviewRow, &ReviewRow) -> Ordering;

/// A labelled ordering. `field == None` means insertion order.
#[derive(Clone, Copy)]
pub struct SortKey {
    pub label: &'static str,
    pub field: Option<SortField>,
    compare: Option<Comparator>,
}

impl std::fmt::Debug for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortKey")
            .field("label", &self.label)
            .field("field", &self.field)
            .finish()
    }
}

impl SortKey {
    pub const fn unsorted() -> Self {
        Self {
            label: "None",
            field: None,
            compare: None,
        }
    }

    pub const fn new(label: &'static str, field: SortField, compare: Comparator) -> Self {
        Self {
            label,
            field: Some(field),
            compare: Some(compare),
        }
    }

    pub fn is_unsorted(&self) -> bool {
        self.compare.is_none()
    }

    /// Whether changing `field` can move a row under this key.
    pub fn depends_on(&self, field: SortField) -> bool {
        self.field == Some(field)
    }

    /// Stable sort; equal rows keep their relative order.
    pub fn sort(&self, rows: &mut [ReviewRow]) {
        if let Some(cmp) = self.compare {
            rows.sort_by(cmp);
        }
    }
}

/// Missing timestamps order before any timestamp.
pub fn compare_instants(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    // `Option`'s ordering already puts `None` first.
    a.cmp(&b)
}

fn created_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    compare_instants(a.created_on, b.created_on)
}

fn created_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    created_asc(b, a)
}

fn updated_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    compare_instants(a.updated_on, b.updated_on)
}

fn updated_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    updated_asc(b, a)
}

fn subject_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    a.subject.cmp(&b.subject)
}

fn subject_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    subject_asc(b, a)
}

fn username_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    a.username.cmp(&b.username)
}

fn username_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    username_asc(b, a)
}

fn project_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    a.project.cmp(&b.project)
}

fn project_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    project_asc(b, a)
}

fn topic_asc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    a.topic.cmp(&b.topic)
}

fn topic_desc(a: &ReviewRow, b: &ReviewRow) -> Ordering {
    topic_asc(b, a)
}

/// Default keys, in cycling order.
pub const DEFAULT_SORT_KEYS: [SortKey; 13] = [
    SortKey::unsorted(),
    SortKey::new("Created On (Asc)", SortField::CreatedOn, created_asc),
    SortKey::new("Created On (Desc)", SortField::CreatedOn, created_desc),
    SortKey::new("Updated On (Asc)", SortField::UpdatedOn, updated_asc),
    SortKey::new("Updated On (Desc)", SortField::UpdatedOn, updated_desc),
    SortKey::new("Subject (Asc)", SortField::Subject, subject_asc),
    SortKey::new("Subject (Desc)", SortField::Subject, subject_desc),
    SortKey::new("Username (Asc)", SortField::Username, username_asc),
    SortKey::new("Username (Desc)", SortField::Username, username_desc),
    SortKey::new("Project (Asc)", SortField::Project, project_asc),
    SortKey::new("Project (Desc)", SortField::Project, project_desc),
    SortKey::new("Topic (Asc)", SortField::Topic, topic_asc),
    SortKey::new("Topic (Desc)", SortField::Topic, topic_desc),
];

/// Ordered set of sort keys with one active entry.
#[derive(Debug, Clone)]
pub struct SortRegistry {
    keys: Vec<SortKey>,
    active: usize,
}

impl Default for SortRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SORT_KEYS.to_vec())
    }
}

impl SortRegistry {
    /// Build a registry. An "unsorted" key is prepended if none is present.
    pub fn new(mut keys: Vec<SortKey>) -> Self {
        if !keys.iter().any(SortKey::is_unsorted) {
            keys.insert(0, SortKey::unsorted());
        }
        Self { keys, active: 0 }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn active(&self) -> &SortKey {
        &self.keys[self.active]
    }

    /// Advance to the next key, wrapping around.
    pub fn cycle(&mut self) -> &SortKey {
        self.active = (self.active + 1) % self.keys.len();
        self.active()
    }

    /// Select a key by index. Returns `false` if out of range.
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.keys.len() {
            self.active = index;
            true
        } else {
            false
        }
    }
}

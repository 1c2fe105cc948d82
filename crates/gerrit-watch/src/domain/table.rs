//! Bounded, sortable table of tracked changes.
//!
//! Rows live in an insertion-ordered store (newest first). When a sort key is
//! active a sorted copy is materialized next to it; the renderer always reads
//! [`ReviewTable::displayed`], which picks whichever view applies.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::errors::TableError;
use super::events::EventRecord;
use super::row::{ReviewRow, ReviewStatus};
use super::sort::{SortField, SortKey, SortRegistry};

/// Every update rule refreshes `updated_on`; nothing else a key orders by changes.
const UPDATE_TOUCHES: &[SortField] = &[SortField::UpdatedOn];

/// What applying one event did to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// A new row was created; carries the url evicted to make room, if any.
    Inserted { evicted: Option<String> },
    /// An existing row was mutated.
    Updated,
    /// `patchset-created` for a url that is already tracked.
    AlreadyTracked,
    /// No row matches the event's url.
    Unmatched,
}

/// Capacity-limited collection of review rows.
#[derive(Debug, Clone)]
pub struct ReviewTable {
    max_size: usize,
    rows: VecDeque<ReviewRow>,
    sorted: Vec<ReviewRow>,
    sort: SortRegistry,
}

impl ReviewTable {
    /// Create a table holding at most `max_size` rows (at least one).
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            rows: VecDeque::with_capacity(max_size + 1),
            sorted: Vec::new(),
            sort: SortRegistry::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows newest first, regardless of the active sort.
    pub fn insertion_order(&self) -> impl Iterator<Item = &ReviewRow> {
        self.rows.iter()
    }

    /// Rows in display order.
    pub fn displayed(&self) -> Vec<&ReviewRow> {
        if self.sort.active().is_unsorted() {
            self.rows.iter().collect()
        } else {
            self.sorted.iter().collect()
        }
    }

    /// Row at a display position.
    pub fn displayed_row(&self, index: usize) -> Option<&ReviewRow> {
        if self.sort.active().is_unsorted() {
            self.rows.get(index)
        } else {
            self.sorted.get(index)
        }
    }

    pub fn find(&self, url: &str) -> Option<&ReviewRow> {
        self.rows.iter().find(|row| row.url() == url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.find(url).is_some()
    }

    pub fn sort_key(&self) -> &SortKey {
        self.sort.active()
    }

    pub fn sort_label(&self) -> &'static str {
        self.sort.active().label
    }

    /// Move to the next sort key and rebuild the displayed view.
    pub fn cycle_sort(&mut self) -> &'static str {
        self.sort.cycle();
        self.resort();
        self.sort_label()
    }

    /// Select a sort key by registry index.
    pub fn set_sort(&mut self, index: usize) -> bool {
        let selected = self.sort.select(index);
        if selected {
            self.resort();
        }
        selected
    }

    /// Apply one event, stamping any mutation with `now`.
    pub fn apply(&mut self, event: &EventRecord, now: DateTime<Utc>) -> Result<Applied, TableError> {
        let url = event.change().url.as_str();
        let applied = match event {
            EventRecord::PatchsetCreated(created) => {
                if self.contains(url) {
                    Applied::AlreadyTracked
                } else {
                    let evicted = self.insert(ReviewRow::from_patchset(created, now));
                    Applied::Inserted { evicted }
                }
            }
            EventRecord::CommentAdded(added) => {
                let status = ReviewStatus::from_approvals(&added.approvals);
                self.update(url, |row| {
                    if !added.comment.is_empty() {
                        row.set_comment(&added.comment);
                    }
                    if let Some(status) = status {
                        row.status = status;
                    }
                    row.updated_on = Some(now);
                })
            }
            EventRecord::ChangeMerged(_) => self.update(url, |row| {
                row.status = ReviewStatus::Merged;
                row.updated_on = Some(now);
            }),
            EventRecord::ChangeRestored(restored) => self.update(url, |row| {
                if !restored.reason.is_empty() {
                    row.set_comment(&restored.reason);
                }
                row.status = ReviewStatus::Restored;
                row.updated_on = Some(now);
            }),
            EventRecord::ChangeAbandoned(abandoned) => self.update(url, |row| {
                if !abandoned.reason.is_empty() {
                    row.set_comment(&abandoned.reason);
                }
                row.status = ReviewStatus::Abandoned;
                row.updated_on = Some(now);
            }),
            EventRecord::Other(other) => {
                return Err(TableError::UnsupportedEvent(other.kind.clone()));
            }
        };
        Ok(applied)
    }

    /// Insert at the head, evicting the oldest row past capacity.
    fn insert(&mut self, row: ReviewRow) -> Option<String> {
        self.rows.push_front(row);
        let evicted = if self.rows.len() > self.max_size {
            self.rows.pop_back().map(|row| row.url().to_owned())
        } else {
            None
        };
        self.resort();
        evicted
    }

    fn update<F>(&mut self, url: &str, mutate: F) -> Applied
    where
        F: Fn(&mut ReviewRow),
    {
        let Some(row) = self.rows.iter_mut().find(|row| row.url() == url) else {
            return Applied::Unmatched;
        };
        mutate(row);

        let key = *self.sort.active();
        if key.is_unsorted() {
            return Applied::Updated;
        }
        if UPDATE_TOUCHES.iter().any(|field| key.depends_on(*field)) {
            self.resort();
        } else if let Some(shown) = self.sorted.iter_mut().find(|row| row.url() == url) {
            mutate(shown);
        }
        Applied::Updated
    }

    /// Rebuild the sorted view from the insertion-ordered store.
    fn resort(&mut self) {
        let key = *self.sort.active();
        if key.is_unsorted() {
            self.sorted.clear();
            return;
        }
        self.sorted = self.rows.iter().cloned().collect();
        key.sort(&mut self.sorted);
    }
}

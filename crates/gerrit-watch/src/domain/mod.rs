//! Domain layer: events, rows, sorting and the review table.

pub mod config;
pub mod errors;
pub mod events;
pub mod row;
pub mod sort;
pub mod table;
pub mod text;

pub use config::{DashboardConfig, ServerConfig, WatcherConfig};
pub use errors::{ConfigError, EventError, RecordLogError, SourceError, TableError, WatchFailure};
pub use events::{
    Account, Approval, Change, ChangeMerged, ChangeReason, CommentAdded, EventRecord, OtherEvent,
    PatchSet, PatchsetCreated,
};
pub use row::{ReviewRow, ReviewStatus, StatusClass};
pub use sort::{SortField, SortKey, SortRegistry, DEFAULT_SORT_KEYS};
pub use table::{Applied, ReviewTable};
pub use text::{highlight, truncate, Fragment, Tone, COMMENT_WIDTH, SUBJECT_WIDTH};

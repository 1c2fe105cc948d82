//! # Gerrit Watch - Event Stream Watcher and Review Table
//!
//! Core of the live review dashboard: a watcher that keeps a trustworthy Gerrit
//! event stream flowing onto a bounded queue, and the bounded, sortable table
//! the dashboard folds those events into.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  WatcherMessage   ┌──────────────┐   apply()   ┌──────────────┐
//! │   Watcher    │ ────────────────→ │  Dashboard   │ ──────────→ │ ReviewTable  │
//! │ (tokio task) │  bounded mpsc     │  tick loop   │             │ (owned, no   │
//! └──────────────┘                   └──────────────┘             │  locking)    │
//!        │                                                        └──────────────┘
//!        ▼
//!  EventSource port ── SshEventSource (ssh + gerrit stream-events)
//!        │
//!        ▼
//!  RecordLog (NDJSON, replayed once at startup)
//! ```
//!
//! ## Module Structure
//!
//! | Layer | Module | Contents |
//! |-------|--------|----------|
//! | Domain | `domain/` | events, rows, sort keys, table, text helpers, config, errors |
//! | Ports | `ports/` | `EventSource` trait |
//! | Adapters | `adapters/` | `SshEventSource`, `RecordLog` |
//! | Service | `service/` | `Watcher` state machine |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{RecordLog, SshEventSource};
pub use domain::{
    Applied, ConfigError, DashboardConfig, EventRecord, ReviewRow, ReviewStatus, ReviewTable,
    ServerConfig, SortRegistry, SourceError, TableError, WatchFailure, WatcherConfig,
};
pub use ports::EventSource;
pub use service::{spawn, WatchSummary, Watcher, WatcherHandle, WatcherMessage, WatcherState};

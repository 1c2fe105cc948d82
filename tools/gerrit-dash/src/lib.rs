//! Gerrit-Dash: terminal dashboard for live Gerrit review activity.
//!
//! The binary wires an [`gerrit_watch::SshEventSource`] watcher to the
//! [`App`] tick loop and renders it with ratatui.
//!
//! ```text
//! ┌─ gerrit-dash ─ bot@review.example.org:29418 ── processing ── 12m ─┐
//! │ Status    Project  Owner   Subject                 Comment        │
//! │ Approved  core     alice   Fix cache eviction      Looks good     │
//! │ Failed    docs     bob     Reword install guide    Build failed   │
//! ├───────────────────────────────────────────────────────────────────┤
//! │ patchset-created 4  comment-added 9 │ Sort: None │ Rows 2/50      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```

pub mod app;
pub mod cli;
pub mod ui;

pub use app::{App, DashboardError, TickReport};
pub use cli::Args;

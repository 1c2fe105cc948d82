//! Services: long-running tasks built on the domain and the ports.

pub mod watcher;

pub use watcher::{
    backoff_delay, prefetch_events, sanity_query, spawn, WatchSummary, Watcher, WatcherHandle,
    WatcherMessage, WatcherState,
};

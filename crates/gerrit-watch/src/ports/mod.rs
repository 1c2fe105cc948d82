//! Ports: traits at the boundary of the watcher.

pub mod outbound;

pub use outbound::EventSource;

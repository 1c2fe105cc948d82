//! # Outbound Port - EventSource
//!
//! The connection to the review server. The watcher only drives this trait;
//! transport, wire protocol and credentials belong to the adapter.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{ServerConfig, SourceError};

/// A review server connection that can answer queries and stream events.
///
/// Call order is `open` → `run_query`* → `start_streaming` → `next_event`*.
/// `close` may be called at any point and makes the source reusable for a
/// fresh `open`.
#[async_trait]
pub trait EventSource: Send {
    /// Establish the connection.
    async fn open(&mut self, server: &ServerConfig) -> Result<(), SourceError>;

    /// Run a change query and return its raw result rows.
    async fn run_query(&mut self, query: &str) -> Result<Vec<Value>, SourceError>;

    /// Subscribe to the live event stream.
    async fn start_streaming(&mut self) -> Result<(), SourceError>;

    /// Wait for the next raw event.
    async fn next_event(&mut self) -> Result<Value, SourceError>;

    /// Whether the background stream is still running.
    fn is_stream_alive(&mut self) -> bool;

    /// Drop the connection handle.
    async fn close(&mut self);

    /// Whether a connection handle is held.
    fn is_connected(&self) -> bool;
}

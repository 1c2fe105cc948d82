//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gerrit_watch::{EventSource, ServerConfig, SourceError, WatcherConfig};
use serde_json::{json, Value};
use tokio::time::Instant;

/// One call made against the scripted source.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(Instant),
    Query(String),
    StartStreaming,
    Close,
}

/// `EventSource` that replays canned results and records every call.
#[derive(Default)]
pub struct ScriptedSource {
    /// Per-attempt `open` results; `Ok` once exhausted.
    pub opens: VecDeque<Result<(), SourceError>>,
    /// Per-attempt query results; empty result set once exhausted.
    pub queries: VecDeque<Result<Vec<Value>, SourceError>>,
    /// Live events; the stream ends after the last one.
    pub events: VecDeque<Result<Value, SourceError>>,
    /// Block forever instead of ending when `events` runs dry.
    pub hang_when_drained: bool,
    calls: Arc<Mutex<Vec<Call>>>,
    connected: bool,
    streaming: bool,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the call log, readable after the source moved.
    pub fn calls(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn open(&mut self, _server: &ServerConfig) -> Result<(), SourceError> {
        self.record(Call::Open(Instant::now()));
        self.opens.pop_front().unwrap_or(Ok(()))?;
        self.connected = true;
        Ok(())
    }

    async fn run_query(&mut self, query: &str) -> Result<Vec<Value>, SourceError> {
        self.record(Call::Query(query.to_owned()));
        self.queries.pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn start_streaming(&mut self) -> Result<(), SourceError> {
        self.record(Call::StartStreaming);
        self.streaming = true;
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Value, SourceError> {
        match self.events.pop_front() {
            Some(next) => next,
            None if self.hang_when_drained => std::future::pending().await,
            None => {
                self.streaming = false;
                Err(SourceError::Closed("end of script".into()))
            }
        }
    }

    fn is_stream_alive(&mut self) -> bool {
        self.streaming
    }

    async fn close(&mut self) {
        self.record(Call::Close);
        self.connected = false;
        self.streaming = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

pub fn config() -> WatcherConfig {
    WatcherConfig {
        server: ServerConfig {
            host: "review.example.org".into(),
            username: "bot".into(),
            ..ServerConfig::default()
        },
        ..WatcherConfig::default()
    }
}

pub fn query_row(url: &str, created_on: i64) -> Value {
    json!({
        "project": "core",
        "subject": format!("change {url}"),
        "url": url,
        "owner": {"name": "Owner", "username": "owner"},
        "createdOn": created_on,
        "lastUpdated": created_on + 5
    })
}

pub fn stream_event(kind: &str, url: &str) -> Value {
    json!({
        "type": kind,
        "change": {"project": "core", "url": url, "subject": "s"},
        "patchSet": {"createdOn": 1, "lastUpdated": 2},
        "uploader": {"username": "uploader"},
        "comment": "Build failed",
        "approvals": [{"type": "VRIF", "value": "-2"}]
    })
}

pub fn refused() -> SourceError {
    SourceError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

pub fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "gerrit-watch-it-{}-{}-{}.ndjson",
        name,
        std::process::id(),
        rand::random::<u32>()
    ))
}

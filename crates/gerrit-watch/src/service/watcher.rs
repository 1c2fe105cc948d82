//! Event-stream watcher.
//!
//! Owns the connection lifecycle and is the only producer on the event queue.
//!
//! ```text
//! [Idle] ──→ [Connecting] ──sanity query ok──→ [Consuming] ──stream ended──→ [Dead]
//!                 │                                                           ↑
//!                 └──── terminal failure / attempts exhausted ────────────────┘
//! ```
//!
//! While `Consuming` the watcher emits, in order: the replayed record file, the
//! events derived from the sanity query, then live events. Only the last two
//! are appended to the record file.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapters::RecordLog;
use crate::domain::{EventRecord, SourceError, WatchFailure, WatcherConfig};
use crate::ports::EventSource;

/// Lifecycle of one watcher. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatcherState {
    #[default]
    Idle,
    Connecting,
    Consuming,
    Dead,
}

impl WatcherState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Consuming => "consuming",
            Self::Dead => "dead",
        }
    }
}

/// Everything the watcher hands to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherMessage {
    /// The watcher entered a new state.
    State(WatcherState),
    /// One event, in production order.
    Event(EventRecord),
    /// The most recent failure, sent once right before `State(Dead)`.
    Failure(WatchFailure),
}

/// Final bookkeeping of a finished watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    pub state: WatcherState,
    /// Connection attempts made.
    pub attempts: u32,
    /// Every failure observed, oldest first.
    pub failures: Vec<WatchFailure>,
    /// Events handed to the queue.
    pub delivered: u64,
}

/// Why the watcher stopped before its natural end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Shutdown,
    ConsumerGone,
}

/// Delay before retrying after the failed `attempt` (0-indexed): `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

/// The bounded query used to verify the connection and backfill the table.
pub fn sanity_query(limit: usize, projects: &[String]) -> String {
    let mut query = format!("status:open limit:{limit}");
    if !projects.is_empty() {
        let filter = projects
            .iter()
            .map(|p| format!("project:{p}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        query.push_str(&format!(" ({filter})"));
    }
    query
}

/// Turn query rows into `patchset-created` events: oldest first, at most `limit`.
///
/// The server may return more rows than asked for, so the cut happens here.
pub fn prefetch_events(rows: &[Value], limit: usize) -> Vec<EventRecord> {
    let mut events: Vec<_> = rows
        .iter()
        .filter_map(EventRecord::from_query_result)
        .collect();
    events.sort_by_key(EventRecord::patch_set_created_on);
    events.truncate(limit);
    events
}

/// Connection state machine feeding a bounded queue.
pub struct Watcher<S> {
    config: WatcherConfig,
    source: S,
    tx: mpsc::Sender<WatcherMessage>,
    shutdown: mpsc::Receiver<()>,
    record_log: Option<RecordLog>,
    state: WatcherState,
    attempts: u32,
    failures: Vec<WatchFailure>,
    delivered: u64,
}

impl<S: EventSource> Watcher<S> {
    /// Build a watcher. A message on `shutdown`, or dropping every sender of it,
    /// stops the watcher at its next suspension point.
    pub fn new(
        config: WatcherConfig,
        source: S,
        tx: mpsc::Sender<WatcherMessage>,
        shutdown: mpsc::Receiver<()>,
    ) -> Self {
        let record_log = config.record_file.clone().map(RecordLog::new);
        Self {
            config,
            source,
            tx,
            shutdown,
            record_log,
            state: WatcherState::Idle,
            attempts: 0,
            failures: Vec::new(),
            delivered: 0,
        }
    }

    /// Run until the stream dies, connecting fails for good, or shutdown.
    pub async fn run(mut self) -> WatchSummary {
        let result = self.drive().await;
        self.source.close().await;

        match result {
            Ok(()) => {
                if let Some(last) = self.failures.last().cloned() {
                    error!(failure = %last, "Watcher giving up");
                    let _ = self.send(WatcherMessage::Failure(last)).await;
                }
                let _ = self.transition(WatcherState::Dead).await;
            }
            Err(stop) => {
                debug!(?stop, "Watcher stopped");
                self.state = WatcherState::Dead;
            }
        }

        WatchSummary {
            state: self.state,
            attempts: self.attempts,
            failures: self.failures,
            delivered: self.delivered,
        }
    }

    async fn drive(&mut self) -> Result<(), Stop> {
        self.transition(WatcherState::Connecting).await?;
        let Some(prefetched) = self.connect().await? else {
            return Ok(());
        };

        self.transition(WatcherState::Consuming).await?;
        self.replay().await?;
        for event in prefetched {
            match event.to_value() {
                Ok(raw) => {
                    self.send(WatcherMessage::Event(event)).await?;
                    self.delivered += 1;
                    self.append(&raw).await;
                }
                Err(e) => warn!(error = %e, "Failed to encode prefetched event"),
            }
        }
        self.consume().await
    }

    /// Retry loop. `Ok(None)` means every attempt failed or one failed terminally.
    async fn connect(&mut self) -> Result<Option<Vec<EventRecord>>, Stop> {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 0..max_attempts {
            self.attempts += 1;
            let limit = if attempt == 0 {
                self.config.prefetch.max(1)
            } else {
                1
            };

            let outcome = tokio::select! {
                outcome = Self::try_connect(&mut self.source, &self.config, limit) => outcome,
                _ = self.shutdown.recv() => return Err(Stop::Shutdown),
            };

            let err = match outcome {
                Ok(events) => {
                    info!(
                        attempt,
                        prefetched = events.len(),
                        server = %self.config.server.display_target(),
                        "Connection verified"
                    );
                    return Ok(Some(events));
                }
                Err(err) => err,
            };

            warn!(attempt, terminal = err.is_terminal(), error = %err, "Connection attempt failed");
            self.source.close().await;
            self.failures.push(WatchFailure::from_source(attempt, &err));
            if err.is_terminal() {
                break;
            }

            if attempt + 1 < max_attempts {
                let delay = backoff_delay(self.config.backoff_base, attempt);
                debug!(?delay, "Backing off");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.recv() => return Err(Stop::Shutdown),
                }
            }
        }
        Ok(None)
    }

    /// Open, run the sanity query, and only then subscribe to the stream.
    async fn try_connect(
        source: &mut S,
        config: &WatcherConfig,
        limit: usize,
    ) -> Result<Vec<EventRecord>, SourceError> {
        source.open(&config.server).await?;
        let query = sanity_query(limit, &config.projects);
        let rows = source.run_query(&query).await?;
        let events = prefetch_events(&rows, limit);
        source.start_streaming().await?;
        Ok(events)
    }

    /// Replay the record file once. Replayed events are not appended again.
    async fn replay(&mut self) -> Result<(), Stop> {
        let Some(log) = self.record_log.as_ref() else {
            return Ok(());
        };
        let mut replay = match log.replay().await {
            Ok(replay) => replay,
            Err(e) => {
                warn!(error = %e, "Record file unavailable, skipping replay");
                return Ok(());
            }
        };

        let mut replayed = 0u64;
        while let Some(event) = replay.next_record().await {
            self.send(WatcherMessage::Event(event)).await?;
            self.delivered += 1;
            replayed += 1;
        }
        info!(replayed, skipped = replay.skipped(), "Record file replayed");
        Ok(())
    }

    /// Steady state: forward live events until the connection is dropped.
    async fn consume(&mut self) -> Result<(), Stop> {
        while self.source.is_connected() {
            let next = tokio::select! {
                next = self.source.next_event() => next,
                _ = self.shutdown.recv() => return Err(Stop::Shutdown),
            };

            match next {
                Ok(raw) => self.deliver(raw).await?,
                Err(err) => {
                    warn!(error = %err, "Failed to read next event");
                    let ended = matches!(err, SourceError::Closed(_));
                    if ended || !self.source.is_stream_alive() {
                        let attempt = self.attempts.saturating_sub(1);
                        self.failures.push(WatchFailure::from_source(attempt, &err));
                        self.source.close().await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn deliver(&mut self, raw: Value) -> Result<(), Stop> {
        match EventRecord::from_value(raw.clone()) {
            Ok(event) => {
                self.send(WatcherMessage::Event(event)).await?;
                self.delivered += 1;
                self.append(&raw).await;
            }
            Err(e) => debug!(error = %e, "Skipping stream object"),
        }
        Ok(())
    }

    async fn append(&mut self, raw: &Value) {
        if let Some(log) = self.record_log.as_mut() {
            if let Err(e) = log.append(raw).await {
                warn!(error = %e, "Failed to append to record file");
            }
        }
    }

    async fn transition(&mut self, next: WatcherState) -> Result<(), Stop> {
        if next <= self.state {
            return Ok(());
        }
        info!(from = self.state.as_str(), to = next.as_str(), "Watcher state change");
        self.state = next;
        self.send(WatcherMessage::State(next)).await
    }

    /// Blocks while the queue is full; gives up on shutdown or a closed queue.
    async fn send(&mut self, message: WatcherMessage) -> Result<(), Stop> {
        tokio::select! {
            sent = self.tx.send(message) => sent.map_err(|_| Stop::ConsumerGone),
            _ = self.shutdown.recv() => Err(Stop::Shutdown),
        }
    }
}

/// Handle to a spawned watcher task.
pub struct WatcherHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: JoinHandle<WatchSummary>,
}

impl WatcherHandle {
    /// Ask the watcher to stop.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    /// Wait for the task to finish.
    pub async fn join(self) -> Option<WatchSummary> {
        self.task.await.ok()
    }
}

/// Spawn a watcher on the tokio runtime and return its queue.
pub fn spawn<S>(config: WatcherConfig, source: S) -> (WatcherHandle, mpsc::Receiver<WatcherMessage>)
where
    S: EventSource + 'static,
{
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let watcher = Watcher::new(config, source, tx, shutdown_rx);
    let task = tokio::spawn(watcher.run());
    (
        WatcherHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        },
        rx,
    )
}

//! Application state management.
//!
//! [`App`] is the sole owner of the review table. Each tick drains the watcher
//! queue without blocking, folds events into the table and refreshes the
//! status text the header shows.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::KeyCode;
use gerrit_watch::{
    Applied, DashboardConfig, EventRecord, ReviewRow, ReviewTable, WatchFailure, WatcherMessage,
    WatcherState,
};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

/// Fatal conditions that end the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("watcher died after {0}")]
    WatcherDied(WatchFailure),
    #[error("lost connectivity to the Gerrit event stream")]
    ConnectivityLost,
}

/// What one tick consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Messages of any kind taken off the queue.
    pub drained: usize,
    /// Events among them.
    pub events: usize,
    pub applied: usize,
    /// Events for projects outside the allow-list.
    pub filtered: usize,
    /// Events the table refused.
    pub rejected: usize,
}

/// Application state holding all dashboard data.
pub struct App {
    config: DashboardConfig,

    /// `user@host:port` of the watched server.
    pub server: String,

    /// Tracked changes.
    pub table: ReviewTable,

    /// Events seen per wire type, including filtered and rejected ones.
    pub counters: BTreeMap<String, u64>,

    /// Last state reported by the watcher.
    pub watcher_state: WatcherState,

    /// Last failure reported by the watcher.
    pub last_failure: Option<WatchFailure>,

    /// Header status text.
    pub status: &'static str,

    /// Selected row in display order.
    pub selected: usize,

    /// Whether the app should quit.
    pub should_quit: bool,

    /// Application start time.
    pub start_time: Instant,
}

impl App {
    pub fn new(server: String, config: DashboardConfig) -> Self {
        let table = ReviewTable::new(config.max_rows);
        Self {
            config,
            server,
            table,
            counters: BTreeMap::new(),
            watcher_state: WatcherState::Idle,
            last_failure: None,
            status: WatcherState::Idle.as_str(),
            selected: 0,
            should_quit: false,
            start_time: Instant::now(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick
    }

    /// Drain every queued message and apply it.
    ///
    /// Returns an error once the watcher is dead; the caller is expected to stop.
    pub fn tick(
        &mut self,
        rx: &mut mpsc::Receiver<WatcherMessage>,
    ) -> Result<TickReport, DashboardError> {
        let mut report = TickReport::default();
        loop {
            match rx.try_recv() {
                Ok(message) => {
                    report.drained += 1;
                    self.handle_message(message, &mut report);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.watcher_state != WatcherState::Dead {
                        warn!(state = self.watcher_state.as_str(), "watcher queue closed");
                        self.watcher_state = WatcherState::Dead;
                    }
                    break;
                }
            }
        }

        self.status = self.status_text(report.events);
        self.clamp_selection();

        if report.events > 0 {
            debug!(
                events = report.events,
                applied = report.applied,
                filtered = report.filtered,
                rejected = report.rejected,
                "tick"
            );
        }

        if self.watcher_state == WatcherState::Dead {
            return Err(self.fatal_error());
        }
        Ok(report)
    }

    fn handle_message(&mut self, message: WatcherMessage, report: &mut TickReport) {
        match message {
            WatcherMessage::State(state) => {
                info!(state = state.as_str(), "watcher state changed");
                self.watcher_state = state;
            }
            WatcherMessage::Failure(failure) => {
                warn!(failure = %failure, terminal = failure.terminal, "watcher failure");
                self.last_failure = Some(failure);
            }
            WatcherMessage::Event(event) => {
                report.events += 1;
                self.apply_event(&event, report);
            }
        }
    }

    /// Fold one event into the table. Failures are logged, never propagated.
    pub fn apply_event(&mut self, event: &EventRecord, report: &mut TickReport) {
        *self.counters.entry(event.kind().to_owned()).or_insert(0) += 1;

        let change = event.change();
        if !self.config.allows_project(&change.project) {
            debug!(project = %change.project, url = %change.url, "project not watched");
            report.filtered += 1;
            return;
        }

        match self.table.apply(event, Utc::now()) {
            Ok(Applied::Inserted { evicted }) => {
                report.applied += 1;
                if let Some(url) = evicted {
                    debug!(url = %url, "evicted oldest row");
                }
            }
            Ok(_) => report.applied += 1,
            Err(e) => {
                warn!(error = %e, url = %change.url, "skipping event");
                report.rejected += 1;
            }
        }
    }

    fn status_text(&self, events: usize) -> &'static str {
        match self.watcher_state {
            WatcherState::Consuming if events == 0 => "waiting",
            WatcherState::Consuming => "processing",
            state => state.as_str(),
        }
    }

    fn fatal_error(&self) -> DashboardError {
        match &self.last_failure {
            Some(failure) => DashboardError::WatcherDied(failure.clone()),
            None => DashboardError::ConnectivityLost,
        }
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.table.len().saturating_sub(1));
    }

    pub fn selected_row(&self) -> Option<&ReviewRow> {
        self.table.displayed_row(self.selected)
    }

    /// Events seen so far, across all types.
    pub fn total_events(&self) -> u64 {
        self.counters.values().sum()
    }

    /// Format uptime as a short human-readable string.
    pub fn uptime_str(&self) -> String {
        format_uptime(self.start_time.elapsed())
    }

    /// Handle key press events.
    pub fn on_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                let label = self.table.cycle_sort();
                info!(sort = label, "sort key changed");
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let max = self.table.len().saturating_sub(1);
                if self.selected < max {
                    self.selected += 1;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => self.selected = 0,
            KeyCode::End | KeyCode::Char('G') => self.selected = self.table.len().saturating_sub(1),
            _ => {}
        }
    }
}

fn format_uptime(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours >= 24 {
        format!("{}d {}h", hours / 24, hours % 24)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else if mins > 0 {
        format!("{}m", mins)
    } else {
        format!("{}s", secs)
    }
}

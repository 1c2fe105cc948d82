//! Watcher and dashboard configuration with validation.

use std::path::PathBuf;
use std::time::Duration;

use super::errors::ConfigError;

/// Default Gerrit SSH port.
pub const DEFAULT_SSH_PORT: u16 = 29418;

/// Connection attempts before the watcher gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Events buffered between the watcher and the dashboard.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Where and as whom to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Private key handed to the transport; never read by this crate.
    pub keyfile: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            keyfile: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.username.trim().is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        Ok(())
    }

    /// `user@host:port`, for status lines and logs.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Watcher behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub server: ServerConfig,
    /// Rows requested by the first sanity query (at least one is always requested).
    pub prefetch: usize,
    /// Empty means every project.
    pub projects: Vec<String>,
    /// Append-only NDJSON file replayed at startup.
    pub record_file: Option<PathBuf>,
    pub max_attempts: u32,
    /// First backoff delay; doubles per attempt.
    pub backoff_base: Duration,
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            prefetch: 0,
            projects: Vec::new(),
            record_file: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: Duration::from_secs(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Dashboard loop behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Visible-row capacity of the review table.
    pub max_rows: usize,
    pub tick: Duration,
    pub projects: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            max_rows: 50,
            tick: Duration::from_secs(1),
            projects: Vec::new(),
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    pub fn allows_project(&self, project: &str) -> bool {
        allows_project(&self.projects, project)
    }
}

fn allows_project(projects: &[String], project: &str) -> bool {
    projects.is_empty() || projects.iter().any(|p| p == project)
}

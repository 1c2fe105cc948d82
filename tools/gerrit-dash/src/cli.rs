//! Command-line arguments and their mapping onto the watcher and dashboard configs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gerrit_watch::domain::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_CAPACITY, DEFAULT_SSH_PORT};
use gerrit_watch::{ConfigError, DashboardConfig, ServerConfig, WatcherConfig};

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "gerrit_watch=info,gerrit_dash=info";

/// Live Gerrit review dashboard
#[derive(Parser, Debug, Clone)]
#[command(name = "gerrit-dash")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Gerrit server host name
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Gerrit SSH port
    #[arg(short, long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,

    /// Account used for the SSH session
    #[arg(short, long)]
    pub username: String,

    /// Private key passed to ssh
    #[arg(short, long)]
    pub keyfile: Option<PathBuf>,

    /// Open changes to load before streaming starts
    #[arg(long, default_value_t = 0)]
    pub prefetch: usize,

    /// Rows kept in the review table
    #[arg(long, default_value_t = 50)]
    pub max_rows: usize,

    /// Only show this project (repeatable)
    #[arg(long = "project")]
    pub projects: Vec<String>,

    /// NDJSON file replayed at startup and appended to while streaming
    #[arg(long)]
    pub record_file: Option<PathBuf>,

    /// Dashboard refresh interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub tick_ms: u64,

    /// Where log output goes; the terminal belongs to the dashboard
    #[arg(long, default_value = "gerrit-dash.log")]
    pub log_file: PathBuf,

    /// ssh executable to run
    #[arg(long, default_value = "ssh")]
    pub ssh_binary: PathBuf,

    /// Connection attempts before giving up
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl Args {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            keyfile: self.keyfile.clone(),
        }
    }

    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            server: self.server_config(),
            prefetch: self.prefetch,
            projects: self.projects.clone(),
            record_file: self.record_file.clone(),
            max_attempts: self.max_attempts,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ..WatcherConfig::default()
        }
    }

    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            max_rows: self.max_rows,
            tick: Duration::from_millis(self.tick_ms),
            projects: self.projects.clone(),
        }
    }

    /// Build and validate both configs.
    pub fn configs(&self) -> Result<(WatcherConfig, DashboardConfig), ConfigError> {
        let watcher = self.watcher_config();
        watcher.validate()?;
        let dashboard = self.dashboard_config();
        dashboard.validate()?;
        Ok((watcher, dashboard))
    }
}

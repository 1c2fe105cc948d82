//! `EventSource` backed by the system `ssh` client and Gerrit's SSH commands.
//!
//! Queries run as one-shot `gerrit query --format=JSON` invocations; the live
//! stream is a long-running `gerrit stream-events` child whose stdout yields
//! one JSON event per line.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{ServerConfig, SourceError};
use crate::ports::EventSource;

/// Upper bound for a single query round trip.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Seconds between SSH keep-alive probes on the stream connection.
const SERVER_ALIVE_INTERVAL: u32 = 30;

/// Stderr fragments that mean the credentials will never work.
const AUTH_FAILURES: [&str; 3] = [
    "Permission denied",
    "Host key verification failed",
    "Too many authentication failures",
];

/// Stderr bytes kept from the stream process for error reporting.
const STDERR_LIMIT: u64 = 8 * 1024;

/// Wait for the stream process to exit once its stdout has closed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

struct Stream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
}

impl Stream {
    /// Why the stream ended, after stdout reached end of file.
    async fn end_reason(&mut self) -> SourceError {
        let status = match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return SourceError::Io(e),
            Err(_) => return SourceError::Closed("event stream ended".into()),
        };
        let stderr = match self.stderr.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        if status.success() && stderr.trim().is_empty() {
            return SourceError::Closed("event stream ended".into());
        }
        classify_failure(status, &stderr)
    }
}

/// Collect the head of the stream's stderr and drain the rest so the child
/// never blocks on a full pipe.
fn collect_stderr(stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut head = Vec::new();
        let mut limited = stderr.take(STDERR_LIMIT);
        if let Err(e) = limited.read_to_end(&mut head).await {
            debug!(error = %e, "Failed to read stream-events stderr");
        }
        let mut rest = limited.into_inner();
        let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
        String::from_utf8_lossy(&head).into_owned()
    })
}

/// Gerrit over `ssh`.
pub struct SshEventSource {
    ssh_binary: PathBuf,
    server: Option<ServerConfig>,
    stream: Option<Stream>,
}

impl Default for SshEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SshEventSource {
    pub fn new() -> Self {
        Self::with_binary("ssh")
    }

    /// Use a specific `ssh` executable.
    pub fn with_binary(ssh_binary: impl Into<PathBuf>) -> Self {
        Self {
            ssh_binary: ssh_binary.into(),
            server: None,
            stream: None,
        }
    }

    fn gerrit_command(&self, args: &[&str]) -> Result<Command, SourceError> {
        let server = self.server.as_ref().ok_or(SourceError::NotConnected)?;
        let mut cmd = Command::new(&self.ssh_binary);
        cmd.arg("-p")
            .arg(server.port.to_string())
            .args(["-o", "BatchMode=yes"])
            .arg("-o")
            .arg(format!("ServerAliveInterval={SERVER_ALIVE_INTERVAL}"));
        if let Some(keyfile) = &server.keyfile {
            cmd.arg("-i").arg(keyfile);
        }
        cmd.arg(format!("{}@{}", server.username, server.host))
            .arg("gerrit")
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }
}

/// Map a failed `ssh` invocation to a terminal or transient error.
pub fn classify_failure(status: ExitStatus, stderr: &str) -> SourceError {
    let stderr = stderr.trim();
    if AUTH_FAILURES.iter().any(|needle| stderr.contains(needle)) {
        return SourceError::Authentication(stderr.to_owned());
    }
    if stderr.lines().any(|line| line.starts_with("fatal:")) {
        return SourceError::Protocol(stderr.to_owned());
    }
    SourceError::Closed(format!("ssh exited with {status}: {stderr}"))
}

/// Quote a query for Gerrit's SSH argument splitter.
fn quote_query(query: &str) -> String {
    format!("'{}'", query.replace('\'', ""))
}

fn parse_lines(stdout: &[u8]) -> Result<Vec<Value>, SourceError> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| SourceError::InvalidResponse(e.to_string()))
        })
        .collect()
}

#[async_trait]
impl EventSource for SshEventSource {
    async fn open(&mut self, server: &ServerConfig) -> Result<(), SourceError> {
        self.close().await;
        debug!(target_host = %server.display_target(), "Opening ssh event source");
        self.server = Some(server.clone());
        Ok(())
    }

    async fn run_query(&mut self, query: &str) -> Result<Vec<Value>, SourceError> {
        let quoted = quote_query(query);
        let mut cmd = self.gerrit_command(&["query", "--format=JSON", &quoted])?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = tokio::time::timeout(QUERY_TIMEOUT, cmd.output())
            .await
            .map_err(|_| SourceError::Closed(format!("query timed out after {QUERY_TIMEOUT:?}")))??;

        if !output.status.success() {
            return Err(classify_failure(
                output.status,
                &String::from_utf8_lossy(&output.stderr),
            ));
        }
        parse_lines(&output.stdout)
    }

    async fn start_streaming(&mut self) -> Result<(), SourceError> {
        let mut cmd = self.gerrit_command(&["stream-events"])?;
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Closed("stream-events has no stdout".into()))?;
        let stderr = child.stderr.take().map(collect_stderr);
        info!(pid = child.id(), "Started gerrit stream-events");
        self.stream = Some(Stream {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr,
        });
        Ok(())
    }

    async fn next_event(&mut self) -> Result<Value, SourceError> {
        let stream = self.stream.as_mut().ok_or(SourceError::NotConnected)?;
        loop {
            match stream.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => {
                    return serde_json::from_str(&line)
                        .map_err(|e| SourceError::InvalidResponse(e.to_string()))
                }
                None => return Err(stream.end_reason().await),
            }
        }
    }

    fn is_stream_alive(&mut self) -> bool {
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        match stream.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(%status, "stream-events exited");
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to poll stream-events process");
                false
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.child.kill().await {
                debug!(error = %e, "stream-events already gone");
            }
        }
        self.server = None;
    }

    fn is_connected(&self) -> bool {
        self.server.is_some()
    }
}

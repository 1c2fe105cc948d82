//! Gerrit-Dash: live terminal dashboard for Gerrit review activity.
//!
//! Runs `gerrit stream-events` over ssh in a background watcher and folds
//! the events into a bounded, sortable table.
//!
//! ## Usage
//!
//! ```bash
//! # Watch everything on a server
//! gerrit-dash --host review.example.org -u bot -k ~/.ssh/gerrit_bot
//!
//! # Only two projects, preloading 20 open changes and keeping a record file
//! gerrit-dash --host review.example.org -u bot --project core --project docs \
//!     --prefetch 20 --record-file events.ndjson
//! ```

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gerrit_dash::cli::DEFAULT_LOG_FILTER;
use gerrit_dash::{ui, App, Args};
use gerrit_watch::{SshEventSource, WatcherMessage};

/// Longest the loop waits for a key before checking the tick again.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (watcher_config, dashboard_config) = args.configs().context("invalid configuration")?;
    init_logging(&args.log_file)?;

    info!(
        server = %watcher_config.server.display_target(),
        prefetch = watcher_config.prefetch,
        projects = ?watcher_config.projects,
        "starting dashboard"
    );

    // Setup terminal with panic hook for cleanup
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(watcher_config.server.display_target(), dashboard_config);

    let source = SshEventSource::with_binary(args.ssh_binary.clone());
    let (mut watcher, rx) = gerrit_watch::spawn(watcher_config, source);

    let result = run_app(&mut terminal, &mut app, rx).await;

    watcher.stop().await;
    if let Some(summary) = watcher.join().await {
        info!(
            attempts = summary.attempts,
            delivered = summary.delivered,
            failures = summary.failures.len(),
            "watcher finished"
        );
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!(error = %e, "dashboard stopped");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Send log output to a file; the terminal belongs to the dashboard.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))
        .context("invalid log filter")?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

/// Main application loop.
async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut rx: mpsc::Receiver<WatcherMessage>,
) -> Result<()> {
    let tick = app.tick_interval();
    let mut last_tick: Option<Instant> = None;

    loop {
        if last_tick.map_or(true, |at| at.elapsed() >= tick) {
            app.tick(&mut rx)?;
            last_tick = Some(Instant::now());
        }

        terminal.draw(|frame| ui::render(frame, app))?;

        let since_tick = last_tick.map_or(Duration::ZERO, |at| at.elapsed());
        let timeout = tick.saturating_sub(since_tick).min(POLL_TIMEOUT);
        handle_terminal_events(app, timeout)?;

        if app.should_quit {
            info!("quit requested");
            return Ok(());
        }
    }
}

/// Handle terminal key events.
fn handle_terminal_events(app: &mut App, poll_timeout: Duration) -> Result<()> {
    if !event::poll(poll_timeout)? {
        return Ok(());
    }

    let Event::Key(key) = event::read()? else {
        return Ok(());
    };

    if key.kind == KeyEventKind::Press {
        app.on_key(key.code);
    }
    Ok(())
}

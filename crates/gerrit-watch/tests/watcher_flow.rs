//! End-to-end behavior of the watcher against a scripted event source.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{config, query_row, refused, stream_event, temp_path, Call, ScriptedSource};
use gerrit_watch::{
    EventRecord, ReviewTable, SourceError, Watcher, WatcherMessage, WatcherState,
};
use tokio::sync::mpsc;

/// Run a watcher to completion and collect everything it sent.
async fn run_to_end(
    source: ScriptedSource,
    config: gerrit_watch::WatcherConfig,
) -> (gerrit_watch::WatchSummary, Vec<WatcherMessage>) {
    let (tx, mut rx) = mpsc::channel(64);
    let (_shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let summary = Watcher::new(config, source, tx, shutdown_rx).run().await;
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    (summary, messages)
}

fn events(messages: &[WatcherMessage]) -> Vec<&EventRecord> {
    messages
        .iter()
        .filter_map(|m| match m {
            WatcherMessage::Event(e) => Some(e),
            _ => None,
        })
        .collect()
}

fn states(messages: &[WatcherMessage]) -> Vec<WatcherState> {
    messages
        .iter()
        .filter_map(|m| match m {
            WatcherMessage::State(s) => Some(*s),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_back_off_and_die() {
    let mut source = ScriptedSource::new();
    source.opens = (0..5).map(|_| Err(refused())).collect();
    let calls = source.calls();

    let (summary, messages) = run_to_end(source, config()).await;

    assert_eq!(summary.attempts, 5);
    assert_eq!(summary.state, WatcherState::Dead);
    assert_eq!(summary.failures.len(), 5);
    assert!(summary.failures.iter().all(|f| !f.terminal));

    let opens: Vec<_> = calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            Call::Open(at) => Some(*at),
            _ => None,
        })
        .collect();
    assert_eq!(opens.len(), 5);
    let gaps: Vec<_> = opens.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        gaps,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
            Duration::from_secs(8),
        ]
    );

    assert_eq!(
        states(&messages),
        vec![WatcherState::Connecting, WatcherState::Dead]
    );
    let failures: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            WatcherMessage::Failure(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].attempt, 4);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_failure_stops_after_one_attempt() {
    let mut source = ScriptedSource::new();
    source
        .queries
        .push_back(Err(SourceError::Authentication("Permission denied (publickey)".into())));
    let calls = source.calls();

    let (summary, messages) = run_to_end(source, config()).await;

    assert_eq!(summary.attempts, 1);
    assert_eq!(summary.state, WatcherState::Dead);
    assert!(summary.failures[0].terminal);
    assert!(!calls.lock().unwrap().contains(&Call::StartStreaming));
    assert!(matches!(
        messages.last(),
        Some(WatcherMessage::State(WatcherState::Dead))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_limit_shrinks_after_first_attempt() {
    let mut source = ScriptedSource::new();
    source.queries.push_back(Err(refused()));
    source
        .queries
        .push_back(Ok(vec![query_row("b", 20), query_row("a", 10)]));
    let calls = source.calls();

    let cfg = gerrit_watch::WatcherConfig {
        prefetch: 3,
        projects: vec!["core".into()],
        ..config()
    };
    let (summary, messages) = run_to_end(source, cfg).await;

    let queries: Vec<_> = calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
            Call::Query(q) => Some(q.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        queries,
        vec![
            "status:open limit:3 (project:core)",
            "status:open limit:1 (project:core)",
        ]
    );
    assert_eq!(summary.attempts, 2);

    // The server ignored the limit; only the oldest row survives.
    let delivered = events(&messages);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].change().url, "a");
}

#[tokio::test]
async fn test_consuming_order_and_record_file() {
    let path = temp_path("consume");
    let mut source = ScriptedSource::new();
    source.queries.push_back(Ok(vec![
        query_row("late", 300),
        query_row("early", 100),
        serde_json::json!({"type": "stats", "rowCount": 2}),
    ]));
    source.events.push_back(Ok(stream_event("comment-added", "early")));
    source
        .events
        .push_back(Ok(serde_json::json!({"type": "comment-added"})));
    source.events.push_back(Ok(stream_event("ref-updated", "late")));
    let calls = source.calls();

    let cfg = gerrit_watch::WatcherConfig {
        prefetch: 5,
        record_file: Some(path.clone()),
        ..config()
    };
    let (summary, messages) = run_to_end(source, cfg).await;

    assert_eq!(
        states(&messages),
        vec![
            WatcherState::Connecting,
            WatcherState::Consuming,
            WatcherState::Dead
        ]
    );
    let kinds: Vec<_> = events(&messages)
        .iter()
        .map(|e| (e.kind().to_owned(), e.change().url.clone()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("patchset-created".to_owned(), "early".to_owned()),
            ("patchset-created".to_owned(), "late".to_owned()),
            ("comment-added".to_owned(), "early".to_owned()),
            ("ref-updated".to_owned(), "late".to_owned()),
        ]
    );
    assert_eq!(summary.delivered, 4);

    // The sanity query precedes the subscription.
    let calls = calls.lock().unwrap();
    let query_at = calls.iter().position(|c| matches!(c, Call::Query(_))).unwrap();
    let stream_at = calls.iter().position(|c| *c == Call::StartStreaming).unwrap();
    assert!(query_at < stream_at);
    drop(calls);

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents.lines().count(), 4);
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_replay_is_not_reappended_and_is_idempotent() {
    let path = temp_path("replay");
    let lines = [
        stream_event("patchset-created", "r1").to_string(),
        "this is not json".to_owned(),
        serde_json::json!({"type": "change-merged"}).to_string(),
        stream_event("patchset-created", "r2").to_string(),
        stream_event("change-merged", "r1").to_string(),
    ];
    tokio::fs::write(&path, lines.join("\n") + "\n").await.unwrap();

    let mut table = ReviewTable::new(10);
    for _ in 0..2 {
        let cfg = gerrit_watch::WatcherConfig {
            record_file: Some(path.clone()),
            ..config()
        };
        let (_, messages) = run_to_end(ScriptedSource::new(), cfg).await;
        let replayed = events(&messages);
        assert_eq!(replayed.len(), 3);
        for event in replayed {
            table.apply(event, Utc::now()).unwrap();
        }
    }

    assert_eq!(table.len(), 2);
    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(contents.lines().count(), lines.len());
    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn test_unwritable_record_file_does_not_stop_delivery() {
    // A directory can be neither replayed nor appended to.
    let mut source = ScriptedSource::new();
    source.events.push_back(Ok(stream_event("patchset-created", "x")));
    source.events.push_back(Ok(stream_event("change-merged", "x")));
    let cfg = gerrit_watch::WatcherConfig {
        record_file: Some(std::env::temp_dir()),
        ..config()
    };

    let (summary, messages) = run_to_end(source, cfg).await;

    let urls: Vec<_> = events(&messages)
        .iter()
        .map(|e| e.change().url.clone())
        .collect();
    assert_eq!(urls, vec!["x", "x"]);
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.state, WatcherState::Dead);
    // Only the end of the stream is a failure; write errors are not.
    assert_eq!(summary.failures.len(), 1);
}

#[tokio::test]
async fn test_read_error_on_live_stream_keeps_consuming() {
    let mut source = ScriptedSource::new();
    source
        .events
        .push_back(Err(SourceError::InvalidResponse("garbled line".into())));
    source.events.push_back(Ok(stream_event("patchset-created", "x")));

    let (summary, messages) = run_to_end(source, config()).await;

    let delivered = events(&messages);
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].change().url, "x");
    assert_eq!(summary.state, WatcherState::Dead);
    // Only the end of the stream counts as a failure.
    assert_eq!(summary.failures.len(), 1);
}

#[tokio::test]
async fn test_shutdown_interrupts_blocking_read() {
    let mut source = ScriptedSource::new();
    source.hang_when_drained = true;

    let (mut handle, mut rx) = gerrit_watch::spawn(config(), source);
    assert_eq!(
        rx.recv().await,
        Some(WatcherMessage::State(WatcherState::Connecting))
    );
    assert_eq!(
        rx.recv().await,
        Some(WatcherMessage::State(WatcherState::Consuming))
    );

    handle.stop().await;
    let summary = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.state, WatcherState::Dead);
    assert!(summary.failures.is_empty());
}

#[tokio::test]
async fn test_small_queue_preserves_order() {
    let mut source = ScriptedSource::new();
    for i in 0..20 {
        source
            .events
            .push_back(Ok(stream_event("patchset-created", &format!("u{i}"))));
    }
    let cfg = gerrit_watch::WatcherConfig {
        queue_capacity: 1,
        ..config()
    };
    let (handle, mut rx) = gerrit_watch::spawn(cfg, source);

    let mut urls = Vec::new();
    while let Some(message) = rx.recv().await {
        match message {
            WatcherMessage::Event(e) => urls.push(e.change().url.clone()),
            WatcherMessage::State(WatcherState::Dead) => break,
            _ => {}
        }
    }
    let expected: Vec<_> = (0..20).map(|i| format!("u{i}")).collect();
    assert_eq!(urls, expected);
    assert!(handle.join().await.is_some());
}

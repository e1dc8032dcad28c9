use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use vigilant_client::{BatchResponse, ScanBackend, ServerProgress};
use vigilant_core::{FileReport, ThreatLevel};
use vigilant_scan::{
    ClientConfig, ClientError, FileHandle, ScanResult, ScanSessionManager, ScanSummary,
    SelectionMode, SessionEvent, SessionOutcome, SessionState, Severity,
};

type BatchReply = Result<BatchResponse, ClientError>;

/// In-memory server. Each submission waits on the next scripted reply; with
/// none scripted it never resolves.
#[derive(Default)]
struct ScriptedBackend {
    replies: Mutex<VecDeque<oneshot::Receiver<BatchReply>>>,
    progress: Mutex<Option<Result<ServerProgress, ClientError>>>,
    abort_result: Mutex<Option<ClientError>>,
    submit_calls: AtomicUsize,
    progress_calls: AtomicUsize,
    abort_calls: AtomicUsize,
}

impl ScriptedBackend {
    fn script(&self) -> oneshot::Sender<BatchReply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(rx);
        tx
    }

    fn set_progress(&self, progress: Result<ServerProgress, ClientError>) {
        *self.progress.lock().unwrap() = Some(progress);
    }

    fn fail_abort(&self, err: ClientError) {
        *self.abort_result.lock().unwrap() = Some(err);
    }

    fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    fn polls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }

    fn aborts(&self) -> usize {
        self.abort_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanBackend for ScriptedBackend {
    async fn submit_batch(&self, _files: &[FileHandle]) -> Result<BatchResponse, ClientError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(ClientError::transport("script dropped"))),
            None => std::future::pending().await,
        }
    }

    async fn fetch_progress(&self) -> Result<ServerProgress, ClientError> {
        self.progress_calls.fetch_add(1, Ordering::SeqCst);
        self.progress
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(ServerProgress::default()))
    }

    async fn request_abort(&self) -> Result<(), ClientError> {
        self.abort_calls.fetch_add(1, Ordering::SeqCst);
        match self.abort_result.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn setup() -> (Arc<ScriptedBackend>, ScanSessionManager) {
    let backend = Arc::new(ScriptedBackend::default());
    let manager = ScanSessionManager::new(backend.clone(), &ClientConfig::default());
    (backend, manager)
}

fn file(name: &str) -> FileHandle {
    FileHandle::new(name, 64, format!("/data/{name}"))
}

fn select(manager: &ScanSessionManager, names: &[&str]) {
    assert!(manager.with_selection(|s| s.set_files(names.iter().map(|n| file(n)))));
}

fn analyzed(name: &str, score: u8) -> ScanResult {
    ScanResult::analyzed(
        name,
        FileReport {
            threat_score: Some(score),
            threat_level: ThreatLevel::Low,
            size_human: None,
            mime_type: None,
            permissions: None,
            file_age_days: 0,
            indicators: Vec::new(),
            content_hash: None,
        },
    )
}

fn batch(results: Vec<ScanResult>) -> BatchReply {
    Ok(BatchResponse {
        results,
        scan_id: None,
    })
}

/// Let spawned tasks run; with paused time this also advances the clock.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_completed_session_summarizes_results() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt", "b.exe", "c.bin"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    assert_eq!(manager.state(), SessionState::Submitting);
    assert!(manager.with_selection(|s| s.is_locked()));

    reply
        .send(batch(vec![
            analyzed("a.txt", 10),
            analyzed("b.exe", 80),
            ScanResult::failed("c.bin", "Permission denied"),
        ]))
        .unwrap();

    let (results, summary) = match handle.wait().await {
        SessionOutcome::Completed { results, summary } => (results, summary),
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(
        summary,
        ScanSummary {
            clean: 1,
            threats: 1,
            errors: 1
        }
    );
    let names: Vec<_> = results.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, ["a.txt", "b.exe", "c.bin"]);

    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Completed);
    assert_eq!(session.input_count, 3);
    assert_eq!(session.results.len(), 3);
    assert!(session.finished_at.is_some());

    assert_eq!(manager.with_notifications(|n| n.len()), 1);
    let note = manager.latest_notification().unwrap();
    assert_eq!(note.title, "Scan complete");
    assert_eq!(note.message, "1 clean, 1 threats, 1 errors");
    assert_eq!(note.severity, Severity::Success);
}

#[tokio::test(start_paused = true)]
async fn test_empty_selection_issues_no_request() {
    let (backend, manager) = setup();

    let err = manager.start_scan().unwrap_err();
    assert_eq!(err, ClientError::EmptySelection);

    settle().await;
    assert_eq!(backend.submits(), 0);
    assert_eq!(backend.polls(), 0);
    assert_eq!(manager.state(), SessionState::Idle);
    assert!(manager.with_notifications(|n| n.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    let err = manager.start_scan().unwrap_err();
    assert_eq!(err, ClientError::AlreadyScanning);

    settle().await;
    assert_eq!(backend.submits(), 1);
    let session = manager.session().unwrap();
    assert_eq!(session.id, handle.id());
    assert_eq!(session.state, SessionState::Submitting);

    reply.send(batch(vec![analyzed("a.txt", 0)])).unwrap();
    assert_eq!(handle.wait().await.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_abort_ends_session_once() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt", "b.txt"]);
    let mut events = manager.subscribe();

    let handle = manager.start_scan().unwrap();
    settle().await;

    assert!(manager.abort(&handle));
    assert!(!manager.abort(&handle));

    let outcome = handle.wait().await;
    assert_eq!(outcome, SessionOutcome::Aborted);
    settle().await;

    assert_eq!(backend.aborts(), 1);
    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Aborted);
    assert!(session.results.is_empty());
    assert!(session.is_cancelled());

    assert_eq!(manager.with_notifications(|n| n.len()), 1);
    assert_eq!(manager.latest_notification().unwrap().severity, Severity::Warning);

    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::Started { input_count: 2, .. }
    ));
    loop {
        if let SessionEvent::Finished { state, summary, .. } = events.recv().await.unwrap() {
            assert_eq!(state, SessionState::Aborted);
            assert!(summary.is_none());
            break;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_abort_survives_server_failure() {
    let (backend, manager) = setup();
    backend.fail_abort(ClientError::Http {
        status: 500,
        body: String::new(),
    });
    select(&manager, &["a.txt"]);

    let handle = manager.start_scan().unwrap();
    assert!(manager.abort(&handle));

    assert_eq!(handle.wait().await, SessionOutcome::Aborted);
    settle().await;
    assert_eq!(backend.aborts(), 1);
    assert_eq!(manager.state(), SessionState::Aborted);
}

#[tokio::test(start_paused = true)]
async fn test_abort_after_finish_is_noop() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    reply.send(batch(vec![analyzed("a.txt", 0)])).unwrap();
    while !handle.is_finished() {
        settle().await;
    }

    assert!(!manager.abort(&handle));
    settle().await;
    assert_eq!(backend.aborts(), 0);
    assert_eq!(manager.state(), SessionState::Completed);
    assert_eq!(manager.with_notifications(|n| n.len()), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abort_after_failure_is_noop() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    reply.send(Err(ClientError::transport("offline"))).unwrap();
    while !handle.is_finished() {
        settle().await;
    }

    assert!(!manager.abort(&handle));
    settle().await;
    assert_eq!(backend.aborts(), 0);
    assert_eq!(manager.state(), SessionState::Failed);
    assert_eq!(manager.with_notifications(|n| n.len()), 1);
    assert_eq!(manager.latest_notification().unwrap().title, "Scan failed");
}

#[tokio::test(start_paused = true)]
async fn test_late_batch_reply_after_abort_is_discarded() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt", "b.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    settle().await;
    assert!(manager.abort(&handle));
    // The receiver may already be gone once the request future is dropped.
    let _ = reply.send(batch(vec![analyzed("a.txt", 0), analyzed("b.txt", 90)]));

    assert_eq!(handle.wait().await, SessionOutcome::Aborted);
    settle().await;

    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Aborted);
    assert!(session.results.is_empty());
    assert_eq!(manager.with_notifications(|n| n.len()), 1);
    assert_eq!(manager.latest_notification().unwrap().title, "Scan aborted");
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_surfaces_message() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    reply
        .send(Err(ClientError::transport("connection reset by peer")))
        .unwrap();

    let outcome = handle.wait().await;
    assert_eq!(
        outcome,
        SessionOutcome::Failed {
            message: "connection reset by peer".to_string()
        }
    );

    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Failed);
    assert_eq!(session.error.as_deref(), Some("connection reset by peer"));

    let note = manager.latest_notification().unwrap();
    assert_eq!(note.title, "Scan failed");
    assert_eq!(note.message, "connection reset by peer");
    assert_eq!(note.severity, Severity::Error);
}

#[tokio::test(start_paused = true)]
async fn test_http_failure_message() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    reply
        .send(Err(ClientError::Http {
            status: 503,
            body: "busy".to_string(),
        }))
        .unwrap();

    assert_eq!(
        handle.wait().await,
        SessionOutcome::Failed {
            message: "HTTP error! status: 503".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_selection_released_after_finish() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt", "b.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    assert!(!manager.with_selection(|s| s.set_files([file("c.txt")])));
    assert_eq!(manager.with_selection(|s| s.len()), 2);

    reply.send(Err(ClientError::transport("offline"))).unwrap();
    handle.wait().await;

    manager.with_selection(|selection| {
        assert!(selection.is_empty());
        assert!(!selection.is_locked());
    });
}

#[tokio::test(start_paused = true)]
async fn test_new_session_after_terminal_state() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let first_reply = backend.script();

    let first = manager.start_scan().unwrap();
    first_reply.send(batch(vec![analyzed("a.txt", 0)])).unwrap();
    let first_id = first.id();
    first.wait().await;

    // The finished selection is gone; a new one starts a fresh session.
    assert_eq!(
        manager.start_scan().unwrap_err(),
        ClientError::EmptySelection
    );
    select(&manager, &["b.txt", "c.txt"]);
    let second_reply = backend.script();

    let second = manager.start_scan().unwrap();
    assert!(second.id() > first_id);
    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Submitting);
    assert!(session.results.is_empty());
    assert_eq!(session.input_count, 2);

    second_reply
        .send(batch(vec![analyzed("b.txt", 99), analyzed("c.txt", 50)]))
        .unwrap();
    assert_eq!(
        second.wait().await.summary(),
        Some(ScanSummary {
            clean: 0,
            threats: 2,
            errors: 0
        })
    );
    assert_eq!(manager.with_notifications(|n| n.len()), 2);
}

#[tokio::test(start_paused = true)]
async fn test_polls_every_500ms_until_finished() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(backend.polls(), 0);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(backend.polls() >= 3);

    reply.send(batch(Vec::new())).unwrap();
    handle.wait().await;

    let polls = backend.polls();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(backend.polls(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_poll_failures_do_not_end_session() {
    let (backend, manager) = setup();
    backend.set_progress(Err(ClientError::transport("progress endpoint down")));
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(backend.polls() >= 5);
    assert_eq!(manager.state(), SessionState::Submitting);
    assert!(handle.latest_progress().elapsed >= Duration::from_secs(2));

    reply.send(batch(vec![analyzed("a.txt", 0)])).unwrap();
    assert_eq!(handle.wait().await.state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_progress_reaches_handle() {
    let (backend, manager) = setup();
    backend.set_progress(Ok(ServerProgress {
        is_scanning: true,
        progress: 40,
        processed_files: 2,
        total_files: 5,
        current_file: "/srv/uploads/0_quarterly_financial_report_final.xlsx".to_string(),
    }));
    select(&manager, &["a", "b", "c", "d", "e"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    let mut progress = handle.progress();
    progress.changed().await.unwrap();

    let latest = handle.latest_progress();
    assert_eq!(latest.session_id, handle.id());
    assert_eq!(latest.percent, 40);
    assert_eq!(latest.processed_files, 2);
    assert_eq!(latest.current_file, "0_quarterly_financia...");
    assert_eq!(latest.status_line(), "Scanning: 2/5 files (40%)");

    reply.send(batch(Vec::new())).unwrap();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_server_progress_is_ignored() {
    let (backend, manager) = setup();
    select(&manager, &["a.txt"]);
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert!(backend.polls() >= 3);
    let latest = handle.latest_progress();
    assert_eq!(latest.updates, 0);
    assert_eq!(latest.percent, 0);
    assert_eq!(latest.total_files, 1);

    reply.send(batch(Vec::new())).unwrap();
    handle.wait().await;
}

#[tokio::test(start_paused = true)]
async fn test_clear_results() {
    let (backend, manager) = setup();
    assert!(!manager.clear_results());

    select(&manager, &["a.txt"]);
    let reply = backend.script();
    let handle = manager.start_scan().unwrap();
    assert!(!manager.clear_results());

    reply.send(batch(vec![analyzed("a.txt", 0)])).unwrap();
    handle.wait().await;

    assert!(manager.clear_results());
    assert_eq!(manager.state(), SessionState::Idle);
    assert!(manager.session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_directory_session_records_root() {
    let (backend, manager) = setup();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("inbox");
    std::fs::create_dir_all(root.join("sub")).unwrap();
    std::fs::write(root.join("one.txt"), "1").unwrap();
    std::fs::write(root.join("sub/two.txt"), "22").unwrap();

    assert!(manager.with_selection(|s| s.set_directory_from_path(&root)).unwrap());
    let reply = backend.script();

    let handle = manager.start_scan().unwrap();
    let session = manager.session().unwrap();
    assert_eq!(session.root.as_deref(), Some("inbox"));
    assert_eq!(session.input_count, 2);

    reply.send(batch(Vec::new())).unwrap();
    assert_eq!(handle.wait().await.state(), SessionState::Completed);
    assert_eq!(manager.with_selection(|s| s.mode()), SelectionMode::Files);
}

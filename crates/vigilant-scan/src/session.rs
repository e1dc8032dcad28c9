//! Scan-session lifecycle: submission, progress polling, cancellation and
//! result aggregation.
//!
//! Two producers feed each session. The batch submission is authoritative and
//! alone decides the terminal state; the progress poller only updates
//! observable progress. Terminal transitions are written by the session's
//! driver task exactly once, after which the selection is cleared and a
//! notification is emitted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use compact_str::CompactString;
use strum::Display;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigilant_client::ScanBackend;
use vigilant_core::{
    BatchResponse, ClientConfig, ClientError, FileHandle, Notification, NotificationCenter,
    ScanResult, ScanSummary, Severity,
};

use crate::SESSION_CHANNEL_SIZE;
use crate::progress::SessionProgress;
use crate::selection::{SelectionMode, SelectionSet, SelectionStore};

/// Client-generated session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scan-{}", self.0)
    }
}

/// Lifecycle state: `Idle -> Submitting -> {Completed | Aborted | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SessionState {
    #[default]
    Idle,
    Submitting,
    Completed,
    Aborted,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }
}

/// One scan job, in flight or finished.
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: SessionId,
    pub state: SessionState,
    pub mode: SelectionMode,
    /// Directory name for directory scans.
    pub root: Option<CompactString>,
    /// Number of files submitted.
    pub input_count: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    /// Per-file results in server order; only populated on completion.
    pub results: Vec<ScanResult>,
    /// Failure message, for failed sessions.
    pub error: Option<String>,
    cancel: CancellationToken,
    abort_requested: bool,
}

impl ScanSession {
    fn new(id: SessionId, selection: &SelectionSet, cancel: CancellationToken) -> Self {
        Self {
            id,
            state: SessionState::Submitting,
            mode: selection.mode(),
            root: selection.root().map(CompactString::from),
            input_count: selection.len(),
            started_at: Local::now(),
            finished_at: None,
            results: Vec::new(),
            error: None,
            cancel,
            abort_requested: false,
        }
    }

    /// Whether the session still holds the active slot.
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Submitting
    }

    /// Whether this session's cancellation token has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn summary(&self, threshold: u8) -> ScanSummary {
        ScanSummary::from_results(&self.results, threshold)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed {
        results: Vec<ScanResult>,
        summary: ScanSummary,
    },
    Aborted,
    Failed {
        message: String,
    },
}

impl SessionOutcome {
    pub fn state(&self) -> SessionState {
        match self {
            Self::Completed { .. } => SessionState::Completed,
            Self::Aborted => SessionState::Aborted,
            Self::Failed { .. } => SessionState::Failed,
        }
    }

    pub fn summary(&self) -> Option<ScanSummary> {
        match self {
            Self::Completed { summary, .. } => Some(*summary),
            _ => None,
        }
    }

    fn notification(&self) -> (&'static str, String, Severity) {
        match self {
            Self::Completed { summary, .. } => {
                ("Scan complete", summary.to_string(), Severity::Success)
            }
            Self::Aborted => {
                ("Scan aborted", "Scan aborted by user".to_string(), Severity::Warning)
            }
            Self::Failed { message } => ("Scan failed", message.clone(), Severity::Error),
        }
    }
}

/// Session lifecycle events for the view layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Started {
        id: SessionId,
        input_count: usize,
    },
    Progress(SessionProgress),
    Finished {
        id: SessionId,
        state: SessionState,
        summary: Option<ScanSummary>,
    },
}

/// Caller's reference to a started session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    progress: watch::Receiver<SessionProgress>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Receiver for progress updates.
    pub fn progress(&self) -> watch::Receiver<SessionProgress> {
        self.progress.clone()
    }

    /// Most recent progress.
    pub fn latest_progress(&self) -> SessionProgress {
        self.progress.borrow().clone()
    }

    /// Whether the session has finalized.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to finalize.
    pub async fn wait(self) -> SessionOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(err) => SessionOutcome::Failed {
                message: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SessionSettings {
    poll_interval: Duration,
    name_limit: usize,
    threat_threshold: u8,
}

impl SessionSettings {
    fn from_config(config: &ClientConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            name_limit: config.display_name_limit,
            threat_threshold: config.threat_threshold,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    session: Option<ScanSession>,
    next_id: u64,
}

struct Shared {
    slot: Mutex<Slot>,
    selection: Mutex<SelectionStore>,
    notifications: Mutex<NotificationCenter>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single active-session slot, the selection it consumes and the
/// notification center it reports to.
///
/// The selection and notification center are only reachable through
/// closures, so no lock outlives a single call.
pub struct ScanSessionManager {
    backend: Arc<dyn ScanBackend>,
    settings: SessionSettings,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ScanSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSessionManager")
            .field("settings", &self.settings)
            .field("state", &self.state())
            .finish()
    }
}

impl ScanSessionManager {
    /// Create a manager with an empty selection and notification center.
    pub fn new(backend: Arc<dyn ScanBackend>, config: &ClientConfig) -> Self {
        let (events, _) = broadcast::channel(SESSION_CHANNEL_SIZE);
        Self {
            backend,
            settings: SessionSettings::from_config(config),
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot::default()),
                selection: Mutex::new(SelectionStore::new()),
                notifications: Mutex::new(NotificationCenter::new(config.notification_capacity)),
                events,
            }),
        }
    }

    /// Run `f` against the selection store consumed by the next scan.
    pub fn with_selection<R>(&self, f: impl FnOnce(&mut SelectionStore) -> R) -> R {
        f(&mut lock(&self.shared.selection))
    }

    /// Run `f` against the notification center sessions report to.
    pub fn with_notifications<R>(&self, f: impl FnOnce(&mut NotificationCenter) -> R) -> R {
        f(&mut lock(&self.shared.notifications))
    }

    /// Copy of the newest notification.
    pub fn latest_notification(&self) -> Option<Notification> {
        lock(&self.shared.notifications).latest().cloned()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Current slot state; `Idle` when no session is held.
    pub fn state(&self) -> SessionState {
        lock(&self.shared.slot)
            .session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    pub fn is_scanning(&self) -> bool {
        self.state() == SessionState::Submitting
    }

    /// Copy of the current or last session.
    pub fn session(&self) -> Option<ScanSession> {
        lock(&self.shared.slot).session.clone()
    }

    /// Score at or above which results count as threats.
    pub fn threat_threshold(&self) -> u8 {
        self.settings.threat_threshold
    }

    /// Start scanning the current selection.
    ///
    /// Fails with [`ClientError::AlreadyScanning`] while a session is active
    /// and with [`ClientError::EmptySelection`] when nothing is selected; no
    /// request is issued in either case. A finished session still held in the
    /// slot is discarded first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_scan(&self) -> Result<SessionHandle, ClientError> {
        let mut slot = lock(&self.shared.slot);
        if slot.session.as_ref().is_some_and(ScanSession::is_active) {
            debug!("rejecting scan start, session already active");
            return Err(ClientError::AlreadyScanning);
        }

        let selection = {
            let mut store = lock(&self.shared.selection);
            if store.is_empty() {
                debug!("rejecting scan start, selection is empty");
                return Err(ClientError::EmptySelection);
            }
            store.set_locked(true);
            store.snapshot()
        };

        slot.session = None;
        slot.next_id += 1;
        let id = SessionId::new(slot.next_id);
        let cancel = CancellationToken::new();
        let session = ScanSession::new(id, &selection, cancel.clone());
        let input_count = session.input_count;
        slot.session = Some(session);
        drop(slot);

        info!(
            session_id = %id,
            files = input_count,
            mode = %selection.mode(),
            "scan session started"
        );
        let _ = self.shared.events.send(SessionEvent::Started { id, input_count });

        let (progress_tx, progress_rx) =
            watch::channel(SessionProgress::new(id, input_count as u64));
        let driver = SessionDriver {
            shared: Arc::clone(&self.shared),
            backend: Arc::clone(&self.backend),
            settings: self.settings,
            id,
            cancel,
            progress: progress_tx,
        };
        let task = tokio::spawn(driver.run(selection.into_items()));

        Ok(SessionHandle {
            id,
            progress: progress_rx,
            task,
        })
    }

    /// Abort a running session.
    ///
    /// Cancels the in-flight submission and sends a best-effort abort to the
    /// server. The session ends `Aborted` whether or not the server
    /// acknowledges. Returns false, doing nothing, if the session is no longer
    /// active or an abort was already requested.
    pub fn abort(&self, handle: &SessionHandle) -> bool {
        self.abort_session(handle.id())
    }

    /// Abort by session id, for callers that have handed the handle to a
    /// waiter. Ids of finished or replaced sessions are ignored.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn abort_session(&self, id: SessionId) -> bool {
        {
            let mut slot = lock(&self.shared.slot);
            let Some(session) = slot.session.as_mut().filter(|s| s.id == id) else {
                return false;
            };
            if !session.is_active() || session.abort_requested {
                return false;
            }
            session.abort_requested = true;
            session.cancel.cancel();
        }

        info!(session_id = %id, "scan abort requested");
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            if let Err(err) = backend.request_abort().await {
                warn!(session_id = %id, error = %err, "server abort request failed");
            }
        });
        true
    }

    /// Drop a finished session, returning the slot to `Idle`.
    ///
    /// Returns false while a session is active or when there is nothing to
    /// clear.
    pub fn clear_results(&self) -> bool {
        let mut slot = lock(&self.shared.slot);
        match &slot.session {
            Some(session) if !session.is_active() => {
                slot.session = None;
                true
            }
            _ => false,
        }
    }
}

/// Runs one session: the submission, the poller, and finalization.
struct SessionDriver {
    shared: Arc<Shared>,
    backend: Arc<dyn ScanBackend>,
    settings: SessionSettings,
    id: SessionId,
    cancel: CancellationToken,
    progress: watch::Sender<SessionProgress>,
}

impl SessionDriver {
    async fn run(self, files: Vec<FileHandle>) -> SessionOutcome {
        let finalizer = Finalizer {
            shared: Arc::clone(&self.shared),
            id: self.id,
            threshold: self.settings.threat_threshold,
            done: false,
        };

        let poll_stop = self.cancel.child_token();
        let _poll_guard = poll_stop.clone().drop_guard();
        let poller = tokio::spawn(poll_progress(
            Arc::clone(&self.backend),
            Arc::clone(&self.shared),
            poll_stop.clone(),
            self.progress,
            self.settings,
        ));

        let result = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ClientError::Cancelled),
            result = self.backend.submit_batch(&files) => result,
        };

        poll_stop.cancel();
        if let Err(err) = poller.await {
            debug!(session_id = %self.id, error = %err, "progress poller ended abnormally");
        }

        finalizer.finish(result)
    }
}

/// Poll server progress until `stop` is cancelled. Failures are logged only.
async fn poll_progress(
    backend: Arc<dyn ScanBackend>,
    shared: Arc<Shared>,
    stop: CancellationToken,
    progress: watch::Sender<SessionProgress>,
    settings: SessionSettings,
) {
    let started = Instant::now();
    let period = settings.poll_interval;
    let mut ticker = tokio::time::interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = stop.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            () = stop.cancelled() => break,
            fetched = backend.fetch_progress() => fetched,
        };

        let elapsed = started.elapsed();
        match fetched {
            Ok(report) => {
                let mut applied = false;
                progress.send_modify(|p| {
                    p.elapsed = elapsed;
                    applied = p.apply(&report, settings.name_limit);
                });
                if applied {
                    let snapshot = progress.borrow().clone();
                    let _ = shared.events.send(SessionEvent::Progress(snapshot));
                }
            }
            Err(err) => {
                progress.send_modify(|p| p.elapsed = elapsed);
                warn!(error = %err, "progress poll failed");
            }
        }
    }
}

/// Runs finalization exactly once, including when the driver is dropped
/// before the submission resolves.
struct Finalizer {
    shared: Arc<Shared>,
    id: SessionId,
    threshold: u8,
    done: bool,
}

impl Finalizer {
    fn finish(mut self, result: Result<BatchResponse, ClientError>) -> SessionOutcome {
        self.done = true;
        finalize(&self.shared, self.id, self.threshold, result)
    }
}

impl Drop for Finalizer {
    fn drop(&mut self) {
        if !self.done {
            let result = Err(ClientError::transport("scan task stopped before the batch resolved"));
            finalize(&self.shared, self.id, self.threshold, result);
        }
    }
}

fn finalize(
    shared: &Shared,
    id: SessionId,
    threshold: u8,
    result: Result<BatchResponse, ClientError>,
) -> SessionOutcome {
    let mut slot = lock(&shared.slot);
    let Some(session) = slot.session.as_mut().filter(|s| s.id == id) else {
        debug!(session_id = %id, "session no longer held, skipping finalization");
        return SessionOutcome::Aborted;
    };

    let outcome = if session.abort_requested {
        SessionOutcome::Aborted
    } else {
        match result {
            Ok(response) => SessionOutcome::Completed {
                summary: ScanSummary::from_results(&response.results, threshold),
                results: response.results,
            },
            Err(err) if err.is_cancelled() => SessionOutcome::Aborted,
            Err(err) => SessionOutcome::Failed {
                message: err.to_string(),
            },
        }
    };

    session.state = outcome.state();
    session.finished_at = Some(Local::now());
    match &outcome {
        SessionOutcome::Completed { results, .. } => session.results = results.clone(),
        SessionOutcome::Failed { message } => session.error = Some(message.clone()),
        SessionOutcome::Aborted => {}
    }

    {
        let mut store = lock(&shared.selection);
        store.clear();
        store.set_locked(false);
    }

    let (title, message, severity) = outcome.notification();
    lock(&shared.notifications).add(title, message, severity);
    drop(slot);

    match &outcome {
        SessionOutcome::Completed { summary, .. } => {
            info!(session_id = %id, %summary, "scan session completed");
        }
        SessionOutcome::Aborted => info!(session_id = %id, "scan session aborted"),
        SessionOutcome::Failed { message } => {
            warn!(session_id = %id, error = %message, "scan session failed");
        }
    }
    let _ = shared.events.send(SessionEvent::Finished {
        id,
        state: outcome.state(),
        summary: outcome.summary(),
    });

    outcome
}

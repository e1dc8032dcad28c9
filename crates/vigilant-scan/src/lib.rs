//! Scan-session management for vigilant.
//!
//! # Overview
//!
//! `vigilant-scan` turns a user's selection into a server-side scan job and
//! tracks it to a terminal state:
//!
//! - **Selection store** holding either individual files or a whole directory
//! - **Single active session** guarded by the manager
//! - **Progress polling** every 500ms while the batch request is in flight
//! - **Cancellation** through a per-session token plus a best-effort server abort
//! - **Notifications** emitted exactly once per finished session
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigilant_client::HttpBackend;
//! use vigilant_scan::{ClientConfig, ScanSessionManager, SessionOutcome};
//!
//! # async fn run() -> Result<(), vigilant_scan::ClientError> {
//! let config = ClientConfig::default();
//! let backend = Arc::new(HttpBackend::new(config.clone())?);
//! let manager = ScanSessionManager::new(backend, &config);
//!
//! manager.with_selection(|selection| selection.set_directory_from_path("/home/me/Downloads"))?;
//! let handle = manager.start_scan()?;
//! if let SessionOutcome::Completed { summary, .. } = handle.wait().await {
//!     println!("{summary}");
//! }
//! # Ok(())
//! # }
//! ```

mod progress;
mod selection;
mod session;
mod walk;

/// Capacity of the selection change channel.
pub const SELECTION_CHANNEL_SIZE: usize = 64;

/// Capacity of the session event channel.
pub const SESSION_CHANNEL_SIZE: usize = 100;

pub use progress::SessionProgress;
pub use selection::{SelectionEvent, SelectionMode, SelectionSet, SelectionStore};
pub use session::{
    ScanSession, ScanSessionManager, SessionEvent, SessionHandle, SessionId, SessionOutcome,
    SessionState,
};
pub use walk::collect_directory;

// Re-export core types for convenience
pub use vigilant_core::{
    ClientConfig, ClientError, FileHandle, Notification, NotificationCenter, ScanResult,
    ScanSummary, Severity,
};

//! Observable progress of a running scan session.

use std::time::Duration;

use vigilant_core::{ServerProgress, truncate_display_name};

use crate::session::SessionId;

/// Progress information during a scan session.
///
/// Built from polled server telemetry; it never decides how the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub session_id: SessionId,
    /// Percentage reported by the server, 0 to 100.
    pub percent: u8,
    pub processed_files: u64,
    pub total_files: u64,
    /// Current file's base name, truncated for display.
    pub current_file: String,
    /// Time since the session started.
    pub elapsed: Duration,
    /// Number of successful polls so far.
    pub updates: u64,
}

impl SessionProgress {
    /// Create initial progress state for a session of `total_files` files.
    pub fn new(session_id: SessionId, total_files: u64) -> Self {
        Self {
            session_id,
            percent: 0,
            processed_files: 0,
            total_files,
            current_file: String::new(),
            elapsed: Duration::ZERO,
            updates: 0,
        }
    }

    /// Fold in a server report.
    ///
    /// Reports from a server that is not scanning (stale state from an
    /// earlier job, or not started yet) are ignored.
    pub fn apply(&mut self, server: &ServerProgress, name_limit: usize) -> bool {
        if !server.is_scanning {
            return false;
        }
        self.percent = server.percent();
        self.processed_files = server.processed_files;
        if server.total_files > 0 {
            self.total_files = server.total_files;
        }
        let name = server.current_file_name();
        self.current_file = if name.is_empty() {
            "...".to_string()
        } else {
            truncate_display_name(name, name_limit)
        };
        self.updates += 1;
        true
    }

    /// Calculate scan rate in files per second.
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.processed_files as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// One-line status, e.g. `Scanning: 3/10 files (30%)`.
    pub fn status_line(&self) -> String {
        format!(
            "Scanning: {}/{} files ({}%)",
            self.processed_files, self.total_files, self.percent
        )
    }
}

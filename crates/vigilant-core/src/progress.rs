//! Server-reported scan progress.

use serde::{Deserialize, Serialize};

/// Body of `GET /scan/progress`.
///
/// This is best-effort telemetry: it may lag or run ahead of the batch
/// response and never decides how a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerProgress {
    pub is_scanning: bool,
    /// Percentage, 0 to 100.
    pub progress: u8,
    pub processed_files: u64,
    pub total_files: u64,
    /// Path or label of the file being processed, as sent by the server.
    pub current_file: String,
}

impl ServerProgress {
    /// The current file's base name, accepting both `/` and `\` separators.
    pub fn current_file_name(&self) -> &str {
        self.current_file
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
    }

    /// Percentage clamped to 100.
    pub fn percent(&self) -> u8 {
        self.progress.min(100)
    }
}

/// Shorten a file name for progress display.
///
/// Names longer than `limit` characters keep their first `limit` characters
/// followed by `...`. Only used for display; results keep the full name.
pub fn truncate_display_name(name: &str, limit: usize) -> String {
    if name.chars().count() <= limit {
        name.to_string()
    } else {
        let head: String = name.chars().take(limit).collect();
        format!("{head}...")
    }
}

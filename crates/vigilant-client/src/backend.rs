//! The server seam used by the scan-session manager.

use async_trait::async_trait;

use vigilant_core::{BatchResponse, ClientError, FileHandle, ServerProgress};

/// Server operations a scan session depends on.
///
/// Dropping the future returned by [`ScanBackend::submit_batch`] cancels the
/// request locally; it does not stop the server. [`ScanBackend::request_abort`]
/// is the separate, best-effort way to ask the server to stop.
#[async_trait]
pub trait ScanBackend: Send + Sync {
    /// Upload all files as a single batch and wait for per-file results.
    async fn submit_batch(&self, files: &[FileHandle]) -> Result<BatchResponse, ClientError>;

    /// Fetch the server's view of the running scan.
    async fn fetch_progress(&self) -> Result<ServerProgress, ClientError>;

    /// Ask the server to stop the running scan.
    async fn request_abort(&self) -> Result<(), ClientError>;
}

//! HTTP transport for the vigilant dashboard server.
//!
//! The scan-session manager talks to the server only through the
//! [`ScanBackend`] trait, so tests can substitute a scripted backend.
//! [`HttpBackend`] is the real implementation over `reqwest`.
//!
//! # Endpoints
//!
//! - `POST /scan/batch` - multipart upload, one `files` part per file
//! - `GET /scan/progress` - best-effort progress telemetry
//! - `POST /scan/abort` - fire-and-forget abort notification
//! - `GET /metrics/current` - host metrics snapshot
//! - `POST /assistant/message` - assistant conversation, with a client timeout

mod assistant;
mod backend;
mod http;
pub mod routes;

pub use assistant::AssistantReply;
pub use backend::ScanBackend;
pub use http::HttpBackend;

// Re-export core types for convenience
pub use vigilant_core::{BatchResponse, ClientConfig, ClientError, FileHandle, ServerProgress};

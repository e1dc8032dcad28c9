//! Error types for the client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while starting or running a scan session, or talking to
/// the dashboard server.
///
/// Per-file failures inside an otherwise successful batch are not errors at
/// this level; they live in [`crate::FileOutcome::Error`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// A session is already active; nothing was sent.
    #[error("A scan is already in progress")]
    AlreadyScanning,

    /// The selection holds no files; nothing was sent.
    #[error("No files selected")]
    EmptySelection,

    /// The request was cancelled through its token or timed out.
    #[error("Request cancelled")]
    Cancelled,

    /// Network-level failure (connect, reset, body stream).
    #[error("{message}")]
    Transport { message: String },

    /// The server answered with a non-success status.
    #[error("HTTP error! status: {status}")]
    Http { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("Invalid response: {message}")]
    Decode { message: String },

    /// A selected file could not be read for upload.
    #[error("Cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl ClientError {
    /// Create a transport error from any displayable failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Whether this error is the cancellation signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the error was raised locally, before any request was issued.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::AlreadyScanning | Self::EmptySelection)
    }
}

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::ClientConfig`].
    #[error("Invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

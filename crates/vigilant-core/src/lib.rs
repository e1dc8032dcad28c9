//! Core types for vigilant.
//!
//! This crate holds the data structures shared by the transport and the
//! scan-session crates: file handles, per-file scan results, server payloads,
//! the metrics ring buffer, the notification center and client configuration.
//!
//! Nothing in here performs I/O beyond reading a selected file or a config
//! file, so every state transition can be unit tested directly.

mod config;
mod error;
mod file;
mod metrics;
mod notification;
mod progress;
mod result;

pub use config::{CONFIG_FILE_NAME, ClientConfig, ClientConfigBuilder, URL_ENV_VAR};
pub use error::{ClientError, ConfigError};
pub use file::FileHandle;
pub use metrics::{
    DEFAULT_METRICS_CAPACITY, DiskUsage, MemoryUsage, MetricSample, MetricsBuffer,
    MetricsSnapshot, MetricsStats, NetworkUsage,
};
pub use notification::{DEFAULT_NOTIFICATION_CAPACITY, Notification, NotificationCenter, Severity};
pub use progress::{ServerProgress, truncate_display_name};
pub use result::{
    BatchResponse, FileOutcome, FileReport, ScanResult, ScanSummary, THREAT_SCORE_THRESHOLD,
    ThreatLevel,
};

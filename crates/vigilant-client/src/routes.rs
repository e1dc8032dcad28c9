//! Endpoint paths, relative to [`vigilant_core::ClientConfig::base_url`].

pub const SCAN_BATCH: &str = "/scan/batch";
pub const SCAN_PROGRESS: &str = "/scan/progress";
pub const SCAN_ABORT: &str = "/scan/abort";
pub const METRICS_CURRENT: &str = "/metrics/current";
pub const ASSISTANT_MESSAGE: &str = "/assistant/message";

/// Multipart field name repeated once per uploaded file.
pub const FILES_FIELD: &str = "files";

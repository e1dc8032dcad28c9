//! Per-file scan results and batch summaries.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Score at or above which a file is classified as a threat.
pub const THREAT_SCORE_THRESHOLD: u8 = 50;

/// Server-assigned threat level.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ThreatLevel {
    /// Parse a server level, mapping anything unrecognised to `Unknown`.
    pub fn parse(level: Option<&str>) -> Self {
        level
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or_default()
    }
}

/// Analysis record for a file the server could read.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    /// Risk indicator, 0 to 100. `None` when the server sent no score.
    pub threat_score: Option<u8>,
    pub threat_level: ThreatLevel,
    pub size_human: Option<String>,
    pub mime_type: Option<String>,
    pub permissions: Option<String>,
    pub file_age_days: i64,
    /// Reasons the score was raised, in server order.
    pub indicators: Vec<String>,
    pub content_hash: Option<String>,
}

impl FileReport {
    /// Whether the score classifies this file as a threat.
    pub fn is_threat(&self, threshold: u8) -> bool {
        self.threat_score.is_some_and(|score| score >= threshold)
    }

    /// Whether the score classifies this file as clean. Unscored files are
    /// neither clean nor threats.
    pub fn is_clean(&self, threshold: u8) -> bool {
        self.threat_score.is_some_and(|score| score < threshold)
    }
}

/// Outcome of scanning one file: either a per-file error or a report.
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Error(String),
    Analyzed(FileReport),
}

/// Result for a single file of a batch, in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireScanResult", into = "WireScanResult")]
pub struct ScanResult {
    /// Full file name; never truncated.
    pub filename: String,
    pub outcome: FileOutcome,
}

impl ScanResult {
    /// Create an analyzed result.
    pub fn analyzed(filename: impl Into<String>, report: FileReport) -> Self {
        Self {
            filename: filename.into(),
            outcome: FileOutcome::Analyzed(report),
        }
    }

    /// Create a per-file error result.
    pub fn failed(filename: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            outcome: FileOutcome::Error(error.into()),
        }
    }

    /// The per-file error, if the server could not analyze this file.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            FileOutcome::Error(e) => Some(e),
            FileOutcome::Analyzed(_) => None,
        }
    }

    /// The analysis record, if any.
    pub fn report(&self) -> Option<&FileReport> {
        match &self.outcome {
            FileOutcome::Analyzed(r) => Some(r),
            FileOutcome::Error(_) => None,
        }
    }

    /// Whether this result counts as a threat. Error results never do.
    pub fn is_threat(&self, threshold: u8) -> bool {
        self.report().is_some_and(|r| r.is_threat(threshold))
    }
}

/// Body of a successful `POST /scan/batch` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    #[serde(default)]
    pub results: Vec<ScanResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
}

/// Clean/threat/error counts over a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub clean: usize,
    pub threats: usize,
    pub errors: usize,
}

impl ScanSummary {
    /// Count results. Error results are counted only as errors; results
    /// without a score are not counted.
    pub fn from_results(results: &[ScanResult], threshold: u8) -> Self {
        results.iter().fold(Self::default(), |mut summary, result| {
            match result.report() {
                None => summary.errors += 1,
                Some(r) if r.is_threat(threshold) => summary.threats += 1,
                Some(r) if r.is_clean(threshold) => summary.clean += 1,
                Some(_) => {}
            }
            summary
        })
    }

    /// Total number of results counted.
    pub fn total(&self) -> usize {
        self.clean + self.threats + self.errors
    }

    /// Whether any threat was found.
    pub fn has_threats(&self) -> bool {
        self.threats > 0
    }
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} clean, {} threats, {} errors",
            self.clean, self.threats, self.errors
        )
    }
}

/// Server wire shape: a flat object where `error` excludes the report fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireScanResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, alias = "threatScore", skip_serializing_if = "Option::is_none")]
    threat_score: Option<serde_json::Number>,
    #[serde(default, alias = "threatLevel", skip_serializing_if = "Option::is_none")]
    threat_level: Option<String>,
    #[serde(default, alias = "sizeHuman", skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
    #[serde(default, alias = "mimeType", skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    permissions: Option<String>,
    #[serde(default, alias = "fileAgeDays", skip_serializing_if = "Option::is_none")]
    file_age_days: Option<i64>,
    #[serde(
        default,
        alias = "indicators",
        alias = "suspiciousIndicators",
        skip_serializing_if = "Vec::is_empty"
    )]
    suspicious_indicators: Vec<String>,
    #[serde(
        default,
        alias = "content_hash",
        alias = "contentHash",
        skip_serializing_if = "Option::is_none"
    )]
    hash: Option<String>,
}

fn clamp_score(score: Option<&serde_json::Number>) -> Option<u8> {
    score
        .and_then(serde_json::Number::as_f64)
        .map(|s| s.round().clamp(0.0, 100.0) as u8)
}

impl From<WireScanResult> for ScanResult {
    fn from(wire: WireScanResult) -> Self {
        let filename = wire.filename.unwrap_or_else(|| "unknown".to_string());
        let outcome = match wire.error {
            Some(error) => FileOutcome::Error(error),
            None => FileOutcome::Analyzed(FileReport {
                threat_score: clamp_score(wire.threat_score.as_ref()),
                threat_level: ThreatLevel::parse(wire.threat_level.as_deref()),
                size_human: wire.size_human,
                mime_type: wire.mime_type,
                permissions: wire.permissions,
                file_age_days: wire.file_age_days.unwrap_or(0),
                indicators: wire.suspicious_indicators,
                content_hash: wire.hash,
            }),
        };
        Self { filename, outcome }
    }
}

impl From<ScanResult> for WireScanResult {
    fn from(result: ScanResult) -> Self {
        let filename = Some(result.filename);
        match result.outcome {
            FileOutcome::Error(error) => Self {
                filename,
                error: Some(error),
                ..Self::default()
            },
            FileOutcome::Analyzed(report) => Self {
                filename,
                error: None,
                threat_score: report.threat_score.map(Into::into),
                threat_level: Some(report.threat_level.to_string()),
                size_human: report.size_human,
                mime_type: report.mime_type,
                permissions: report.permissions,
                file_age_days: Some(report.file_age_days),
                suspicious_indicators: report.indicators,
                hash: report.content_hash,
            },
        }
    }
}

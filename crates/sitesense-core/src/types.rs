//! Shared types used across SiteSense.
//!
//! This module defines the scan lifecycle, module result records and the
//! identifiers that tie stored files back to a scan.

use crate::error::{Result, SiteSenseError};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for scan identifiers with validation.
///
/// Scan IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(String);

impl ScanId {
    /// Create a new `ScanId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `ScanId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<()> {
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SiteSenseError::Validation(format!(
                "invalid scan ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a scan.
///
/// `queued -> running -> completed | failed`. Both terminal states are final;
/// a failed scan is resubmitted as a new scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Created, waiting for a worker
    Queued,
    /// Pipeline in progress
    Running,
    /// All stages finished and the report was aggregated
    Completed,
    /// Rendering or orchestration failed
    Failed,
}

impl ScanStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running)
                | (Self::Queued, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = SiteSenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SiteSenseError::Validation(format!(
                "unknown scan status '{other}'"
            ))),
        }
    }
}

/// Name of a module result.
///
/// Variant order is the fixed declaration order in which analyzer results are
/// reported; the aggregated report always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleName {
    /// Response header and cookie hygiene
    #[serde(rename = "security_hygiene")]
    SecurityHygiene,
    /// On-page SEO and analytics detection
    #[serde(rename = "analytics_seo")]
    AnalyticsSeo,
    /// axe-core accessibility audit
    #[serde(rename = "accessibility")]
    Accessibility,
    /// Lighthouse performance audit
    #[serde(rename = "lighthouse")]
    Performance,
    /// Attention and click-likelihood overlays
    #[serde(rename = "heatmaps")]
    Heatmaps,
    /// ZAP spider and passive alerts
    #[serde(rename = "zap_security")]
    ProxySecurity,
    /// Weighted site report
    #[serde(rename = "aggregated_report")]
    AggregatedReport,
}

impl ModuleName {
    /// The six analyzers in declaration order.
    pub const ANALYZERS: [Self; 6] = [
        Self::SecurityHygiene,
        Self::AnalyticsSeo,
        Self::Accessibility,
        Self::Performance,
        Self::Heatmaps,
        Self::ProxySecurity,
    ];

    /// Wire name of the module.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SecurityHygiene => "security_hygiene",
            Self::AnalyticsSeo => "analytics_seo",
            Self::Accessibility => "accessibility",
            Self::Performance => "lighthouse",
            Self::Heatmaps => "heatmaps",
            Self::ProxySecurity => "zap_security",
            Self::AggregatedReport => "aggregated_report",
        }
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleName {
    type Err = SiteSenseError;

    fn from_str(s: &str) -> Result<Self> {
        ModuleName::ANALYZERS
            .into_iter()
            .chain(std::iter::once(Self::AggregatedReport))
            .find(|m| m.as_str() == s)
            .ok_or_else(|| SiteSenseError::Validation(format!("unknown module '{s}'")))
    }
}

/// Outcome of a single module invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Module produced its result
    Completed,
    /// Module raised, timed out or panicked
    Failed,
    /// Optional dependency unavailable; not an error
    Skipped,
}

impl ModuleStatus {
    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleStatus {
    type Err = SiteSenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(SiteSenseError::Validation(format!(
                "unknown module status '{other}'"
            ))),
        }
    }
}

/// One module's output record.
///
/// The payload is an open JSON object whose shape each module owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    /// Module that produced the result
    pub module_name: ModuleName,
    /// Outcome of the invocation
    pub status: ModuleStatus,
    /// Module-specific payload
    pub result_json: serde_json::Value,
}

impl ModuleResult {
    /// A completed result carrying `payload`.
    #[must_use]
    pub fn completed(module_name: ModuleName, payload: serde_json::Value) -> Self {
        Self {
            module_name,
            status: ModuleStatus::Completed,
            result_json: payload,
        }
    }

    /// A failed result whose payload is `{"error": message}`.
    #[must_use]
    pub fn failed(module_name: ModuleName, message: impl Into<String>) -> Self {
        Self {
            module_name,
            status: ModuleStatus::Failed,
            result_json: serde_json::json!({ "error": message.into() }),
        }
    }

    /// A skipped result carrying `payload`.
    #[must_use]
    pub fn skipped(module_name: ModuleName, payload: serde_json::Value) -> Self {
        Self {
            module_name,
            status: ModuleStatus::Skipped,
            result_json: payload,
        }
    }

    /// Whether the module completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ModuleStatus::Completed
    }
}

/// Kind of binary file derived from a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    /// Rendered page screenshot (PNG)
    Screenshot,
    /// Saliency overlay (JPEG)
    AttentionHeatmap,
    /// Click-likelihood overlay (JPEG)
    ClickHeatmap,
    /// Full Lighthouse report (JSON)
    LighthouseReport,
}

impl FileType {
    /// Wire name of the file type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Screenshot => "screenshot",
            Self::AttentionHeatmap => "attention_heatmap",
            Self::ClickHeatmap => "click_heatmap",
            Self::LighthouseReport => "lighthouse_report",
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = SiteSenseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "screenshot" => Ok(Self::Screenshot),
            "attention_heatmap" => Ok(Self::AttentionHeatmap),
            "click_heatmap" => Ok(Self::ClickHeatmap),
            "lighthouse_report" => Ok(Self::LighthouseReport),
            other => Err(SiteSenseError::Validation(format!(
                "unknown file type '{other}'"
            ))),
        }
    }
}

/// Reference to a stored file; the bytes live in artifact storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Kind of file
    pub file_type: FileType,
    /// MIME type of the stored bytes
    pub content_type: String,
    /// Retrieval reference
    pub url: String,
}

/// A scan of one target URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// Unique identifier
    pub id: ScanId,
    /// URL as submitted
    pub url: String,
    /// URL after normalisation
    pub normalized_url: String,
    /// Lifecycle status
    pub status: ScanStatus,
    /// Error captured when the scan failed
    pub error_message: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
    /// Module results in declaration order, aggregated report last
    pub module_results: Vec<ModuleResult>,
    /// Files derived from the scan
    pub files: Vec<FileRef>,
}

impl Scan {
    /// Create a queued scan for `url`.
    ///
    /// # Errors
    /// Returns `SiteSenseError::Validation` if the URL cannot be normalised.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let normalized_url = normalize_url(&url)?;
        let now = Utc::now();
        Ok(Self {
            id: ScanId::generate(),
            url,
            normalized_url,
            status: ScanStatus::Queued,
            error_message: None,
            created_at: now,
            updated_at: now,
            module_results: Vec::new(),
            files: Vec::new(),
        })
    }

    /// Move to `next`, rejecting illegal lifecycle steps.
    ///
    /// # Errors
    /// Returns `SiteSenseError::InvalidTransition` for an illegal step.
    pub fn transition_to(&mut self, next: ScanStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(SiteSenseError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the scan failed, capturing `message` and dropping any results.
    ///
    /// # Errors
    /// Returns `SiteSenseError::InvalidTransition` if the scan is already terminal.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition_to(ScanStatus::Failed)?;
        self.error_message = Some(message.into());
        self.module_results.clear();
        Ok(())
    }

    /// Mark the scan completed with its ordered results.
    ///
    /// # Errors
    /// Returns `SiteSenseError::InvalidTransition` unless the scan is running.
    pub fn complete(&mut self, results: Vec<ModuleResult>) -> Result<()> {
        self.transition_to(ScanStatus::Completed)?;
        self.module_results = results;
        Ok(())
    }

    /// The aggregated report entry, if present.
    #[must_use]
    pub fn report(&self) -> Option<&ModuleResult> {
        self.module_results
            .iter()
            .find(|r| r.module_name == ModuleName::AggregatedReport)
    }
}

/// Normalise a submitted URL.
///
/// A missing scheme defaults to `https://`; only `http` and `https` are accepted.
///
/// # Errors
/// Returns `SiteSenseError::Validation` for empty, unparsable or non-HTTP URLs.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SiteSenseError::Validation("URL must not be empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = url::Url::parse(&candidate)
        .map_err(|e| SiteSenseError::Validation(format!("invalid URL '{raw}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(SiteSenseError::Validation(format!(
                "unsupported URL scheme '{other}'"
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(SiteSenseError::Validation(format!("URL '{raw}' has no host")));
    }

    Ok(parsed.to_string())
}

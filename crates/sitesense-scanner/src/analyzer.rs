//! The analyzer contract shared by all six scan modules.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use serde_json::Value;
use sitesense_core::{FileType, ModuleName, ModuleStatus, PageArtifact, ScanId};
use std::sync::Arc;

/// Everything an analyzer may read. Cloning is cheap; the artifact is shared.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    /// Scan being analysed
    pub scan_id: ScanId,
    /// Normalised target URL
    pub url: String,
    /// Rendered page snapshot, read-only for every analyzer
    pub artifact: Arc<PageArtifact>,
}

/// Binary output of an analyzer that must be stored before its payload is published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedArtifact {
    /// Storage key within the scan
    pub file_type: FileType,
    /// MIME type of `bytes`
    pub content_type: &'static str,
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Payload field that receives the stored file's URL
    pub payload_key: &'static str,
}

/// Successful analyzer output.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerOutput {
    /// `Completed` or `Skipped`; failures are returned as `Err`
    pub status: ModuleStatus,
    /// Module-specific JSON object
    pub payload: Value,
    /// Files to persist before the payload is published
    pub artifacts: Vec<DerivedArtifact>,
}

impl AnalyzerOutput {
    /// A completed result without derived files.
    #[must_use]
    pub fn completed(payload: Value) -> Self {
        Self {
            status: ModuleStatus::Completed,
            payload,
            artifacts: Vec::new(),
        }
    }

    /// A skipped result; the optional dependency was unavailable.
    #[must_use]
    pub fn skipped(payload: Value) -> Self {
        Self {
            status: ModuleStatus::Skipped,
            payload,
            artifacts: Vec::new(),
        }
    }

    /// Attach a derived file.
    #[must_use]
    pub fn with_artifact(mut self, artifact: DerivedArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

/// One scan module.
///
/// Implementations return `Err` for every failure; the coordinator turns it
/// into a `failed` module result.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Module this analyzer reports as.
    fn module(&self) -> ModuleName;

    /// Analyse the page.
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError>;
}

//! Performance audit through an external auditor (Lighthouse).

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput, DerivedArtifact};
use crate::error::AnalyzerError;
use crate::lighthouse::{summarize_report, PerformanceAuditor};
use async_trait::async_trait;
use serde_json::{json, Value};
use sitesense_core::{FileType, ModuleName};
use std::sync::Arc;

/// Payload key that receives the stored report's URL.
pub const REPORT_URL_KEY: &str = "lighthouse_report_url";

/// Summarises the auditor's report and hands the raw report off for storage.
pub struct PerformanceAnalyzer {
    auditor: Arc<dyn PerformanceAuditor>,
    max_recommendations: usize,
}

impl PerformanceAnalyzer {
    /// Create an analyzer backed by `auditor`.
    #[must_use]
    pub fn new(auditor: Arc<dyn PerformanceAuditor>, max_recommendations: usize) -> Self {
        Self {
            auditor,
            max_recommendations,
        }
    }
}

#[async_trait]
impl Analyzer for PerformanceAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::Performance
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let report = self.auditor.audit(&ctx.url).await?;
        let summary = summarize_report(&report, self.max_recommendations)?;

        let mut payload = json!({
            "scores": summary.scores,
            "category_scores": summary.category_scores(),
            "core_web_vitals": summary.core_web_vitals,
            "recommendations": summary.recommendations,
        });
        payload[REPORT_URL_KEY] = Value::Null;

        Ok(
            AnalyzerOutput::completed(payload).with_artifact(DerivedArtifact {
                file_type: FileType::LighthouseReport,
                content_type: "application/json",
                bytes: serde_json::to_vec(&report)?,
                payload_key: REPORT_URL_KEY,
            }),
        )
    }
}

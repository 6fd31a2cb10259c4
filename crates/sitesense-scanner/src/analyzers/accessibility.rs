//! axe-core accessibility scoring.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use sitesense_browser::{AccessibilityAuditor, AxeViolation};
use sitesense_core::ModuleName;
use std::sync::Arc;

/// One violation as published in the module payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessibilityIssue {
    /// axe rule id
    pub id: String,
    /// Impact tier, `unknown` when axe gave none
    pub impact: String,
    /// Rule description
    pub description: String,
    /// Documentation link
    pub help_url: String,
    /// First selector of each affected node
    pub nodes: Vec<String>,
}

impl From<AxeViolation> for AccessibilityIssue {
    fn from(violation: AxeViolation) -> Self {
        Self {
            nodes: violation
                .nodes
                .iter()
                .filter_map(sitesense_browser::AxeNode::primary_target)
                .collect(),
            id: violation.id,
            impact: violation.impact.unwrap_or_else(|| "unknown".to_string()),
            description: violation.description,
            help_url: violation.help_url,
        }
    }
}

/// `100 - 5*critical - 3*serious - 1*moderate`, floored at 0.
#[must_use]
pub fn accessibility_score(issues: &[AccessibilityIssue]) -> u32 {
    let penalty: u32 = issues
        .iter()
        .map(|issue| match issue.impact.as_str() {
            "critical" => 5,
            "serious" => 3,
            "moderate" => 1,
            _ => 0,
        })
        .sum();
    100_u32.saturating_sub(penalty)
}

/// Runs axe-core through its own page load.
pub struct AccessibilityAnalyzer {
    auditor: Arc<dyn AccessibilityAuditor>,
}

impl AccessibilityAnalyzer {
    /// Create an analyzer backed by `auditor`.
    #[must_use]
    pub fn new(auditor: Arc<dyn AccessibilityAuditor>) -> Self {
        Self { auditor }
    }
}

#[async_trait]
impl Analyzer for AccessibilityAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::Accessibility
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let violations = self.auditor.audit(&ctx.url).await?;
        let issues: Vec<AccessibilityIssue> = violations.into_iter().map(Into::into).collect();
        let score = accessibility_score(&issues);

        tracing::debug!(
            "Accessibility for {}: score {}, {} violations",
            ctx.url,
            score,
            issues.len()
        );

        Ok(AnalyzerOutput::completed(json!({
            "score": score,
            "violations": issues.len(),
            "issues": issues,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesense_browser::AxeNode;
    use sitesense_core::PageArtifact;

    fn issue(impact: &str) -> AccessibilityIssue {
        AccessibilityIssue {
            id: "rule".to_string(),
            impact: impact.to_string(),
            description: String::new(),
            help_url: String::new(),
            nodes: Vec::new(),
        }
    }

    #[test]
    fn test_score_weights() {
        let issues = vec![
            issue("critical"),
            issue("serious"),
            issue("moderate"),
            issue("minor"),
            issue("unknown"),
        ];
        assert_eq!(accessibility_score(&issues), 91);
        assert_eq!(accessibility_score(&[]), 100);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let issues: Vec<_> = (0..25).map(|_| issue("critical")).collect();
        assert_eq!(accessibility_score(&issues), 0);
    }

    #[test]
    fn test_violation_conversion() {
        let violation = AxeViolation {
            id: "image-alt".to_string(),
            impact: None,
            description: "Images must have alternate text".to_string(),
            help_url: "https://dequeuniversity.com/rules/axe/4.7/image-alt".to_string(),
            nodes: vec![
                AxeNode {
                    target: vec![json!("img.hero"), json!("ignored")],
                },
                AxeNode { target: vec![] },
            ],
        };

        let issue = AccessibilityIssue::from(violation);
        assert_eq!(issue.impact, "unknown");
        assert_eq!(issue.nodes, vec!["img.hero"]);
    }

    struct FixedAuditor(Vec<AxeViolation>);

    #[async_trait]
    impl AccessibilityAuditor for FixedAuditor {
        async fn audit(&self, _url: &str) -> sitesense_browser::Result<Vec<AxeViolation>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_analyzer_payload() {
        let violation = AxeViolation {
            id: "color-contrast".to_string(),
            impact: Some("serious".to_string()),
            description: "Contrast".to_string(),
            help_url: String::new(),
            nodes: Vec::new(),
        };
        let analyzer = AccessibilityAnalyzer::new(Arc::new(FixedAuditor(vec![violation])));
        let ctx = AnalysisContext {
            scan_id: sitesense_core::ScanId::generate(),
            url: "https://example.com".to_string(),
            artifact: Arc::new(PageArtifact::default()),
        };

        let output = analyzer.analyze(&ctx).await.expect("analyze");
        assert_eq!(output.payload["score"], 97);
        assert_eq!(output.payload["violations"], 1);
        assert_eq!(output.payload["issues"][0]["id"], "color-contrast");
    }
}

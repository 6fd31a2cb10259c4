//! Lighthouse CLI integration.
//!
//! The CLI is run as a child process with its JSON report on stdout. A
//! missing binary is reported as [`AnalyzerError::ToolNotInstalled`] so it
//! can be told apart from an audit that ran and failed.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sitesense_core::LighthouseConfig;
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// Score categories read from the report.
pub const CATEGORIES: [&str; 4] = ["performance", "accessibility", "best-practices", "seo"];

/// Core web vitals: payload key and audit id.
pub const CORE_WEB_VITALS: [(&str, &str); 5] = [
    ("FCP", "first-contentful-paint"),
    ("LCP", "largest-contentful-paint"),
    ("TBT", "total-blocking-time"),
    ("CLS", "cumulative-layout-shift"),
    ("SI", "speed-index"),
];

/// Audits scoring below this are candidate recommendations.
const OPPORTUNITY_THRESHOLD: f64 = 0.9;

/// Produces a raw performance audit report for a URL.
#[async_trait]
pub trait PerformanceAuditor: Send + Sync {
    /// Run the audit and return the full JSON report.
    async fn audit(&self, url: &str) -> Result<Value, AnalyzerError>;
}

/// Runs the `lighthouse` CLI.
#[derive(Debug, Clone)]
pub struct LighthouseRunner {
    config: LighthouseConfig,
}

impl LighthouseRunner {
    /// Create a runner from configuration.
    #[must_use]
    pub fn new(config: LighthouseConfig) -> Self {
        Self { config }
    }

    fn command(&self, binary: &std::path::Path, url: &str) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg(url)
            .args(["--quiet", "--chrome-flags=--headless", "--output=json"])
            .args(&self.config.extra_flags)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(chrome) = &self.config.chrome_path {
            cmd.env("CHROME_PATH", chrome);
        }
        cmd
    }
}

#[async_trait]
impl PerformanceAuditor for LighthouseRunner {
    async fn audit(&self, url: &str) -> Result<Value, AnalyzerError> {
        let binary =
            which::which(&self.config.binary).map_err(|_| AnalyzerError::ToolNotInstalled {
                tool: self.config.binary.clone(),
            })?;

        tracing::info!("Running Lighthouse against {}", url);
        let output = self.command(&binary, url).output().await?;

        if !output.status.success() {
            return Err(AnalyzerError::ToolFailed {
                tool: self.config.binary.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalyzerError::InvalidOutput(format!("Lighthouse report: {e}")))
    }
}

/// The parts of a Lighthouse report published in the module payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LighthouseSummary {
    /// Category scores on Lighthouse's 0-1 scale
    pub scores: BTreeMap<String, f64>,
    /// Core web vital display values
    pub core_web_vitals: BTreeMap<String, Option<String>>,
    /// Titles of failing opportunity audits
    pub recommendations: Vec<String>,
}

impl LighthouseSummary {
    /// Category scores scaled to 0-100.
    #[must_use]
    pub fn category_scores(&self) -> BTreeMap<String, f64> {
        self.scores
            .iter()
            .map(|(name, score)| (name.clone(), (score * 100.0).round()))
            .collect()
    }
}

/// Extract scores, vitals and recommendations from a raw report.
///
/// # Errors
/// Returns `AnalyzerError::InvalidOutput` when the report has no
/// `categories` or `audits` object.
pub fn summarize_report(
    report: &Value,
    max_recommendations: usize,
) -> Result<LighthouseSummary, AnalyzerError> {
    let categories = report
        .get("categories")
        .and_then(Value::as_object)
        .ok_or_else(|| AnalyzerError::InvalidOutput("report has no categories".to_string()))?;
    let audits = report
        .get("audits")
        .and_then(Value::as_object)
        .ok_or_else(|| AnalyzerError::InvalidOutput("report has no audits".to_string()))?;

    let scores = CATEGORIES
        .iter()
        .map(|name| {
            let score = categories
                .get(*name)
                .and_then(|c| c.get("score"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            ((*name).to_string(), score)
        })
        .collect();

    let core_web_vitals = CORE_WEB_VITALS
        .iter()
        .map(|(key, audit_id)| {
            let value = audits
                .get(*audit_id)
                .and_then(|a| a.get("displayValue"))
                .and_then(Value::as_str)
                .map(str::to_string);
            ((*key).to_string(), value)
        })
        .collect();

    // Report order; the map preserves insertion order.
    let recommendations = audits
        .values()
        .filter(|audit| {
            let failing = audit
                .get("score")
                .and_then(Value::as_f64)
                .is_some_and(|score| score < OPPORTUNITY_THRESHOLD);
            let opportunity = audit
                .pointer("/details/type")
                .and_then(Value::as_str)
                .is_some_and(|t| t == "opportunity");
            failing && opportunity
        })
        .filter_map(|audit| audit.get("title").and_then(Value::as_str))
        .map(str::to_string)
        .take(max_recommendations)
        .collect();

    Ok(LighthouseSummary {
        scores,
        core_web_vitals,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> Value {
        json!({
            "categories": {
                "performance": {"score": 0.9},
                "accessibility": {"score": 0.95},
                "best-practices": {"score": null},
                "seo": {"score": 0.8}
            },
            "audits": {
                "first-contentful-paint": {"displayValue": "1.2 s", "score": 0.95},
                "largest-contentful-paint": {"displayValue": "2.5 s", "score": 0.7},
                "total-blocking-time": {"displayValue": "150 ms"},
                "cumulative-layout-shift": {"displayValue": "0.01"},
                "render-blocking-resources": {
                    "title": "Eliminate render-blocking resources",
                    "score": 0.5,
                    "details": {"type": "opportunity"}
                },
                "unused-javascript": {
                    "title": "Reduce unused JavaScript",
                    "score": 0.3,
                    "details": {"type": "opportunity"}
                },
                "uses-long-cache-ttl": {
                    "title": "Serve static assets with an efficient cache policy",
                    "score": 0.2,
                    "details": {"type": "table"}
                },
                "modern-image-formats": {
                    "title": "Serve images in modern formats",
                    "score": 0.95,
                    "details": {"type": "opportunity"}
                }
            }
        })
    }

    #[test]
    fn test_summarize_scores_and_vitals() {
        let summary = summarize_report(&sample_report(), 5).expect("summarize");

        assert!((summary.scores["performance"] - 0.9).abs() < f64::EPSILON);
        assert!(summary.scores["best-practices"].abs() < f64::EPSILON);
        assert_eq!(summary.core_web_vitals["FCP"].as_deref(), Some("1.2 s"));
        assert_eq!(summary.core_web_vitals["SI"], None);
        assert!((summary.category_scores()["accessibility"] - 95.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_recommendations_are_failing_opportunities() {
        let summary = summarize_report(&sample_report(), 5).expect("summarize");
        assert_eq!(
            summary.recommendations,
            vec![
                "Eliminate render-blocking resources",
                "Reduce unused JavaScript"
            ]
        );

        let limited = summarize_report(&sample_report(), 1).expect("summarize");
        assert_eq!(limited.recommendations.len(), 1);
    }

    #[test]
    fn test_recommendations_follow_report_order() {
        let report: Value = serde_json::from_str(
            r#"{
                "categories": {"performance": {"score": 0.4}},
                "audits": {
                    "unused-javascript": {
                        "title": "Reduce unused JavaScript",
                        "score": 0.3,
                        "details": {"type": "opportunity"}
                    },
                    "render-blocking-resources": {
                        "title": "Eliminate render-blocking resources",
                        "score": 0.5,
                        "details": {"type": "opportunity"}
                    },
                    "efficient-animated-content": {
                        "title": "Use video formats for animated content",
                        "score": 0.1,
                        "details": {"type": "opportunity"}
                    }
                }
            }"#,
        )
        .expect("parse report");

        let summary = summarize_report(&report, 2).expect("summarize");
        assert_eq!(
            summary.recommendations,
            vec![
                "Reduce unused JavaScript",
                "Eliminate render-blocking resources"
            ]
        );
    }

    #[test]
    fn test_malformed_report() {
        let result = summarize_report(&json!({"audits": {}}), 5);
        assert!(matches!(result, Err(AnalyzerError::InvalidOutput(_))));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_installed() {
        let runner = LighthouseRunner::new(LighthouseConfig {
            binary: "sitesense-no-such-lighthouse-binary".to_string(),
            ..LighthouseConfig::default()
        });

        let result = runner.audit("https://example.com").await;
        assert!(matches!(
            result,
            Err(AnalyzerError::ToolNotInstalled { .. })
        ));
    }
}

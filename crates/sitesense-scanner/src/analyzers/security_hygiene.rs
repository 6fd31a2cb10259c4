//! Response header and cookie hygiene checks.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use serde::Serialize;
use sitesense_core::{ModuleName, PageArtifact};

/// Security headers checked, with their penalty and fix.
const REQUIRED_HEADERS: [(&str, i32, &str); 4] = [
    (
        "Strict-Transport-Security",
        10,
        "Enable HSTS to prevent man-in-the-middle attacks.",
    ),
    (
        "Content-Security-Policy",
        10,
        "Configure CSP to mitigate XSS and data injection attacks.",
    ),
    (
        "X-Frame-Options",
        10,
        "Set X-Frame-Options to DENY or SAMEORIGIN to prevent clickjacking.",
    ),
    (
        "X-Content-Type-Options",
        5,
        "Set X-Content-Type-Options to nosniff.",
    ),
];

const COOKIE_PENALTY: i32 = 5;

/// Result of the hygiene checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HygieneReport {
    /// 0-100
    pub score: u32,
    /// Problems and informational technology notes
    pub findings: Vec<String>,
    /// Fixes, de-duplicated in first-seen order
    pub recommendations: Vec<String>,
}

/// Score the headers and cookies of `artifact`.
#[must_use]
pub fn check_security_hygiene(artifact: &PageArtifact) -> HygieneReport {
    let mut score: i32 = 100;
    let mut findings = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();
    let mut recommend = |text: String| {
        if !recommendations.contains(&text) {
            recommendations.push(text);
        }
    };

    for (header, penalty, fix) in REQUIRED_HEADERS {
        if artifact.header(header).is_none() {
            score -= penalty;
            findings.push(format!("Missing {header} header"));
            recommend(fix.to_string());
        }
    }

    for cookie in &artifact.cookies {
        if !cookie.secure {
            score -= COOKIE_PENALTY;
            findings.push(format!("Cookie '{}' is not Secure", cookie.name));
            recommend(format!("Set the Secure flag for cookie '{}'.", cookie.name));
        }
        if !cookie.http_only {
            score -= COOKIE_PENALTY;
            findings.push(format!("Cookie '{}' is not HttpOnly", cookie.name));
            recommend(format!("Set the HttpOnly flag for cookie '{}'.", cookie.name));
        }
    }

    let markup = artifact.dom_html.to_lowercase();
    if markup.contains("jquery") {
        findings.push("jQuery detected".to_string());
    }
    if markup.contains("react") {
        findings.push("React detected".to_string());
    }

    HygieneReport {
        score: u32::try_from(score.max(0)).unwrap_or(0),
        findings,
        recommendations,
    }
}

/// Analyzer wrapper around [`check_security_hygiene`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SecurityHygieneAnalyzer;

#[async_trait]
impl Analyzer for SecurityHygieneAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::SecurityHygiene
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let report = check_security_hygiene(&ctx.artifact);
        tracing::debug!(
            "Security hygiene for {}: score {}, {} findings",
            ctx.url,
            report.score,
            report.findings.len()
        );
        Ok(AnalyzerOutput::completed(serde_json::to_value(report)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitesense_core::CookieInfo;
    use std::collections::HashMap;

    fn all_headers() -> HashMap<String, String> {
        [
            ("strict-transport-security", "max-age=63072000"),
            ("content-security-policy", "default-src 'self'"),
            ("x-frame-options", "DENY"),
            ("x-content-type-options", "nosniff"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn cookie(name: &str, secure: bool, http_only: bool) -> CookieInfo {
        CookieInfo {
            name: name.to_string(),
            secure,
            http_only,
        }
    }

    #[test]
    fn test_hardened_page_scores_full() {
        let artifact = PageArtifact {
            headers: all_headers(),
            cookies: vec![cookie("session", true, true)],
            ..PageArtifact::default()
        };

        let report = check_security_hygiene(&artifact);
        assert_eq!(report.score, 100);
        assert!(report.findings.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_headers_match_case_insensitively() {
        let headers = all_headers()
            .into_iter()
            .map(|(k, v)| (k.to_uppercase(), v))
            .collect();
        let artifact = PageArtifact {
            headers,
            ..PageArtifact::default()
        };

        assert_eq!(check_security_hygiene(&artifact).score, 100);
    }

    #[test]
    fn test_missing_headers_and_insecure_cookies() {
        let artifact = PageArtifact {
            cookies: vec![
                cookie("a", false, true),
                cookie("b", false, true),
                cookie("c", false, true),
            ],
            ..PageArtifact::default()
        };

        assert_eq!(check_security_hygiene(&artifact).score, 50);
    }

    #[test]
    fn test_score_floors_at_zero() {
        let cookies = (0..7)
            .map(|i| cookie(&format!("c{i}"), false, false))
            .collect();
        let artifact = PageArtifact {
            cookies,
            ..PageArtifact::default()
        };

        let report = check_security_hygiene(&artifact);
        assert_eq!(report.score, 0);
        assert_eq!(report.findings.len(), 18);
    }

    #[test]
    fn test_findings_and_recommendations() {
        let mut headers = all_headers();
        headers.remove("content-security-policy");
        let artifact = PageArtifact {
            headers,
            cookies: vec![cookie("tracker", true, false)],
            dom_html: "<script src=\"/jquery.min.js\"></script>".to_string(),
            ..PageArtifact::default()
        };

        let report = check_security_hygiene(&artifact);
        assert_eq!(report.score, 85);
        assert_eq!(
            report.findings,
            vec![
                "Missing Content-Security-Policy header",
                "Cookie 'tracker' is not HttpOnly",
                "jQuery detected",
            ]
        );
        assert_eq!(
            report.recommendations,
            vec![
                "Configure CSP to mitigate XSS and data injection attacks.",
                "Set the HttpOnly flag for cookie 'tracker'.",
            ]
        );
    }

    #[test]
    fn test_duplicate_recommendations_collapse() {
        let artifact = PageArtifact {
            headers: all_headers(),
            cookies: vec![cookie("dup", false, true), cookie("dup", false, true)],
            ..PageArtifact::default()
        };

        let report = check_security_hygiene(&artifact);
        assert_eq!(report.score, 90);
        assert_eq!(report.findings.len(), 2);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn test_analyzer_publishes_report() {
        let ctx = AnalysisContext {
            scan_id: sitesense_core::ScanId::generate(),
            url: "https://example.com/".to_string(),
            artifact: std::sync::Arc::new(PageArtifact {
                headers: all_headers(),
                dom_html: "<script src=\"/js/jquery.min.js\"></script>".to_string(),
                ..PageArtifact::default()
            }),
        };

        let output = tokio_test::block_on(SecurityHygieneAnalyzer.analyze(&ctx)).expect("analyze");
        assert_eq!(output.status, sitesense_core::ModuleStatus::Completed);
        assert_eq!(output.payload["score"], 100);
        assert_eq!(output.payload["findings"][0], "jQuery detected");
        assert!(output.artifacts.is_empty());
    }
}

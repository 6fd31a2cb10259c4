//! On-page SEO checks and analytics tag detection.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Serialize;
use sitesense_core::ModuleName;

const MIN_TITLE_CHARS: usize = 10;

/// Note reported when no analytics tool is present.
pub const NO_ANALYTICS_NOTE: &str = "Consider adding analytics tools like Google Analytics.";

/// Analytics tools recognised in inline scripts, by marker substring.
const ANALYTICS_MARKERS: [(&str, &str); 5] = [
    ("google-analytics.com", "Google Analytics"),
    ("gtag", "Google Analytics"),
    ("googletagmanager.com", "Google Tag Manager"),
    ("facebook.net", "Meta Pixel"),
    ("fbq(", "Meta Pixel"),
];

/// Result of the SEO checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeoReport {
    /// 0-100
    pub score: u32,
    /// Detected analytics tools, first-seen order
    pub analytics_tools: Vec<String>,
    /// SEO problems found
    pub seo_issues: Vec<String>,
    /// One fix per issue
    pub recommendations: Vec<String>,
    /// Advice that does not affect the score
    pub notes: Vec<String>,
}

/// Inspect the markup of a rendered page.
#[must_use]
pub fn check_seo(html: &str) -> SeoReport {
    let document = Html::parse_document(html);
    let mut score: i32 = 100;
    let mut seo_issues = Vec::new();
    let mut recommendations = Vec::new();
    let mut issue = |penalty: i32, text: &str, fix: &str| {
        score -= penalty;
        seo_issues.push(text.to_string());
        recommendations.push(fix.to_string());
    };

    let title = first_text(&document, "title");
    match title.as_deref() {
        None | Some("") => issue(20, "Missing <title> tag", "Add a descriptive <title> tag."),
        Some(text) if text.chars().count() < MIN_TITLE_CHARS => issue(
            5,
            "Title tag is too short",
            "Make the title tag more descriptive.",
        ),
        Some(_) => {}
    }

    let description = selector(r#"meta[name="description"]"#)
        .and_then(|sel| {
            document
                .select(&sel)
                .next()
                .and_then(|el| el.value().attr("content").map(str::to_string))
        })
        .filter(|content| !content.is_empty());
    if description.is_none() {
        issue(
            20,
            "Missing meta description",
            "Add a meta description to improve search visibility.",
        );
    }

    let h1_count = selector("h1").map_or(0, |sel| document.select(&sel).count());
    if h1_count == 0 {
        issue(
            10,
            "Missing <h1> tag",
            "Use at least one <h1> tag for the main heading.",
        );
    } else if h1_count > 1 {
        issue(
            5,
            "Multiple <h1> tags found",
            "Use only one <h1> tag per page.",
        );
    }

    let analytics_tools = detect_analytics(&document);
    let notes = if analytics_tools.is_empty() {
        vec![NO_ANALYTICS_NOTE.to_string()]
    } else {
        Vec::new()
    };

    SeoReport {
        score: u32::try_from(score.max(0)).unwrap_or(0),
        analytics_tools,
        seo_issues,
        recommendations,
        notes,
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn first_text(document: &Html, css: &str) -> Option<String> {
    let selector = selector(css)?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())
}

fn detect_analytics(document: &Html) -> Vec<String> {
    let Some(scripts) = selector("script") else {
        return Vec::new();
    };

    let mut tools: Vec<String> = Vec::new();
    for script in document.select(&scripts) {
        let body = script.text().collect::<String>().to_lowercase();
        if body.is_empty() {
            continue;
        }
        for (marker, tool) in ANALYTICS_MARKERS {
            if body.contains(marker) && !tools.iter().any(|t| t == tool) {
                tools.push(tool.to_string());
            }
        }
    }
    tools
}

/// Analyzer wrapper around [`check_seo`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AnalyticsSeoAnalyzer;

#[async_trait]
impl Analyzer for AnalyticsSeoAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::AnalyticsSeo
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        let report = check_seo(&ctx.artifact.dom_html);
        tracing::debug!(
            "SEO for {}: score {}, {} issues",
            ctx.url,
            report.score,
            report.seo_issues.len()
        );
        Ok(AnalyzerOutput::completed(serde_json::to_value(report)?))
    }
}

//! Report aggregation.
//!
//! Combines the per-module results of a scan into one [`SiteReport`]. The
//! function is pure: the same result list always yields the same report, and
//! missing or malformed module data only lowers the affected category.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitesense_core::{ModuleName, ModuleResult};
use std::fmt;

/// Category weights in percent: security, seo, performance, accessibility.
const WEIGHTS: [u32; 4] = [30, 30, 20, 20];

/// Share of the security category taken from header/cookie hygiene.
const HYGIENE_SHARE: f64 = 0.5;

/// Recommendations kept by default.
pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 10;

/// Expected benefit of acting on a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Impact {
    High,
    Medium,
    Low,
}

/// Report category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Security,
    Seo,
    Performance,
    Accessibility,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Security => "security",
            Self::Seo => "seo",
            Self::Performance => "performance",
            Self::Accessibility => "accessibility",
        };
        f.write_str(name)
    }
}

/// One ranked action item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Category the fix improves
    pub category: Category,
    /// What to do
    pub text: String,
    /// Expected benefit
    pub impact: Impact,
}

impl Recommendation {
    fn new(category: Category, text: impl Into<String>, impact: Impact) -> Self {
        Self {
            category,
            text: text.into(),
            impact,
        }
    }
}

/// Category scores, each within 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryScores {
    /// Header hygiene blended with proxy findings
    pub security: f64,
    pub seo: f64,
    pub performance: f64,
    pub accessibility: f64,
}

impl CategoryScores {
    /// Weighted overall score.
    ///
    /// Weights are applied as integer percentages so that exact halves round
    /// up consistently (74.5 becomes 75).
    #[must_use]
    pub fn overall(&self) -> u32 {
        let values = [self.security, self.seo, self.performance, self.accessibility];
        let weighted: f64 = values
            .iter()
            .zip(WEIGHTS)
            .map(|(value, weight)| value * f64::from(weight))
            .sum();
        // Each value is clamped to 0-100, so the result is too.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let overall = (weighted / 100.0).round() as u32;
        overall
    }
}

/// The aggregated result of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteReport {
    /// Weighted combination of the category scores, 0-100
    pub overall_score: u32,
    /// Per-category scores
    pub category_scores: CategoryScores,
    /// Pooled recommendations in module order, truncated
    pub recommendations: Vec<Recommendation>,
    /// One-line summary
    pub summary: String,
}

impl SiteReport {
    /// Wrap the report as the `aggregated_report` module result.
    #[must_use]
    pub fn into_module_result(self) -> ModuleResult {
        match serde_json::to_value(&self) {
            Ok(payload) => ModuleResult::completed(ModuleName::AggregatedReport, payload),
            Err(e) => ModuleResult::failed(ModuleName::AggregatedReport, e.to_string()),
        }
    }
}

/// Aggregate module results into a site report.
///
/// Only `completed` results contribute. A skipped or failed proxy scan still
/// occupies its half of the security category with a score of zero.
#[must_use]
pub fn aggregate(results: &[ModuleResult], max_recommendations: usize) -> SiteReport {
    let payload = |module: ModuleName| {
        results
            .iter()
            .find(|r| r.module_name == module && r.is_completed())
            .map(|r| &r.result_json)
    };

    let hygiene = payload(ModuleName::SecurityHygiene);
    let seo = payload(ModuleName::AnalyticsSeo);
    let accessibility = payload(ModuleName::Accessibility);
    let performance = payload(ModuleName::Performance);
    let proxy = payload(ModuleName::ProxySecurity);

    let proxy_issues: &[Value] = proxy
        .and_then(|p| p.get("issues"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let proxy_score = proxy.map_or(0.0, |_| {
        let penalty: f64 = proxy_issues
            .iter()
            .map(|issue| risk_penalty(text_field(issue, "risk")))
            .sum();
        (100.0 - penalty).max(0.0)
    });

    let category_scores = CategoryScores {
        security: clamp(
            HYGIENE_SHARE * score_of(hygiene) + (1.0 - HYGIENE_SHARE) * proxy_score,
        ),
        seo: clamp(score_of(seo)),
        performance: clamp(
            performance
                .and_then(|p| p.pointer("/scores/performance"))
                .and_then(Value::as_f64)
                .map_or(0.0, |s| (s * 100.0).round()),
        ),
        accessibility: clamp(score_of(accessibility)),
    };

    let mut recommendations = Vec::new();
    recommendations.extend(
        strings(hygiene, "recommendations")
            .map(|text| Recommendation::new(Category::Security, text, Impact::High)),
    );
    recommendations.extend(
        strings(seo, "recommendations")
            .map(|text| Recommendation::new(Category::Seo, text, Impact::Medium)),
    );
    let violations = accessibility
        .and_then(|p| p.get("violations"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if violations > 0 {
        recommendations.push(Recommendation::new(
            Category::Accessibility,
            format!("Fix {violations} accessibility violations"),
            Impact::High,
        ));
    }
    recommendations.extend(
        strings(performance, "recommendations")
            .map(|text| Recommendation::new(Category::Performance, text, Impact::Medium)),
    );
    recommendations.extend(proxy_issues.iter().map(|issue| {
        Recommendation::new(
            Category::Security,
            format!("{}: {}", text_field(issue, "name"), text_field(issue, "solution")),
            Impact::High,
        )
    }));
    recommendations.truncate(max_recommendations);

    let overall_score = category_scores.overall();
    SiteReport {
        overall_score,
        category_scores,
        recommendations,
        summary: format!("Overall site score is {overall_score}/100."),
    }
}

fn risk_penalty(risk: &str) -> f64 {
    match risk {
        "High" => 20.0,
        "Medium" => 10.0,
        _ => 2.0,
    }
}

fn score_of(payload: Option<&Value>) -> f64 {
    payload
        .and_then(|p| p.get("score"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn text_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn clamp(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

fn strings<'a>(payload: Option<&'a Value>, key: &str) -> impl Iterator<Item = &'a str> {
    payload
        .and_then(|p| p.get(key))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn completed(module: ModuleName, payload: Value) -> ModuleResult {
        ModuleResult::completed(module, payload)
    }

    fn hygiene(score: u32, recommendations: &[&str]) -> ModuleResult {
        completed(
            ModuleName::SecurityHygiene,
            json!({"score": score, "findings": [], "recommendations": recommendations}),
        )
    }

    fn seo(score: u32, recommendations: &[&str]) -> ModuleResult {
        completed(
            ModuleName::AnalyticsSeo,
            json!({"score": score, "recommendations": recommendations}),
        )
    }

    fn accessibility(score: u32, violations: u32) -> ModuleResult {
        completed(
            ModuleName::Accessibility,
            json!({"score": score, "violations": violations, "issues": []}),
        )
    }

    fn performance(score: f64, recommendations: &[&str]) -> ModuleResult {
        completed(
            ModuleName::Performance,
            json!({"scores": {"performance": score}, "recommendations": recommendations}),
        )
    }

    #[test]
    fn test_skipped_proxy_halves_security() {
        let results = vec![
            hygiene(100, &[]),
            ModuleResult::skipped(
                ModuleName::ProxySecurity,
                json!({"status": "skipped", "issues": []}),
            ),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert!((report.category_scores.security - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_proxy_issues_reduce_security() {
        let results = vec![
            hygiene(80, &[]),
            completed(
                ModuleName::ProxySecurity,
                json!({"status": "completed", "issues": [
                    {"risk": "High", "name": "XSS", "solution": "Escape output"},
                    {"risk": "Medium", "name": "Clickjacking", "solution": "Set X-Frame-Options"},
                    {"risk": "Low", "name": "Banner", "solution": "Hide version"},
                    {"risk": "Informational", "name": "Comment", "solution": ""}
                ]}),
            ),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        // 0.5 * 80 + 0.5 * (100 - 34)
        assert!((report.category_scores.security - 73.0).abs() < f64::EPSILON);
        assert_eq!(report.recommendations[0].text, "XSS: Escape output");
        assert_eq!(report.recommendations[0].impact, Impact::High);
    }

    #[test]
    fn test_unrated_proxy_issues_cost_like_low() {
        let results = vec![
            hygiene(100, &[]),
            completed(
                ModuleName::ProxySecurity,
                json!({"status": "completed", "issues": [
                    {"risk": "Informational"},
                    {"risk": "Informational"},
                    {}
                ]}),
            ),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        // 0.5 * 100 + 0.5 * (100 - 6)
        assert!((report.category_scores.security - 97.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_proxy_penalty_floors_at_zero() {
        let issues: Vec<Value> = (0..8).map(|_| json!({"risk": "High"})).collect();
        let results = vec![
            hygiene(100, &[]),
            completed(ModuleName::ProxySecurity, json!({"issues": issues})),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert!((report.category_scores.security - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overall_rounds_half_up() {
        let results = vec![
            hygiene(100, &[]),
            seo(75, &[]),
            accessibility(95, 0),
            performance(0.9, &[]),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert!((report.category_scores.performance - 90.0).abs() < f64::EPSILON);
        assert_eq!(report.overall_score, 75);
        assert_eq!(report.summary, "Overall site score is 75/100.");
    }

    #[test]
    fn test_categories_are_clamped() {
        let results = vec![
            completed(ModuleName::SecurityHygiene, json!({"score": -40})),
            completed(ModuleName::AnalyticsSeo, json!({"score": 180})),
            completed(ModuleName::Performance, json!({"scores": {"performance": 1.7}})),
        ];

        let scores = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS).category_scores;
        assert!(scores.security.abs() < f64::EPSILON);
        assert!((scores.seo - 100.0).abs() < f64::EPSILON);
        assert!((scores.performance - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_failed_and_malformed_modules_contribute_zero() {
        let results = vec![
            ModuleResult::failed(ModuleName::SecurityHygiene, "boom"),
            completed(ModuleName::AnalyticsSeo, json!({"score": "high"})),
            completed(ModuleName::Accessibility, json!(null)),
            completed(ModuleName::Performance, json!({"scores": []})),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert_eq!(report.overall_score, 0);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_empty_results() {
        let report = aggregate(&[], DEFAULT_MAX_RECOMMENDATIONS);
        assert_eq!(report.overall_score, 0);
        assert_eq!(report.summary, "Overall site score is 0/100.");
    }

    #[test]
    fn test_recommendations_pool_order_and_truncation() {
        let results = vec![
            hygiene(50, &["h1", "h2", "h3", "h4"]),
            seo(50, &["s1", "s2", "s3"]),
            accessibility(90, 4),
            performance(0.5, &["p1", "p2", "p3", "p4", "p5"]),
            completed(
                ModuleName::ProxySecurity,
                json!({"issues": [
                    {"risk": "Low", "name": "z1", "solution": "fix"},
                    {"risk": "Low", "name": "z2", "solution": "fix"}
                ]}),
            ),
        ];

        let report = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert_eq!(report.recommendations.len(), 10);
        let texts: Vec<&str> = report
            .recommendations
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(
            texts,
            vec![
                "h1",
                "h2",
                "h3",
                "h4",
                "s1",
                "s2",
                "s3",
                "Fix 4 accessibility violations",
                "p1",
                "p2"
            ]
        );
        assert_eq!(report.recommendations[4].impact, Impact::Medium);
        assert_eq!(report.recommendations[7].category, Category::Accessibility);
    }

    #[test]
    fn test_no_accessibility_recommendation_without_violations() {
        let report = aggregate(&[accessibility(100, 0)], DEFAULT_MAX_RECOMMENDATIONS);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let results = vec![
            hygiene(70, &["Add HSTS"]),
            seo(85, &["Add a meta description"]),
            accessibility(91, 3),
            performance(0.64, &["Reduce unused JavaScript"]),
        ];

        let first = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        let second = aggregate(&results, DEFAULT_MAX_RECOMMENDATIONS);
        assert_eq!(first, second);
    }

    #[test]
    fn test_into_module_result() {
        let result = aggregate(&[], DEFAULT_MAX_RECOMMENDATIONS).into_module_result();
        assert_eq!(result.module_name, ModuleName::AggregatedReport);
        assert!(result.is_completed());
        assert_eq!(result.result_json["overall_score"], 0);
        assert_eq!(result.result_json["category_scores"]["security"], 0.0);
    }
}

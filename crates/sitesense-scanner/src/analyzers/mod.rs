//! The six scan modules.

pub mod accessibility;
pub mod analytics_seo;
pub mod heatmap;
pub mod performance;
pub mod proxy_scan;
pub mod security_hygiene;

pub use accessibility::{accessibility_score, AccessibilityAnalyzer, AccessibilityIssue};
pub use analytics_seo::{check_seo, AnalyticsSeoAnalyzer, SeoReport};
pub use heatmap::{generate_heatmaps, HeatmapAnalyzer, Heatmaps};
pub use performance::PerformanceAnalyzer;
pub use proxy_scan::ProxyScanAnalyzer;
pub use security_hygiene::{check_security_hygiene, HygieneReport, SecurityHygieneAnalyzer};

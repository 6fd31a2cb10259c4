//! SiteSense Scanner - Scan orchestration.
//!
//! This crate renders a target page once, fans the resulting artifact out to
//! six independent analyzers, and aggregates their results into a weighted
//! site report.
//!
//! # Features
//!
//! - Concurrent analyzers with per-module failure isolation and time limits
//! - Deterministic report aggregation with pooled recommendations
//! - Lighthouse CLI and OWASP ZAP integrations behind swappable traits
//! - Background scan queue with bounded concurrency and status updates
//!
//! # Example
//!
//! ```rust,ignore
//! use sitesense_core::AppConfig;
//! use sitesense_scanner::{ScanPipeline, ScanQueue};
//! use std::sync::Arc;
//!
//! let config = AppConfig::load()?;
//! let pipeline = Arc::new(ScanPipeline::from_config(&config).await?);
//! let queue = ScanQueue::new(pipeline, config.scanning.max_concurrent_scans);
//!
//! let handle = queue.submit("example.com").await?;
//! let scan = handle.wait().await?;
//! println!("{:?}", scan.report());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[allow(missing_docs)]
pub mod aggregator;
pub mod analyzer;
pub mod analyzers;
pub mod coordinator;
#[allow(missing_docs)]
pub mod error;
pub mod lighthouse;
pub mod pipeline;
pub mod queue;
pub mod zap;

// Re-export commonly used types
pub use aggregator::{aggregate, Category, CategoryScores, Impact, Recommendation, SiteReport};
pub use analyzer::{AnalysisContext, Analyzer, AnalyzerOutput, DerivedArtifact};
pub use coordinator::FanOutCoordinator;
pub use error::{AnalyzerError, Result, ScanError};
pub use lighthouse::{LighthouseRunner, LighthouseSummary, PerformanceAuditor};
pub use pipeline::ScanPipeline;
pub use queue::{ScanHandle, ScanQueue};
pub use zap::{SecurityProxy, ZapAlert, ZapClient};

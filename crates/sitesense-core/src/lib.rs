//! SiteSense Core - Foundation crate for the SiteSense site scanner.
//!
//! This crate provides shared types, the page artifact model, error handling
//! and configuration management that all other SiteSense crates depend on.
//!
//! # Modules
//!
//! - [`artifact`] - The immutable rendered-page snapshot shared by analyzers
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`error`] - Central error types using thiserror
//! - [`types`] - Scan lifecycle, module results and file identifiers
//!
//! # Example
//!
//! ```rust
//! use sitesense_core::{AppConfig, Scan, ScanStatus};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let scan = Scan::new("example.com")?;
//! assert_eq!(scan.status, ScanStatus::Queued);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use artifact::{ClickableElement, CookieInfo, NetworkRequest, PageArtifact, Rect, Viewport};
pub use config::{
    AppConfig, BrowserConfig, LighthouseConfig, ProxyConfig, ScanningConfig, StorageConfig,
};
pub use error::{ConfigError, ConfigResult, Result, SiteSenseError};
pub use types::{
    normalize_url, FileRef, FileType, ModuleName, ModuleResult, ModuleStatus, Scan, ScanId,
    ScanStatus,
};

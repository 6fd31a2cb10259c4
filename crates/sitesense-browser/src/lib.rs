//! Headless browser boundary for SiteSense.
//!
//! Renders a target page once into a `PageArtifact` and runs axe-core
//! accessibility audits. Both capabilities sit behind traits so the scan
//! pipeline can be driven by fakes in tests.

pub mod accessibility;
pub mod engine;
pub mod error;
pub mod renderer;

pub use accessibility::{AccessibilityAuditor, AxeNode, AxeViolation};
pub use engine::BrowserEngine;
pub use error::{BrowserError, Result};
pub use renderer::PageRenderer;

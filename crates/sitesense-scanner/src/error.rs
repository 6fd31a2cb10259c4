use sitesense_core::{FileType, ModuleName};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single analyzer invocation.
///
/// Never escapes the fan-out coordinator; it is recorded as a `failed`
/// module result instead.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("{tool} is not installed or not on PATH")]
    ToolNotInstalled { tool: String },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{module} timed out after {timeout:?}")]
    Timeout {
        module: ModuleName,
        timeout: Duration,
    },

    #[error("{module} panicked: {message}")]
    Panicked { module: ModuleName, message: String },

    #[error("failed to store {file_type}: {reason}")]
    Storage { file_type: FileType, reason: String },

    #[error("proxy request failed: {0}")]
    Proxy(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid tool output: {0}")]
    InvalidOutput(String),

    #[error("Browser error: {0}")]
    Browser(#[from] sitesense_browser::BrowserError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Fatal pipeline failure; the scan ends in `failed`.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("render failed: {0}")]
    Render(#[from] sitesense_browser::BrowserError),

    #[error("render timed out after {0:?}")]
    RenderTimeout(Duration),

    #[error("Database error: {0}")]
    Database(#[from] sitesense_db::DatabaseError),

    #[error(transparent)]
    Core(#[from] sitesense_core::SiteSenseError),

    #[error("scan task ended unexpectedly: {0}")]
    TaskFailed(String),

    #[error("failed to initialise {component}: {reason}")]
    Setup { component: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;

//! Configuration management for SiteSense.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. The loaded `AppConfig` is handed to the
//! pipeline constructors explicitly.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/sitesense/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Headless browser settings
    pub browser: BrowserConfig,
    /// Pipeline behaviour
    pub scanning: ScanningConfig,
    /// Lighthouse CLI settings
    pub lighthouse: LighthouseConfig,
    /// ZAP proxy settings
    pub proxy: ProxyConfig,
    /// Persistence settings
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config = toml::from_str(&contents)?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SITESENSE_HEADLESS`: browser headless mode (true/false)
    /// - `SITESENSE_CHROME_PATH`: browser executable for rendering and Lighthouse
    /// - `SITESENSE_ZAP_HOST` / `SITESENSE_ZAP_PORT` / `SITESENSE_ZAP_API_KEY`
    /// - `SITESENSE_DATABASE_PATH`: SQLite database file
    /// - `SITESENSE_ANALYZER_TIMEOUT_SECS`: per-analyzer timeout
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(headless) = lookup("SITESENSE_HEADLESS").and_then(|v| v.parse().ok()) {
            self.browser.headless = headless;
            tracing::debug!("Override browser.headless from env: {}", headless);
        }

        if let Some(path) = lookup("SITESENSE_CHROME_PATH") {
            tracing::debug!("Override chrome_path from env: {}", path);
            self.browser.chrome_path = Some(path.clone());
            self.lighthouse.chrome_path = Some(path);
        }

        if let Some(host) = lookup("SITESENSE_ZAP_HOST") {
            tracing::debug!("Override proxy.host from env: {}", host);
            self.proxy.host = host;
        }

        if let Some(port) = lookup("SITESENSE_ZAP_PORT").and_then(|v| v.parse().ok()) {
            tracing::debug!("Override proxy.port from env: {}", port);
            self.proxy.port = port;
        }

        if let Some(key) = lookup("SITESENSE_ZAP_API_KEY") {
            self.proxy.api_key = key;
        }

        if let Some(path) = lookup("SITESENSE_DATABASE_PATH") {
            tracing::debug!("Override storage.database_path from env: {}", path);
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(secs) =
            lookup("SITESENSE_ANALYZER_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            tracing::debug!("Override scanning.analyzer_timeout_secs from env: {}", secs);
            self.scanning.analyzer_timeout_secs = secs;
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser.window_width/window_height".to_string(),
                reason: "viewport dimensions must be non-zero".to_string(),
            });
        }
        if self.scanning.max_concurrent_scans == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.max_concurrent_scans".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.proxy.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "proxy.poll_interval_ms".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let config_dir = path.parent().ok_or_else(|| ConfigError::InvalidValue {
            field: "config_path".to_string(),
            reason: "no parent directory".to_string(),
        })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sitesense/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "sitesense", "sitesense").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/sitesense`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "sitesense", "sitesense").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Viewport width
    pub window_width: u32,
    /// Viewport height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Browser executable; auto-detected when unset
    pub chrome_path: Option<String>,
    /// axe-core script injected for accessibility audits
    pub axe_script_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1440,
            window_height: 900,
            navigation_timeout_secs: 30,
            chrome_path: None,
            axe_script_url: "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.7.2/axe.min.js"
                .to_string(),
        }
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Upper bound for each analyzer in seconds (0 = unbounded)
    pub analyzer_timeout_secs: u64,
    /// Upper bound for rendering in seconds
    pub render_timeout_secs: u64,
    /// Scans allowed to run at the same time
    pub max_concurrent_scans: usize,
    /// Recommendations kept in the aggregated report
    pub max_recommendations: usize,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_secs: 180,
            render_timeout_secs: 60,
            max_concurrent_scans: 4,
            max_recommendations: 10,
        }
    }
}

impl ScanningConfig {
    /// Per-analyzer time limit, `None` when disabled.
    #[must_use]
    pub fn analyzer_timeout(&self) -> Option<Duration> {
        (self.analyzer_timeout_secs > 0).then(|| Duration::from_secs(self.analyzer_timeout_secs))
    }
}

/// Lighthouse CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LighthouseConfig {
    /// Executable name or path
    pub binary: String,
    /// Exported as `CHROME_PATH` for the child process
    pub chrome_path: Option<String>,
    /// Additional command-line flags
    pub extra_flags: Vec<String>,
    /// Opportunity titles kept as recommendations
    pub max_recommendations: usize,
}

impl Default for LighthouseConfig {
    fn default() -> Self {
        Self {
            binary: "lighthouse".to_string(),
            chrome_path: None,
            extra_flags: Vec::new(),
            max_recommendations: 5,
        }
    }
}

/// ZAP proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// API host
    pub host: String,
    /// API port
    pub port: u16,
    /// API key (never written back to disk)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Liveness probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Delay between spider status polls
    pub poll_interval_ms: u64,
    /// Polls before the spider is considered stuck
    pub max_poll_attempts: u32,
}

impl ProxyConfig {
    /// Base URL of the ZAP JSON API.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            api_key: String::new(),
            probe_timeout_secs: 2,
            poll_interval_ms: 1000,
            max_poll_attempts: 600,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file; results are kept in memory when unset
    pub database_path: Option<PathBuf>,
    /// Prefix of file retrieval references
    pub file_url_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            file_url_prefix: "/files".to_string(),
        }
    }
}

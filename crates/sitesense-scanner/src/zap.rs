//! OWASP ZAP API client.
//!
//! Only the spider and alert endpoints are used; active scanning is never
//! started.

use crate::error::AnalyzerError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sitesense_core::ProxyConfig;
use std::time::Duration;

const API_KEY_HEADER: &str = "X-ZAP-API-Key";
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// An alert reported by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZapAlert {
    /// `High`, `Medium`, `Low` or `Informational`
    pub risk: String,
    /// Confidence tier
    pub confidence: String,
    /// Alert title
    pub name: String,
    /// What was found
    pub description: String,
    /// Affected URL
    pub url: String,
    /// Suggested fix
    pub solution: String,
}

/// The security scanning proxy boundary.
#[async_trait]
pub trait SecurityProxy: Send + Sync {
    /// Whether the proxy answers its liveness probe.
    async fn is_available(&self) -> bool;

    /// Start a spider crawl of `url`, returning the crawl token.
    async fn start_spider(&self, url: &str) -> Result<String, AnalyzerError>;

    /// Crawl progress in percent.
    async fn spider_progress(&self, token: &str) -> Result<u32, AnalyzerError>;

    /// Alerts raised for `url`.
    async fn alerts(&self, url: &str) -> Result<Vec<ZapAlert>, AnalyzerError>;
}

/// HTTP client for a running ZAP instance.
#[derive(Debug, Clone)]
pub struct ZapClient {
    client: Client,
    base_url: String,
    api_key: String,
    probe_timeout: Duration,
}

impl ZapClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns `AnalyzerError::Http` if the HTTP client cannot be created.
    pub fn new(config: &ProxyConfig) -> Result<Self, AnalyzerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            api_key: config.api_key.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
        })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, AnalyzerError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzerError::Proxy(format!("{path} returned {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl SecurityProxy for ZapClient {
    async fn is_available(&self) -> bool {
        let probe = self
            .client
            .get(format!("{}/JSON/core/view/version/", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(self.probe_timeout)
            .send()
            .await;

        match probe {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                tracing::warn!("ZAP probe returned {}", response.status());
                false
            }
            Err(e) => {
                tracing::debug!("ZAP not reachable at {}: {}", self.base_url, e);
                false
            }
        }
    }

    async fn start_spider(&self, url: &str) -> Result<String, AnalyzerError> {
        let body = self
            .get_json("/JSON/spider/action/scan/", &[("url", url)])
            .await?;
        scalar_string(&body, "scan")
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AnalyzerError::Proxy("spider did not return a scan id".to_string()))
    }

    async fn spider_progress(&self, token: &str) -> Result<u32, AnalyzerError> {
        let body = self
            .get_json("/JSON/spider/view/status/", &[("scanId", token)])
            .await?;
        Ok(scalar_string(&body, "status")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0))
    }

    async fn alerts(&self, url: &str) -> Result<Vec<ZapAlert>, AnalyzerError> {
        let body = self
            .get_json("/JSON/core/view/alerts/", &[("baseurl", url)])
            .await?;
        Ok(parse_alerts(&body))
    }
}

/// ZAP returns numbers as strings; accept either.
fn scalar_string(body: &Value, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Convert the `alerts` array of a ZAP response.
#[must_use]
pub fn parse_alerts(body: &Value) -> Vec<ZapAlert> {
    let field = |alert: &Value, key: &str| {
        alert
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    body.get("alerts")
        .and_then(Value::as_array)
        .map(|alerts| {
            alerts
                .iter()
                .map(|alert| ZapAlert {
                    risk: field(alert, "risk"),
                    confidence: field(alert, "confidence"),
                    name: field(alert, "alert"),
                    description: field(alert, "description"),
                    url: field(alert, "url"),
                    solution: field(alert, "solution"),
                })
                .collect()
        })
        .unwrap_or_default()
}

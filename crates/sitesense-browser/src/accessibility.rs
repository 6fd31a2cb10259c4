//! axe-core accessibility audits driven through their own page load.

use crate::engine::BrowserEngine;
use crate::error::{BrowserError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use serde::{Deserialize, Serialize};

/// Runs an accessibility audit against a live URL.
#[async_trait]
pub trait AccessibilityAuditor: Send + Sync {
    /// Load `url` and return the axe-core violations found.
    async fn audit(&self, url: &str) -> Result<Vec<AxeViolation>>;
}

/// A single rule violation as reported by `axe.run()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxeViolation {
    /// Rule identifier, e.g. `color-contrast`
    pub id: String,
    /// `critical`, `serious`, `moderate` or `minor`
    #[serde(default)]
    pub impact: Option<String>,
    /// Rule description
    #[serde(default)]
    pub description: String,
    /// Documentation link
    #[serde(rename = "helpUrl", default)]
    pub help_url: String,
    /// Offending nodes
    #[serde(default)]
    pub nodes: Vec<AxeNode>,
}

/// A node affected by a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxeNode {
    /// Selector path; nested arrays appear for shadow DOM targets
    #[serde(default)]
    pub target: Vec<serde_json::Value>,
}

impl AxeNode {
    /// First selector of the target path, flattened to a string.
    pub fn primary_target(&self) -> Option<String> {
        self.target.first().map(|t| match t {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[async_trait]
impl AccessibilityAuditor for BrowserEngine {
    async fn audit(&self, url: &str) -> Result<Vec<AxeViolation>> {
        let session = self.launch().await?;
        let result = tokio::time::timeout(self.navigation_timeout() * 2, async {
            let page = session.new_page().await?;
            page.goto(url)
                .await
                .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
            self.run_axe(&page).await
        })
        .await;
        session.close().await;

        match result {
            Ok(violations) => violations,
            Err(_) => Err(BrowserError::Timeout(format!(
                "accessibility audit of {url} timed out"
            ))),
        }
    }
}

impl BrowserEngine {
    async fn run_axe(&self, page: &Page) -> Result<Vec<AxeViolation>> {
        let inject = format!(
            "new Promise((resolve, reject) => {{
                const s = document.createElement('script');
                s.src = {src};
                s.onload = () => resolve(true);
                s.onerror = () => reject(new Error('failed to load axe-core'));
                document.head.appendChild(s);
            }})",
            src = serde_json::Value::String(self.config().axe_script_url.clone())
        );
        evaluate_promise(page, inject).await?;

        let value = evaluate_promise(
            page,
            "axe.run().then(results => results.violations)".to_string(),
        )
        .await?;

        parse_violations(value)
    }
}

async fn evaluate_promise(page: &Page, expression: String) -> Result<serde_json::Value> {
    let params = EvaluateParams::builder()
        .expression(expression)
        .await_promise(true)
        .return_by_value(true)
        .build()
        .map_err(BrowserError::Evaluation)?;

    let result = page.evaluate_expression(params).await?;
    Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
}

/// Decode the `violations` array returned by axe-core.
pub fn parse_violations(value: serde_json::Value) -> Result<Vec<AxeViolation>> {
    serde_json::from_value(value)
        .map_err(|e| BrowserError::Evaluation(format!("unexpected axe-core output: {e}")))
}

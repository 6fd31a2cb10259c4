//! Passive security scan through the ZAP proxy.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use crate::zap::SecurityProxy;
use async_trait::async_trait;
use serde_json::json;
use sitesense_core::{ModuleName, ProxyConfig};
use std::sync::Arc;
use std::time::Duration;

/// Spiders the target and collects alerts; skipped when the proxy is down.
pub struct ProxyScanAnalyzer {
    proxy: Arc<dyn SecurityProxy>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl ProxyScanAnalyzer {
    /// Create an analyzer using `proxy` with polling settings from `config`.
    #[must_use]
    pub fn new(proxy: Arc<dyn SecurityProxy>, config: &ProxyConfig) -> Self {
        Self {
            proxy,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_poll_attempts: config.max_poll_attempts,
        }
    }

    async fn wait_for_spider(&self, token: &str) -> Result<(), AnalyzerError> {
        for attempt in 0..self.max_poll_attempts {
            let progress = self.proxy.spider_progress(token).await?;
            if progress >= 100 {
                return Ok(());
            }
            if attempt + 1 < self.max_poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
        Err(AnalyzerError::Proxy(format!(
            "spider {token} did not finish after {} polls",
            self.max_poll_attempts
        )))
    }
}

#[async_trait]
impl Analyzer for ProxyScanAnalyzer {
    fn module(&self) -> ModuleName {
        ModuleName::ProxySecurity
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalyzerOutput, AnalyzerError> {
        if !self.proxy.is_available().await {
            tracing::warn!("Security proxy unavailable, skipping scan of {}", ctx.url);
            return Ok(AnalyzerOutput::skipped(json!({
                "status": "skipped",
                "issues": [],
            })));
        }

        tracing::info!("Starting proxy spider for {}", ctx.url);
        let token = self.proxy.start_spider(&ctx.url).await?;
        self.wait_for_spider(&token).await?;
        let issues = self.proxy.alerts(&ctx.url).await?;
        tracing::info!("Proxy scan of {} raised {} alerts", ctx.url, issues.len());

        Ok(AnalyzerOutput::completed(json!({
            "status": "completed",
            "issues": issues,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zap::ZapAlert;
    use sitesense_core::{ModuleStatus, PageArtifact, ScanId};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeProxy {
        available: bool,
        token: Option<String>,
        progress_steps: Vec<u32>,
        polls: AtomicU32,
    }

    impl FakeProxy {
        fn new(available: bool, token: Option<&str>, progress_steps: Vec<u32>) -> Self {
            Self {
                available,
                token: token.map(str::to_string),
                progress_steps,
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SecurityProxy for FakeProxy {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn start_spider(&self, _url: &str) -> Result<String, AnalyzerError> {
            self.token
                .clone()
                .ok_or_else(|| AnalyzerError::Proxy("no scan id".to_string()))
        }

        async fn spider_progress(&self, _token: &str) -> Result<u32, AnalyzerError> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self
                .progress_steps
                .get(poll)
                .or(self.progress_steps.last())
                .copied()
                .unwrap_or(0))
        }

        async fn alerts(&self, url: &str) -> Result<Vec<ZapAlert>, AnalyzerError> {
            Ok(vec![ZapAlert {
                risk: "High".to_string(),
                confidence: "Medium".to_string(),
                name: "SQL Injection".to_string(),
                description: String::new(),
                url: url.to_string(),
                solution: "Use parameterised queries.".to_string(),
            }])
        }
    }

    fn config() -> ProxyConfig {
        ProxyConfig {
            poll_interval_ms: 1,
            max_poll_attempts: 3,
            ..ProxyConfig::default()
        }
    }

    fn context() -> AnalysisContext {
        AnalysisContext {
            scan_id: ScanId::generate(),
            url: "https://example.com".to_string(),
            artifact: Arc::new(PageArtifact::default()),
        }
    }

    #[tokio::test]
    async fn test_unavailable_proxy_is_skipped() {
        let analyzer =
            ProxyScanAnalyzer::new(Arc::new(FakeProxy::new(false, None, vec![])), &config());
        let output = analyzer.analyze(&context()).await.expect("skip is not an error");
        assert_eq!(output.status, ModuleStatus::Skipped);
        assert_eq!(output.payload["status"], "skipped");
    }

    #[tokio::test]
    async fn test_completed_scan_returns_issues() {
        let proxy = FakeProxy::new(true, Some("7"), vec![10, 60, 100]);
        let analyzer = ProxyScanAnalyzer::new(Arc::new(proxy), &config());
        let output = analyzer.analyze(&context()).await.expect("analyze");
        assert_eq!(output.status, ModuleStatus::Completed);
        assert_eq!(output.payload["issues"][0]["risk"], "High");
    }

    #[tokio::test]
    async fn test_missing_spider_token_fails() {
        let analyzer =
            ProxyScanAnalyzer::new(Arc::new(FakeProxy::new(true, None, vec![])), &config());
        assert!(analyzer.analyze(&context()).await.is_err());
    }

    #[tokio::test]
    async fn test_spider_that_never_finishes_fails() {
        let proxy = FakeProxy::new(true, Some("1"), vec![50]);
        let analyzer = ProxyScanAnalyzer::new(Arc::new(proxy), &config());
        let result = analyzer.analyze(&context()).await;
        assert!(matches!(result, Err(AnalyzerError::Proxy(_))));
    }
}

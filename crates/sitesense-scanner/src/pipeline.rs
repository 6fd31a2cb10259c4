//! The scan pipeline: render once, fan out, aggregate, persist.

use crate::aggregator::aggregate;
use crate::analyzer::{AnalysisContext, Analyzer};
use crate::analyzers::{
    AccessibilityAnalyzer, AnalyticsSeoAnalyzer, HeatmapAnalyzer, PerformanceAnalyzer,
    ProxyScanAnalyzer, SecurityHygieneAnalyzer,
};
use crate::coordinator::FanOutCoordinator;
use crate::error::{Result, ScanError};
use crate::lighthouse::LighthouseRunner;
use crate::zap::ZapClient;
use sitesense_browser::{BrowserEngine, PageRenderer};
use sitesense_core::{AppConfig, FileType, PageArtifact, Scan, ScanStatus, ScanningConfig};
use sitesense_db::{ArtifactStore, Database, ScanStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const SCREENSHOT_CONTENT_TYPE: &str = "image/png";
const IN_MEMORY_DATABASE: &str = ":memory:";

/// Runs one scan from `queued` to a terminal state.
pub struct ScanPipeline {
    renderer: Arc<dyn PageRenderer>,
    coordinator: FanOutCoordinator,
    artifacts: Arc<dyn ArtifactStore>,
    scans: Arc<dyn ScanStore>,
    config: ScanningConfig,
}

impl ScanPipeline {
    /// Assemble a pipeline from its collaborators.
    #[must_use]
    pub fn new(
        renderer: Arc<dyn PageRenderer>,
        coordinator: FanOutCoordinator,
        artifacts: Arc<dyn ArtifactStore>,
        scans: Arc<dyn ScanStore>,
        config: ScanningConfig,
    ) -> Self {
        Self {
            renderer,
            coordinator,
            artifacts,
            scans,
            config,
        }
    }

    /// Build the standard pipeline: Chromium rendering and accessibility
    /// audits, the Lighthouse CLI, the ZAP proxy and SQLite storage.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated, or the
    /// proxy client cannot be created.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let database = open_database(config).await?;
        let engine = Arc::new(BrowserEngine::new(config.browser.clone()));
        let proxy = ZapClient::new(&config.proxy).map_err(|e| ScanError::Setup {
            component: "security proxy client".to_string(),
            reason: e.to_string(),
        })?;

        let analyzers: Vec<Arc<dyn Analyzer>> = vec![
            Arc::new(SecurityHygieneAnalyzer),
            Arc::new(AnalyticsSeoAnalyzer),
            Arc::new(AccessibilityAnalyzer::new(engine.clone())),
            Arc::new(PerformanceAnalyzer::new(
                Arc::new(LighthouseRunner::new(config.lighthouse.clone())),
                config.lighthouse.max_recommendations,
            )),
            Arc::new(HeatmapAnalyzer),
            Arc::new(ProxyScanAnalyzer::new(Arc::new(proxy), &config.proxy)),
        ];

        let coordinator = FanOutCoordinator::new(analyzers, database.clone())
            .with_timeout(config.scanning.analyzer_timeout());

        Ok(Self::new(
            engine,
            coordinator,
            database.clone(),
            database,
            config.scanning.clone(),
        ))
    }

    /// Store holding scan records.
    #[must_use]
    pub fn scans(&self) -> Arc<dyn ScanStore> {
        Arc::clone(&self.scans)
    }

    /// Store holding derived files.
    #[must_use]
    pub fn artifacts(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.artifacts)
    }

    /// Settings the pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &ScanningConfig {
        &self.config
    }

    /// Run `scan` to completion, publishing status changes on `status`.
    ///
    /// Never returns an error: a fatal failure is recorded on the returned
    /// scan as `failed` with its message, and no module results are kept.
    pub async fn run(&self, mut scan: Scan, status: &watch::Sender<ScanStatus>) -> Scan {
        match self.execute(&mut scan, status).await {
            Ok(()) => {
                tracing::info!("Scan {} completed", scan.id);
            }
            Err(e) => {
                tracing::error!("Scan {} failed: {}", scan.id, e);
                self.record_failure(&mut scan, &e.to_string()).await;
                status.send_replace(scan.status);
            }
        }
        scan
    }

    async fn execute(&self, scan: &mut Scan, status: &watch::Sender<ScanStatus>) -> Result<()> {
        scan.transition_to(ScanStatus::Running)?;
        self.scans.update_scan(scan).await?;
        status.send_replace(scan.status);

        tracing::info!("Rendering {} for scan {}", scan.normalized_url, scan.id);
        let artifact = self.render(&scan.normalized_url).await?;
        let screenshot = self
            .artifacts
            .save_file(
                &scan.id,
                FileType::Screenshot,
                SCREENSHOT_CONTENT_TYPE,
                artifact.screenshot.clone(),
            )
            .await?;
        scan.files.push(screenshot);

        let ctx = AnalysisContext {
            scan_id: scan.id.clone(),
            url: scan.normalized_url.clone(),
            artifact: Arc::new(artifact),
        };
        let (mut results, files) = self.coordinator.run_collecting_files(&ctx).await;
        scan.files.extend(files);

        let report = aggregate(&results, self.config.max_recommendations);
        tracing::info!(
            "Scan {} scored {}/100",
            scan.id,
            report.overall_score
        );
        results.push(report.into_module_result());

        self.scans.replace_module_results(&scan.id, &results).await?;
        scan.complete(results)?;
        self.scans.update_scan(scan).await?;
        status.send_replace(scan.status);
        Ok(())
    }

    async fn render(&self, url: &str) -> Result<PageArtifact> {
        let limit = Duration::from_secs(self.config.render_timeout_secs);
        match tokio::time::timeout(limit, self.renderer.render(url)).await {
            Ok(artifact) => Ok(artifact?),
            Err(_) => Err(ScanError::RenderTimeout(limit)),
        }
    }

    pub(crate) async fn record_failure(&self, scan: &mut Scan, message: &str) {
        if scan.status.is_terminal() {
            return;
        }
        if let Err(e) = scan.fail(message) {
            tracing::error!("Cannot mark scan {} failed: {}", scan.id, e);
            return;
        }
        if let Err(e) = self.scans.update_scan(scan).await {
            tracing::warn!("Failed to persist failure of scan {}: {}", scan.id, e);
        }
    }
}

async fn open_database(config: &AppConfig) -> Result<Arc<Database>> {
    let database = match &config.storage.database_path {
        Some(path) => {
            tracing::debug!("Opening scan database at {}", path.display());
            Database::new(path).await?
        }
        None => {
            tracing::debug!("No database path configured, using in-memory storage");
            Database::new(IN_MEMORY_DATABASE).await?
        }
    };
    database.run_migrations().await?;
    Ok(Arc::new(
        database.with_file_url_prefix(config.storage.file_url_prefix.clone()),
    ))
}

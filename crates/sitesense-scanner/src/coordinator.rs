//! Fan-out coordinator.
//!
//! Runs every analyzer concurrently on its own task against one shared
//! [`AnalysisContext`], waits for all of them, and returns one
//! [`ModuleResult`] per analyzer in module declaration order. An analyzer
//! error, panic or timeout becomes a `failed` result; it never cancels the
//! other analyzers.

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerOutput};
use crate::error::AnalyzerError;
use futures::future::join_all;
use sitesense_core::{FileRef, ModuleName, ModuleResult, ModuleStatus, ScanId};
use sitesense_db::ArtifactStore;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Dispatches a scan's context to all analyzers and collects their results.
pub struct FanOutCoordinator {
    /// Registered analyzers
    analyzers: Vec<Arc<dyn Analyzer>>,
    /// Destination for derived files
    store: Arc<dyn ArtifactStore>,
    /// Per-analyzer time limit; `None` waits indefinitely
    timeout: Option<Duration>,
}

impl FanOutCoordinator {
    /// Create a coordinator without a time limit.
    #[must_use]
    pub fn new(analyzers: Vec<Arc<dyn Analyzer>>, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            analyzers,
            store,
            timeout: None,
        }
    }

    /// Bound each analyzer invocation by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Modules handled by this coordinator, in result order.
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleName> {
        let mut modules: Vec<ModuleName> = self.analyzers.iter().map(|a| a.module()).collect();
        modules.sort();
        modules
    }

    /// Run all analyzers and return their results in declaration order.
    pub async fn run(&self, ctx: &AnalysisContext) -> Vec<ModuleResult> {
        self.run_collecting_files(ctx).await.0
    }

    /// Like [`run`](Self::run), also returning the derived files that were stored.
    pub async fn run_collecting_files(
        &self,
        ctx: &AnalysisContext,
    ) -> (Vec<ModuleResult>, Vec<FileRef>) {
        tracing::info!(
            "Running {} analyzers for scan {}",
            self.analyzers.len(),
            ctx.scan_id
        );

        let invocations = self
            .analyzers
            .iter()
            .map(|analyzer| self.invoke(Arc::clone(analyzer), ctx.clone()));

        let mut outcomes = join_all(invocations).await;
        outcomes.sort_by_key(|(result, _)| result.module_name);

        let mut results = Vec::with_capacity(outcomes.len());
        let mut files = Vec::new();
        for (result, stored) in outcomes {
            results.push(result);
            files.extend(stored);
        }
        (results, files)
    }

    async fn invoke(
        &self,
        analyzer: Arc<dyn Analyzer>,
        ctx: AnalysisContext,
    ) -> (ModuleResult, Vec<FileRef>) {
        let module = analyzer.module();
        let scan_id = ctx.scan_id.clone();

        let outcome = match self.execute(analyzer, ctx).await {
            Ok(output) => self.publish(&scan_id, module, output).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok((result, files)) => {
                if result.status == ModuleStatus::Skipped {
                    tracing::warn!("Module {} skipped for scan {}", module, scan_id);
                } else {
                    tracing::debug!("Module {} completed for scan {}", module, scan_id);
                }
                (result, files)
            }
            Err(e) => {
                tracing::warn!("Module {} failed for scan {}: {}", module, scan_id, e);
                (ModuleResult::failed(module, e.to_string()), Vec::new())
            }
        }
    }

    /// Run one analyzer on its own task, enforcing the time limit.
    async fn execute(
        &self,
        analyzer: Arc<dyn Analyzer>,
        ctx: AnalysisContext,
    ) -> Result<AnalyzerOutput, AnalyzerError> {
        let module = analyzer.module();
        let mut handle = tokio::spawn(async move { analyzer.analyze(&ctx).await });

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(AnalyzerError::Timeout {
                        module,
                        timeout: limit,
                    });
                }
            },
            None => handle.await,
        };

        joined.map_err(|e| join_failure(module, e))?
    }

    /// Store derived files and replace them in the payload by their URLs.
    async fn publish(
        &self,
        scan_id: &ScanId,
        module: ModuleName,
        output: AnalyzerOutput,
    ) -> Result<(ModuleResult, Vec<FileRef>), AnalyzerError> {
        let AnalyzerOutput {
            status,
            mut payload,
            artifacts,
        } = output;

        let mut files = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let file_type = artifact.file_type;
            let file = self
                .store
                .save_file(scan_id, file_type, artifact.content_type, artifact.bytes)
                .await
                .map_err(|e| AnalyzerError::Storage {
                    file_type,
                    reason: e.to_string(),
                })?;
            match payload.as_object_mut() {
                Some(fields) => {
                    fields.insert(artifact.payload_key.to_string(), file.url.clone().into());
                }
                None => {
                    return Err(AnalyzerError::InvalidOutput(format!(
                        "{module} payload is not an object"
                    )))
                }
            }
            files.push(file);
        }

        let result = ModuleResult {
            module_name: module,
            status,
            result_json: payload,
        };
        Ok((result, files))
    }
}

fn join_failure(module: ModuleName, error: JoinError) -> AnalyzerError {
    let message = if error.is_panic() {
        panic_message(error.into_panic())
    } else {
        error.to_string()
    };
    AnalyzerError::Panicked { module, message }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => payload
            .downcast_ref::<&str>()
            .map_or_else(|| "unknown panic".to_string(), |s| (*s).to_string()),
    }
}

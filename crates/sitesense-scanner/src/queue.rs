//! Scan task queue.
//!
//! Each submitted scan runs as its own task. A semaphore bounds how many
//! pipelines run at once; the rest wait in `queued`.

use crate::coordinator::panic_message;
use crate::error::{Result, ScanError};
use crate::pipeline::ScanPipeline;
use sitesense_core::{Scan, ScanId, ScanStatus};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

/// Accepts scan requests and runs them in the background.
pub struct ScanQueue {
    pipeline: Arc<ScanPipeline>,
    permits: Arc<Semaphore>,
}

impl ScanQueue {
    /// Create a queue running at most `max_concurrent_scans` pipelines at once.
    #[must_use]
    pub fn new(pipeline: Arc<ScanPipeline>, max_concurrent_scans: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent_scans.max(1))),
        }
    }

    /// Validate `url`, persist a queued scan and start it in the background.
    ///
    /// Returns as soon as the scan is recorded.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the scan cannot be stored.
    pub async fn submit(&self, url: &str) -> Result<ScanHandle> {
        let scan = Scan::new(url)?;
        self.pipeline.scans().insert_scan(&scan).await?;
        tracing::info!("Queued scan {} for {}", scan.id, scan.normalized_url);

        let id = scan.id.clone();
        let (status_tx, status_rx) = watch::channel(scan.status);
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);

        let task = tokio::spawn(async move {
            // The semaphore is never closed.
            let _permit = permits.acquire_owned().await.ok();
            let status_tx = Arc::new(status_tx);

            let mut fallback = scan.clone();
            let run = {
                let pipeline = Arc::clone(&pipeline);
                let status_tx = Arc::clone(&status_tx);
                tokio::spawn(async move { pipeline.run(scan, &status_tx).await })
            };
            match run.await {
                Ok(scan) => scan,
                Err(e) => {
                    let message = if e.is_panic() {
                        format!("scan task panicked: {}", panic_message(e.into_panic()))
                    } else {
                        e.to_string()
                    };
                    tracing::error!("Scan {} aborted: {}", fallback.id, message);
                    pipeline.record_failure(&mut fallback, &message).await;
                    status_tx.send_replace(fallback.status);
                    fallback
                }
            }
        });

        Ok(ScanHandle {
            id,
            status: status_rx,
            task,
        })
    }

    /// Pipelines that may start right now without waiting.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Handle to a submitted scan.
#[derive(Debug)]
pub struct ScanHandle {
    id: ScanId,
    status: watch::Receiver<ScanStatus>,
    task: JoinHandle<Scan>,
}

impl ScanHandle {
    /// Identifier of the scan.
    #[must_use]
    pub fn id(&self) -> &ScanId {
        &self.id
    }

    /// Latest published status.
    #[must_use]
    pub fn status(&self) -> ScanStatus {
        *self.status.borrow()
    }

    /// A receiver notified on every status change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanStatus> {
        self.status.clone()
    }

    /// Wait for the scan to reach a terminal state.
    ///
    /// A panicking pipeline yields the scan marked `failed`.
    ///
    /// # Errors
    /// Returns `ScanError::TaskFailed` if the scan task was aborted.
    pub async fn wait(self) -> Result<Scan> {
        self.task
            .await
            .map_err(|e| ScanError::TaskFailed(e.to_string()))
    }
}

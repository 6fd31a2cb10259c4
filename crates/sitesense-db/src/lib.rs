//! SiteSense Database Layer
//!
//! Provides `SQLite` persistence for scans, their ordered module results and
//! the binary files derived from them (screenshots, heatmap overlays and
//! Lighthouse reports). Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use sitesense_db::{Database, ScanStore};
//! use sitesense_core::Scan;
//!
//! let db = Database::new("sitesense.db").await?;
//! db.run_migrations().await?;
//! db.insert_scan(&Scan::new("example.com")?).await?;
//! ```
//!
//! # Design
//!
//! - Deleting a scan cascades to its module results and files
//! - Files are keyed by `(scan_id, file_type)`; saving twice replaces
//! - `:memory:` databases use a single pinned connection

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod files;
pub mod migrations;
pub mod module_results;
pub mod scans;
pub mod store;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use files::StoredFile;
pub use scans::ScanSummary;
pub use store::{ArtifactStore, ScanStore};

use async_trait::async_trait;
use sitesense_core::{FileRef, FileType, ModuleResult, Scan, ScanId};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Default prefix for file retrieval references.
pub const DEFAULT_FILE_URL_PREFIX: &str = "/files";

/// High-level database interface implementing both storage traits.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    file_url_prefix: String,
}

impl Database {
    /// Open (or create) the database at `path`, or `:memory:`.
    ///
    /// # Errors
    /// Returns `DatabaseError::Open` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            file_url_prefix: DEFAULT_FILE_URL_PREFIX.to_string(),
        }
    }

    /// Use `prefix` when building file retrieval references.
    #[must_use]
    pub fn with_file_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_url_prefix = prefix.into();
        self
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl ArtifactStore for Database {
    async fn save_file(
        &self,
        scan_id: &ScanId,
        file_type: FileType,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<FileRef> {
        files::upsert_file(&self.pool, scan_id, file_type, content_type, &data).await?;
        Ok(FileRef {
            file_type,
            content_type: content_type.to_string(),
            url: self.file_url(scan_id, file_type),
        })
    }

    async fn load_file(
        &self,
        scan_id: &ScanId,
        file_type: FileType,
    ) -> Result<Option<StoredFile>> {
        files::get_file(&self.pool, scan_id, file_type).await
    }

    fn file_url(&self, scan_id: &ScanId, file_type: FileType) -> String {
        store::file_url(&self.file_url_prefix, scan_id, file_type)
    }
}

#[async_trait]
impl ScanStore for Database {
    async fn insert_scan(&self, scan: &Scan) -> Result<()> {
        scans::insert_scan(&self.pool, scan).await
    }

    async fn update_scan(&self, scan: &Scan) -> Result<()> {
        scans::update_scan(&self.pool, scan).await
    }

    async fn replace_module_results(
        &self,
        scan_id: &ScanId,
        results: &[ModuleResult],
    ) -> Result<()> {
        module_results::replace_for_scan(&self.pool, scan_id, results).await
    }

    async fn get_scan(&self, scan_id: &ScanId) -> Result<Option<Scan>> {
        let Some(mut scan) = scans::get_scan(&self.pool, scan_id).await? else {
            return Ok(None);
        };

        scan.module_results = module_results::get_for_scan(&self.pool, scan_id).await?;
        scan.files = files::list_for_scan(&self.pool, scan_id)
            .await?
            .into_iter()
            .map(|(file_type, content_type)| FileRef {
                file_type,
                content_type,
                url: self.file_url(scan_id, file_type),
            })
            .collect();

        Ok(Some(scan))
    }

    async fn list_scans(&self, limit: i64) -> Result<Vec<ScanSummary>> {
        scans::list_scans(&self.pool, limit).await
    }

    async fn delete_scan(&self, scan_id: &ScanId) -> Result<bool> {
        let deleted = scans::delete_scan(&self.pool, scan_id).await?;
        if deleted {
            tracing::info!("Deleted scan {}", scan_id);
        }
        Ok(deleted)
    }

    async fn clear_scans(&self) -> Result<u64> {
        let removed = scans::clear_scans(&self.pool).await?;
        tracing::info!("Cleared {} scans", removed);
        Ok(removed)
    }
}

//! Storage traits consumed by the scan pipeline.
//!
//! The pipeline talks to storage only through these traits so tests can
//! substitute failing or recording stores.

use crate::error::Result;
use crate::files::StoredFile;
use crate::scans::ScanSummary;
use async_trait::async_trait;
use sitesense_core::{FileRef, FileType, ModuleResult, Scan, ScanId};

/// Persistence for binary files derived from a scan.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `data` as the `file_type` file of `scan_id` and return its reference.
    async fn save_file(
        &self,
        scan_id: &ScanId,
        file_type: FileType,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<FileRef>;

    /// Load a stored file.
    async fn load_file(&self, scan_id: &ScanId, file_type: FileType)
        -> Result<Option<StoredFile>>;

    /// Retrieval reference for a file, whether or not it exists yet.
    fn file_url(&self, scan_id: &ScanId, file_type: FileType) -> String;
}

/// Persistence for scans and their module results.
#[async_trait]
pub trait ScanStore: Send + Sync {
    /// Insert a newly created scan.
    async fn insert_scan(&self, scan: &Scan) -> Result<()>;

    /// Persist the lifecycle fields of `scan`.
    async fn update_scan(&self, scan: &Scan) -> Result<()>;

    /// Replace the stored module results of a scan.
    async fn replace_module_results(&self, scan_id: &ScanId, results: &[ModuleResult])
        -> Result<()>;

    /// Load a scan with its module results and file references.
    async fn get_scan(&self, scan_id: &ScanId) -> Result<Option<Scan>>;

    /// Most recent scans, newest first.
    async fn list_scans(&self, limit: i64) -> Result<Vec<ScanSummary>>;

    /// Delete a scan and everything stored for it.
    async fn delete_scan(&self, scan_id: &ScanId) -> Result<bool>;

    /// Delete every scan.
    async fn clear_scans(&self) -> Result<u64>;
}

/// Build the retrieval reference `{prefix}/{scan_id}/{file_type}`.
#[must_use]
pub fn file_url(prefix: &str, scan_id: &ScanId, file_type: FileType) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), scan_id, file_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url_format() {
        let id = ScanId::new("123e4567-e89b-42d3-a456-426614174000").expect("valid id");
        assert_eq!(
            file_url("/files", &id, FileType::AttentionHeatmap),
            "/files/123e4567-e89b-42d3-a456-426614174000/attention_heatmap"
        );
    }

    #[test]
    fn test_file_url_trims_trailing_slash() {
        let id = ScanId::new("123e4567-e89b-42d3-a456-426614174000").expect("valid id");
        assert_eq!(
            file_url("http://localhost:8000/files/", &id, FileType::Screenshot),
            "http://localhost:8000/files/123e4567-e89b-42d3-a456-426614174000/screenshot"
        );
    }
}

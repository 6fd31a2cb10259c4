//! Binary file storage.
//!
//! Screenshots, heatmap overlays and Lighthouse reports are stored as blobs
//! keyed by `(scan_id, file_type)`. Saving the same key twice replaces the
//! earlier bytes.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use sitesense_core::{FileType, ScanId};
use sqlx::{Pool, Row, Sqlite};

/// A stored file with its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Owning scan
    pub scan_id: ScanId,
    /// Kind of file
    pub file_type: FileType,
    /// MIME type
    pub content_type: String,
    /// Raw bytes
    pub data: Vec<u8>,
    /// When the file was written
    pub created_at: DateTime<Utc>,
}

/// Insert or replace the file of `file_type` for a scan.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the write fails, for example when the
/// scan does not exist.
pub async fn upsert_file(
    pool: &Pool<Sqlite>,
    scan_id: &ScanId,
    file_type: FileType,
    content_type: &str,
    data: &[u8],
) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        r"INSERT INTO files (scan_id, file_type, content_type, data, created_at)
          VALUES (?, ?, ?, ?, ?)
          ON CONFLICT(scan_id, file_type) DO UPDATE SET
            content_type = excluded.content_type,
            data = excluded.data,
            created_at = excluded.created_at",
    )
    .bind(scan_id.as_str())
    .bind(file_type.as_str())
    .bind(content_type)
    .bind(data)
    .bind(&created_at)
    .execute(pool)
    .await?;

    tracing::debug!(
        "Stored {} ({} bytes) for scan {}",
        file_type,
        data.len(),
        scan_id
    );
    Ok(())
}

/// Load a stored file.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or the row cannot be decoded.
pub async fn get_file(
    pool: &Pool<Sqlite>,
    scan_id: &ScanId,
    file_type: FileType,
) -> Result<Option<StoredFile>> {
    let row = sqlx::query(
        "SELECT content_type, data, created_at FROM files WHERE scan_id = ? AND file_type = ?",
    )
    .bind(scan_id.as_str())
    .bind(file_type.as_str())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(StoredFile {
        scan_id: scan_id.clone(),
        file_type,
        content_type: row.try_get("content_type")?,
        data: row.try_get("data")?,
        created_at: crate::scans::parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
    }))
}

/// List `(file_type, content_type)` pairs stored for a scan.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a file type is unknown.
pub async fn list_for_scan(
    pool: &Pool<Sqlite>,
    scan_id: &ScanId,
) -> Result<Vec<(FileType, String)>> {
    let rows =
        sqlx::query("SELECT file_type, content_type FROM files WHERE scan_id = ? ORDER BY id")
            .bind(scan_id.as_str())
            .fetch_all(pool)
            .await?;

    let mut files = Vec::with_capacity(rows.len());
    for row in rows {
        let file_type: String = row.try_get("file_type")?;
        let file_type = file_type.parse::<FileType>().map_err(|e| {
            DatabaseError::Decode(format!("Invalid file_type '{file_type}' in files table: {e}"))
        })?;
        files.push((file_type, row.try_get("content_type")?));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_pool;
    use crate::migrations::run_migrations;
    use crate::scans;
    use sitesense_core::Scan;

    async fn setup() -> (Pool<Sqlite>, Scan) {
        let pool = open_pool(":memory:").await.expect("open pool");
        run_migrations(&pool).await.expect("run migrations");
        let scan = Scan::new("https://example.com").expect("scan");
        scans::insert_scan(&pool, &scan).await.expect("insert scan");
        (pool, scan)
    }

    #[tokio::test]
    async fn test_upsert_and_get_file() {
        let (pool, scan) = setup().await;
        upsert_file(&pool, &scan.id, FileType::Screenshot, "image/png", &[1, 2, 3])
            .await
            .expect("upsert");

        let file = get_file(&pool, &scan.id, FileType::Screenshot)
            .await
            .expect("get")
            .expect("file exists");
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.data, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_bytes() {
        let (pool, scan) = setup().await;
        upsert_file(&pool, &scan.id, FileType::ClickHeatmap, "image/jpeg", &[1])
            .await
            .expect("first");
        upsert_file(&pool, &scan.id, FileType::ClickHeatmap, "image/jpeg", &[9, 9])
            .await
            .expect("second");

        let file = get_file(&pool, &scan.id, FileType::ClickHeatmap)
            .await
            .expect("get")
            .expect("file exists");
        assert_eq!(file.data, vec![9, 9]);
        assert_eq!(list_for_scan(&pool, &scan.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (pool, scan) = setup().await;
        let file = get_file(&pool, &scan.id, FileType::LighthouseReport)
            .await
            .expect("get");
        assert!(file.is_none());
    }

    #[tokio::test]
    async fn test_file_requires_scan() {
        let (pool, _scan) = setup().await;
        let result = upsert_file(
            &pool,
            &ScanId::generate(),
            FileType::Screenshot,
            "image/png",
            &[0],
        )
        .await;
        assert!(result.is_err());
    }
}

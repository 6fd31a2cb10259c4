//! Scan record operations.
//!
//! CRUD for the `scans` table. Module results and files hang off a scan by
//! foreign key and are removed with it.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sitesense_core::{Scan, ScanId, ScanStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};

/// Lightweight listing entry for a scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanSummary {
    /// Scan identifier
    pub id: ScanId,
    /// Normalised target URL
    pub url: String,
    /// Current status
    pub status: ScanStatus,
    /// Failure message, if any
    pub error_message: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Insert a new scan row.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the insert fails (including duplicate IDs).
pub async fn insert_scan(pool: &Pool<Sqlite>, scan: &Scan) -> Result<()> {
    sqlx::query(
        "INSERT INTO scans (id, url, normalized_url, status, error_message, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(scan.id.as_str())
    .bind(&scan.url)
    .bind(&scan.normalized_url)
    .bind(scan.status.as_str())
    .bind(&scan.error_message)
    .bind(scan.created_at.to_rfc3339())
    .bind(scan.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist the status, error message and update time of `scan`.
///
/// # Errors
/// Returns `DatabaseError::NotFoundWithMessage` if the scan row does not exist.
pub async fn update_scan(pool: &Pool<Sqlite>, scan: &Scan) -> Result<()> {
    let result =
        sqlx::query("UPDATE scans SET status = ?, error_message = ?, updated_at = ? WHERE id = ?")
            .bind(scan.status.as_str())
            .bind(&scan.error_message)
            .bind(scan.updated_at.to_rfc3339())
            .bind(scan.id.as_str())
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFoundWithMessage(format!(
            "Scan '{}' not found",
            scan.id
        )));
    }

    Ok(())
}

/// Load the scan row for `id` without module results or files.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored value cannot be decoded.
pub async fn get_scan(pool: &Pool<Sqlite>, id: &ScanId) -> Result<Option<Scan>> {
    let row = sqlx::query(
        "SELECT id, url, normalized_url, status, error_message, created_at, updated_at FROM scans WHERE id = ?",
    )
    .bind(id.as_str())
    .fetch_optional(pool)
    .await?;

    row.map(|row| scan_from_row(&row)).transpose()
}

/// List the most recent scans, newest first.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a stored value cannot be decoded.
pub async fn list_scans(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<ScanSummary>> {
    let rows = sqlx::query(
        "SELECT id, normalized_url, status, error_message, created_at FROM scans ORDER BY created_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for row in rows {
        summaries.push(ScanSummary {
            id: ScanId::new(row.try_get::<String, _>("id")?)?,
            url: row.try_get("normalized_url")?,
            status: parse_status(&row.try_get::<String, _>("status")?)?,
            error_message: row.try_get("error_message")?,
            created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        });
    }

    Ok(summaries)
}

/// Delete a scan and, by cascade, its module results and files.
///
/// Returns `true` if a row was deleted.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the delete fails.
pub async fn delete_scan(pool: &Pool<Sqlite>, id: &ScanId) -> Result<bool> {
    let result = sqlx::query("DELETE FROM scans WHERE id = ?")
        .bind(id.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every scan. Returns the number of scans removed.
///
/// # Errors
/// Returns `DatabaseError::Sqlx` if the delete fails.
pub async fn clear_scans(pool: &Pool<Sqlite>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM scans").execute(pool).await?;
    Ok(result.rows_affected())
}

fn scan_from_row(row: &SqliteRow) -> Result<Scan> {
    Ok(Scan {
        id: ScanId::new(row.try_get::<String, _>("id")?)?,
        url: row.try_get("url")?,
        normalized_url: row.try_get("normalized_url")?,
        status: parse_status(&row.try_get::<String, _>("status")?)?,
        error_message: row.try_get("error_message")?,
        created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
        updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        module_results: Vec::new(),
        files: Vec::new(),
    })
}

fn parse_status(value: &str) -> Result<ScanStatus> {
    value
        .parse::<ScanStatus>()
        .map_err(|e| DatabaseError::Decode(format!("Invalid status '{value}' in scans table: {e}")))
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Decode(format!("Invalid timestamp '{value}': {e}")))
}

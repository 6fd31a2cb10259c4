//! Module result operations.
//!
//! Results are stored with their position so a scan reads back in the order
//! it was produced.

use crate::error::{DatabaseError, Result};
use chrono::Utc;
use sitesense_core::{ModuleName, ModuleResult, ModuleStatus, ScanId};
use sqlx::{Pool, Row, Sqlite};

/// Replace all module results of a scan in a single transaction.
///
/// # Errors
/// Returns `DatabaseError` if serialisation or any statement fails; on error
/// the previous results are left untouched.
pub async fn replace_for_scan(
    pool: &Pool<Sqlite>,
    scan_id: &ScanId,
    results: &[ModuleResult],
) -> Result<()> {
    let created_at = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM module_results WHERE scan_id = ?")
        .bind(scan_id.as_str())
        .execute(&mut *tx)
        .await?;

    for (position, result) in results.iter().enumerate() {
        let payload = serde_json::to_string(&result.result_json)?;
        #[allow(clippy::cast_possible_wrap)]
        let position = position as i64;

        sqlx::query(
            "INSERT INTO module_results (scan_id, position, module_name, status, result_json, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(scan_id.as_str())
        .bind(position)
        .bind(result.module_name.as_str())
        .bind(result.status.as_str())
        .bind(payload)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    tracing::debug!("Stored {} module results for scan {}", results.len(), scan_id);
    Ok(())
}

/// Load the module results of a scan in stored order.
///
/// # Errors
/// Returns `DatabaseError` if the query fails or a row cannot be decoded.
pub async fn get_for_scan(pool: &Pool<Sqlite>, scan_id: &ScanId) -> Result<Vec<ModuleResult>> {
    let rows = sqlx::query(
        "SELECT module_name, status, result_json FROM module_results WHERE scan_id = ? ORDER BY position",
    )
    .bind(scan_id.as_str())
    .fetch_all(pool)
    .await?;

    let mut results = Vec::with_capacity(rows.len());
    for row in rows {
        let module_name: String = row.try_get("module_name")?;
        let status: String = row.try_get("status")?;
        let payload: String = row.try_get("result_json")?;

        results.push(ModuleResult {
            module_name: module_name.parse::<ModuleName>().map_err(|e| {
                DatabaseError::Decode(format!("Invalid module_name '{module_name}': {e}"))
            })?,
            status: status
                .parse::<ModuleStatus>()
                .map_err(|e| DatabaseError::Decode(format!("Invalid status '{status}': {e}")))?,
            result_json: serde_json::from_str(&payload)?,
        });
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::open_pool;
    use crate::migrations::run_migrations;
    use crate::scans;
    use serde_json::json;
    use sitesense_core::Scan;

    async fn setup() -> (Pool<Sqlite>, Scan) {
        let pool = open_pool(":memory:").await.expect("open pool");
        run_migrations(&pool).await.expect("run migrations");
        let scan = Scan::new("https://example.com").expect("scan");
        scans::insert_scan(&pool, &scan).await.expect("insert scan");
        (pool, scan)
    }

    #[tokio::test]
    async fn test_results_keep_order() {
        let (pool, scan) = setup().await;
        let results = vec![
            ModuleResult::completed(ModuleName::SecurityHygiene, json!({"score": 70})),
            ModuleResult::failed(ModuleName::Performance, "lighthouse not installed"),
            ModuleResult::skipped(ModuleName::ProxySecurity, json!({"status": "skipped"})),
        ];

        replace_for_scan(&pool, &scan.id, &results)
            .await
            .expect("store");
        let loaded = get_for_scan(&pool, &scan.id).await.expect("load");

        assert_eq!(loaded, results);
        assert_eq!(loaded[1].status, ModuleStatus::Failed);
    }

    #[tokio::test]
    async fn test_replace_overwrites_previous_results() {
        let (pool, scan) = setup().await;
        let first = vec![ModuleResult::completed(
            ModuleName::Accessibility,
            json!({"score": 90}),
        )];
        let second = vec![ModuleResult::completed(
            ModuleName::AnalyticsSeo,
            json!({"score": 55}),
        )];

        replace_for_scan(&pool, &scan.id, &first).await.expect("first");
        replace_for_scan(&pool, &scan.id, &second)
            .await
            .expect("second");

        let loaded = get_for_scan(&pool, &scan.id).await.expect("load");
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn test_results_removed_with_scan() {
        let (pool, scan) = setup().await;
        let results = vec![ModuleResult::completed(
            ModuleName::Heatmaps,
            json!({"elements": []}),
        )];
        replace_for_scan(&pool, &scan.id, &results)
            .await
            .expect("store");

        scans::delete_scan(&pool, &scan.id).await.expect("delete");
        let loaded = get_for_scan(&pool, &scan.id).await.expect("load");
        assert!(loaded.is_empty());
    }
}

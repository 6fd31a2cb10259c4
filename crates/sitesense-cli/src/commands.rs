//! Command handlers.

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sitesense_core::{AppConfig, FileType, ModuleStatus, Scan, ScanId};
use sitesense_db::{ArtifactStore, Database, ScanStore};
use sitesense_scanner::{ScanPipeline, ScanQueue};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DATABASE_FILE: &str = "sitesense.db";

/// Fill in the on-disk database location when none is configured.
///
/// The library falls back to an in-memory store; the CLI needs scans to
/// survive between invocations.
pub fn with_default_database(mut config: AppConfig) -> Result<AppConfig> {
    if config.storage.database_path.is_none() {
        let dir = AppConfig::data_dir().context("cannot determine data directory")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
        config.storage.database_path = Some(dir.join(DATABASE_FILE));
    }
    Ok(config)
}

/// Open the configured database and bring its schema up to date.
pub async fn open_database(config: &AppConfig) -> Result<Database> {
    let path: PathBuf = config
        .storage
        .database_path
        .clone()
        .context("no database path configured")?;
    tracing::debug!("Using scan database {}", path.display());

    let db = Database::new(&path)
        .await
        .with_context(|| format!("cannot open database {}", path.display()))?;
    db.run_migrations().await.context("database migration failed")?;
    Ok(db.with_file_url_prefix(config.storage.file_url_prefix.clone()))
}

pub async fn scan(config: &AppConfig, url: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let pipeline = ScanPipeline::from_config(config)
        .await
        .context("failed to set up scan pipeline")?;
    let queue = ScanQueue::new(Arc::new(pipeline), config.scanning.max_concurrent_scans);

    let handle = queue.submit(url).await?;
    let id = handle.id().clone();
    let mut updates = handle.subscribe();
    let progress = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let status = *updates.borrow_and_update();
            tracing::info!("Scan {} is {}", id, status);
        }
    });

    let scan = handle.wait().await?;
    // Ends once the pipeline drops its status sender.
    let _ = progress.await;

    print_scan(&scan, json, out)?;
    if let Some(message) = &scan.error_message {
        bail!("scan {} failed: {}", scan.id, message);
    }
    Ok(())
}

pub async fn list(store: &dyn ScanStore, limit: i64, out: &mut impl Write) -> Result<()> {
    let scans = store.list_scans(limit).await?;
    if scans.is_empty() {
        writeln!(out, "No scans recorded.")?;
        return Ok(());
    }
    for summary in scans {
        writeln!(
            out,
            "{}  {:<9}  {}  {}",
            summary.id,
            summary.status.as_str(),
            summary.created_at.format("%Y-%m-%d %H:%M:%S"),
            summary.url
        )?;
    }
    Ok(())
}

pub async fn show(store: &dyn ScanStore, id: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let id = ScanId::new(id)?;
    let Some(scan) = store.get_scan(&id).await? else {
        bail!("scan {id} not found");
    };
    print_scan(&scan, json, out)
}

pub async fn delete(store: &dyn ScanStore, id: &str, out: &mut impl Write) -> Result<()> {
    let id = ScanId::new(id)?;
    if !store.delete_scan(&id).await? {
        bail!("scan {id} not found");
    }
    writeln!(out, "Deleted scan {id}")?;
    Ok(())
}

pub async fn clear(store: &dyn ScanStore, out: &mut impl Write) -> Result<()> {
    let removed = store.clear_scans().await?;
    writeln!(out, "Deleted {removed} scans")?;
    Ok(())
}

pub async fn file(
    store: &dyn ArtifactStore,
    id: &str,
    file_type: &str,
    output: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let id = ScanId::new(id)?;
    let file_type: FileType = file_type.parse()?;
    let Some(stored) = store.load_file(&id, file_type).await? else {
        bail!("scan {id} has no {file_type}");
    };

    std::fs::write(output, &stored.data)
        .with_context(|| format!("cannot write {}", output.display()))?;
    writeln!(
        out,
        "Wrote {} ({}, {} bytes) to {}",
        file_type,
        stored.content_type,
        stored.data.len(),
        output.display()
    )?;
    Ok(())
}

pub fn config(config: &AppConfig, out: &mut impl Write) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("cannot serialize configuration")?;
    write!(out, "{rendered}")?;
    Ok(())
}

fn print_scan(scan: &Scan, json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(scan)?)?;
        return Ok(());
    }

    writeln!(out, "Scan {} of {}", scan.id, scan.normalized_url)?;
    writeln!(out, "Status: {}", scan.status)?;
    if let Some(message) = &scan.error_message {
        writeln!(out, "Error: {message}")?;
    }

    for result in &scan.module_results {
        if result.status == ModuleStatus::Failed {
            let error = result.result_json["error"].as_str().unwrap_or("unknown error");
            writeln!(
                out,
                "  {:<18} {} ({})",
                result.module_name.as_str(),
                result.status,
                error
            )?;
        } else {
            writeln!(out, "  {:<18} {}", result.module_name.as_str(), result.status)?;
        }
    }

    if let Some(report) = scan.report() {
        print_report(&report.result_json, out)?;
    }

    for file in &scan.files {
        writeln!(out, "File {}: {}", file.file_type, file.url)?;
    }
    Ok(())
}

fn print_report(report: &Value, out: &mut impl Write) -> Result<()> {
    if let Some(summary) = report["summary"].as_str() {
        writeln!(out, "{summary}")?;
    }
    if let Some(scores) = report["category_scores"].as_object() {
        for (category, score) in scores {
            writeln!(out, "  {category:<14} {}", score.as_f64().unwrap_or(0.0).round())?;
        }
    }
    if let Some(recommendations) = report["recommendations"].as_array() {
        if !recommendations.is_empty() {
            writeln!(out, "Recommendations:")?;
        }
        for rec in recommendations {
            writeln!(
                out,
                "  [{}] {}: {}",
                rec["impact"].as_str().unwrap_or_default(),
                rec["category"].as_str().unwrap_or_default(),
                rec["text"].as_str().unwrap_or_default()
            )?;
        }
    }
    Ok(())
}

//! SiteSense command-line entry point.

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use sitesense_core::AppConfig;
use std::io::{self, Write};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sitesense=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config =
        AppConfig::load_with_env(cli.config.as_deref()).context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Commands::Config = cli.command {
        return commands::config(&config, &mut out);
    }

    let config = commands::with_default_database(config)?;
    match cli.command {
        Commands::Scan { url, json } => commands::scan(&config, &url, json, &mut out).await?,
        Commands::List { limit } => {
            let db = commands::open_database(&config).await?;
            commands::list(&db, limit, &mut out).await?;
        }
        Commands::Show { id, json } => {
            let db = commands::open_database(&config).await?;
            commands::show(&db, &id, json, &mut out).await?;
        }
        Commands::Delete { id } => {
            let db = commands::open_database(&config).await?;
            commands::delete(&db, &id, &mut out).await?;
        }
        Commands::Clear => {
            let db = commands::open_database(&config).await?;
            commands::clear(&db, &mut out).await?;
        }
        Commands::File {
            id,
            file_type,
            output,
        } => {
            let db = commands::open_database(&config).await?;
            commands::file(&db, &id, &file_type, &output, &mut out).await?;
        }
        Commands::Config => {}
    }

    out.flush()?;
    Ok(())
}

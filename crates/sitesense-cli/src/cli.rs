use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sitesense")]
#[command(about = "Composite security, SEO, accessibility and performance scanner", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "SITESENSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a page and print its report
    Scan {
        /// Target URL; `https://` is assumed when no scheme is given
        url: String,

        /// Print the full scan as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the most recent scans
    List {
        /// Maximum number of scans to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: i64,
    },

    /// Show a stored scan with its module results
    Show {
        /// Scan identifier
        id: String,

        /// Print the full scan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored scan and its files
    Delete {
        /// Scan identifier
        id: String,
    },

    /// Delete every stored scan
    Clear,

    /// Write a stored file to disk
    File {
        /// Scan identifier
        id: String,

        /// screenshot, attention_heatmap, click_heatmap or lighthouse_report
        file_type: String,

        /// Destination path
        output: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config,
}

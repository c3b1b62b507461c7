//! Command-line interface definitions.
//!
//! Every option can also come from the environment; file-level settings live
//! in the optional YAML config (see [`crate::config`]).

use crate::models::SourceKind;
use clap::Parser;
use std::path::PathBuf;

/// Collect customer reviews for a company from a review site.
///
/// # Examples
///
/// ```sh
/// review_scraper --company Slack --start 2024-01-01 --end 2024-12-31 --source g2
///
/// # Visible browser, custom output directory
/// review_scraper --company "Acme Corp" --start 2024-01-01 --end 2024-03-31 \
///     --source trustradius --headful -o ./reviews
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Company name (e.g. "Slack")
    #[arg(long)]
    pub company: String,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD); future dates are clamped to today
    #[arg(long)]
    pub end: String,

    /// Review source: g2, capterra or trustradius
    #[arg(long)]
    pub source: SourceKind,

    /// Output directory for the JSON file (overrides the config file)
    #[arg(short, long, env = "REVIEW_SCRAPER_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Optional path to a config.yaml file
    #[arg(short, long, env = "REVIEW_SCRAPER_CONFIG")]
    pub config: Option<String>,

    /// Path to the Chrome/Chromium binary
    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,
}

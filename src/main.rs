//! # Review Scraper
//!
//! Collects customer reviews of a company's product from G2, Capterra or
//! TrustRadius through a real browser session, keeps the ones published in a
//! requested date window and writes them to a JSON file.
//!
//! ## Usage
//!
//! ```sh
//! review_scraper --company Slack --start 2024-01-01 --end 2024-06-30 --source g2
//! ```
//!
//! ## Architecture
//!
//! 1. **Validation**: company name and date window are checked up front
//! 2. **Discovery**: the source adapter finds the product's review listing
//! 3. **Pagination**: pages are walked until the listing or the window runs out
//! 4. **Output**: records are sorted newest first and saved as JSON

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browser;
mod cli;
mod config;
mod dates;
mod engine;
mod error;
mod models;
mod outputs;
mod pagination;
mod scrapers;
mod utils;

use browser::ChromeSession;
use cli::Cli;
use engine::ExtractionEngine;
use outputs::json;
use utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("review_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Config, with CLI overrides ----
    let mut config = config::load_config(args.config.as_deref()).await?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.chrome_path.is_some() {
        config.chrome_path = args.chrome_path.clone();
    }
    if args.headful {
        config.headless = false;
    }

    let range = match dates::validate_inputs(&args.company, &args.start, &args.end, dates::today())
    {
        Ok(range) => range,
        Err(e) => {
            error!(error = %e, "Invalid input");
            return Err(e.into());
        }
    };
    let company = args.company.trim();
    info!(
        company,
        source = %args.source,
        start = %range.start(),
        end = %range.end(),
        "Input validated"
    );

    // Early check: a long scrape should not end with nowhere to save
    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    // ---- Scrape; the browser is released when the session drops ----
    let outcome = {
        let session = ChromeSession::launch(&config)?;
        let engine = ExtractionEngine::new(&session, &config);
        engine::until_interrupted(
            engine.run(args.source, company, &range),
            tokio::signal::ctrl_c(),
        )
        .await
    };

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Scraping failed");
            return Err(e.into());
        }
    };

    // ---- Output ----
    let saved = json::write_reviews(&outcome.records, company, outcome.source, &config.output_dir)
        .await?;

    info!(
        company = %outcome.company,
        source = %outcome.source,
        start = %outcome.range.start(),
        end = %outcome.range.end(),
        total = outcome.records.len(),
        pages = outcome.pages_visited,
        reason = %outcome.termination,
        path = ?saved,
        "Scraping summary"
    );

    if let Some(first) = outcome.records.first() {
        info!(
            title = %first.title(),
            date = first.raw_date().unwrap_or(""),
            rating = %first.rating(),
            reviewer = %first.reviewer(),
            job_title = %first.job_title(),
            company_size = first.company_size().unwrap_or("n/a"),
            source = %first.source(),
            description = %truncate_for_log(first.description(), 200),
            "Sample review"
        );
    } else {
        warn!("No reviews found in the requested date range");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

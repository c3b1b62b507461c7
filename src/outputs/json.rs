//! JSON persistence of extraction results.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! └── Acme_Corp_g2_reviews_20250506_142501.json
//! ```
//!
//! Each file is a pretty-printed array of review records in the order the
//! engine returned them (newest first).

use crate::error::ScrapeError;
use crate::models::{ReviewRecord, SourceKind};
use crate::utils::safe_file_stem;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument, warn};

/// File name for a result set, e.g. `Acme_Corp_g2_reviews_20250506_142501.json`.
pub fn output_filename(company: &str, source: SourceKind, at: DateTime<Local>) -> String {
    format!(
        "{}_{}_reviews_{}.json",
        safe_file_stem(company),
        source,
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Write `reviews` to a new JSON file under `output_dir`.
///
/// # Arguments
///
/// * `reviews` - Records in the order they should appear in the file
/// * `company` - Company name, sanitized into the file name
/// * `source` - Site the reviews came from
/// * `output_dir` - Directory to create (if needed) and write into
///
/// # Returns
///
/// The written path, or `None` when there was nothing to write.
///
/// # Output Path
///
/// `{output_dir}/{company}_{source}_reviews_{YYYYMMDD_HHMMSS}.json`
#[instrument(level = "info", skip(reviews), fields(count = reviews.len()))]
pub async fn write_reviews(
    reviews: &[ReviewRecord],
    company: &str,
    source: SourceKind,
    output_dir: &str,
) -> Result<Option<PathBuf>, ScrapeError> {
    if reviews.is_empty() {
        warn!("No reviews to save");
        return Ok(None);
    }

    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(%output_dir, error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let json = serde_json::to_string_pretty(reviews)?;
    let path = Path::new(output_dir).join(output_filename(company, source, Local::now()));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Reviews saved");

    Ok(Some(path))
}

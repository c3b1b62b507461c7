//! Date handling: per-source parsing, range membership and input validation.
//!
//! Each review site prints dates its own way. [`parse_review_date`] tries the
//! source's native format first and then a shared list of numeric fallbacks.
//! A failed parse is never fatal: it logs a warning and yields `None`.

use crate::error::ScrapeError;
use crate::models::SourceKind;
use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// `"Sep 15, 2025"` style, optional comma.
static MONTH_DAY_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}$").unwrap());

/// `"Sep 2025"` style (G2 sometimes omits the day).
static MONTH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{3,9}\.?\s+\d{4}$").unwrap());

/// Numeric formats tried, in order, after the source's own format fails.
const FALLBACK_FORMATS: [&str; 3] = ["%m/%d/%Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Input date format for `--start` / `--end`.
pub const INPUT_FORMAT: &str = "%Y-%m-%d";

/// An inclusive calendar interval with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Build a range, clamping `end` to `today` when it lies in the future.
    ///
    /// Fails when `start` is after the (clamped) end.
    pub fn new(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<Self, ScrapeError> {
        if start > end {
            return Err(ScrapeError::InputValidation(vec![
                "Start date must be before or equal to end date".to_string(),
            ]));
        }
        let end = if end > today {
            warn!(requested = %end, %today, "End date adjusted to today");
            today
        } else {
            end
        };
        if start > end {
            return Err(ScrapeError::InputValidation(vec![
                "Start date cannot be in the future".to_string(),
            ]));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// True when `date` falls inside the range; `None` is never inside.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        in_range(date, self)
    }
}

/// Inclusive range membership. Undated values are never in range.
pub fn in_range(date: Option<NaiveDate>, range: &DateRange) -> bool {
    match date {
        Some(d) => range.start <= d && d <= range.end,
        None => false,
    }
}

/// Parse a source-native date string into a calendar date.
///
/// Tries the source's canonical formats, then `M/D/YYYY`, `D/M/YYYY` and
/// `YYYY-MM-DD`.
///
/// # Arguments
///
/// * `raw` - Date text as displayed or embedded by the site
/// * `source` - Site the text came from; selects the native formats
///
/// # Returns
///
/// The calendar date, or `None` (with a warning) when nothing matches.
pub fn parse_review_date(raw: &str, source: SourceKind) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let parsed = parse_native(raw, source).or_else(|| {
        FALLBACK_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
    });

    if parsed.is_none() {
        warn!(%source, date = %raw, "Could not parse review date");
    }
    parsed
}

fn parse_native(raw: &str, source: SourceKind) -> Option<NaiveDate> {
    // "Sep." and "Sep" are the same month.
    let normalized = raw.replace('.', "");
    match source {
        SourceKind::G2 => {
            if MONTH_DAY_YEAR.is_match(raw) {
                parse_month_day_year(&normalized, "%b %d %Y")
            } else if MONTH_YEAR.is_match(raw) {
                NaiveDate::parse_from_str(&format!("1 {normalized}"), "%d %b %Y").ok()
            } else {
                None
            }
        }
        SourceKind::Capterra => parse_month_day_year(&normalized, "%B %d %Y"),
        // TrustRadius shows abbreviated months but full names occur too.
        SourceKind::TrustRadius => parse_month_day_year(&normalized, "%b %d %Y")
            .or_else(|| parse_month_day_year(&normalized, "%B %d %Y")),
    }
}

fn parse_month_day_year(raw: &str, fmt: &str) -> Option<NaiveDate> {
    let without_comma = raw.replace(',', " ");
    let collapsed = without_comma.split_whitespace().collect::<Vec<_>>().join(" ");
    NaiveDate::parse_from_str(&collapsed, fmt).ok()
}

/// Validate user input and build the effective range.
///
/// Every problem is collected before failing so the user sees them all at
/// once.
///
/// # Arguments
///
/// * `company` - Company name; must not be blank
/// * `start`, `end` - Inclusive bounds in `YYYY-MM-DD`
/// * `today` - Reference date for clamping a future end date
///
/// # Returns
///
/// The effective [`DateRange`], or [`ScrapeError::InputValidation`] listing
/// every problem found.
pub fn validate_inputs(
    company: &str,
    start: &str,
    end: &str,
    today: NaiveDate,
) -> Result<DateRange, ScrapeError> {
    let mut errors = Vec::new();

    if company.trim().is_empty() {
        errors.push("Company name cannot be empty".to_string());
    }

    let start = NaiveDate::parse_from_str(start.trim(), INPUT_FORMAT);
    let end = NaiveDate::parse_from_str(end.trim(), INPUT_FORMAT);

    let range = match (start, end) {
        (Ok(start), Ok(end)) => match DateRange::new(start, end, today) {
            Ok(range) => Some(range),
            Err(ScrapeError::InputValidation(mut problems)) => {
                errors.append(&mut problems);
                None
            }
            Err(other) => return Err(other),
        },
        _ => {
            errors.push("Dates must be in YYYY-MM-DD format".to_string());
            None
        }
    };

    match range {
        Some(range) if errors.is_empty() => Ok(range),
        _ => Err(ScrapeError::InputValidation(errors)),
    }
}

/// Today's date in the local timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

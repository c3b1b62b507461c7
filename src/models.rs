//! Data models shared by every review source.
//!
//! - [`SourceKind`]: which review site a record came from
//! - [`RawReview`]: the loosely-typed fields an adapter pulls out of a fragment
//! - [`ReviewRecord`]: the normalized, immutable output unit
//! - [`TerminationReason`] / [`ScrapeOutcome`]: how a run ended and what it produced

use crate::dates::{DateRange, parse_review_date};
use crate::error::ScrapeError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Title used when a fragment carries none.
pub const DEFAULT_TITLE: &str = "No title";

/// Reviewer used when a fragment carries none.
pub const DEFAULT_REVIEWER: &str = "Anonymous";

/// The review sites this tool knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    G2,
    Capterra,
    TrustRadius,
}

impl SourceKind {
    /// Lowercase identifier used on the command line and in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::G2 => "g2",
            SourceKind::Capterra => "capterra",
            SourceKind::TrustRadius => "trustradius",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "g2" => Ok(SourceKind::G2),
            "capterra" => Ok(SourceKind::Capterra),
            "trustradius" => Ok(SourceKind::TrustRadius),
            other => Err(ScrapeError::UnsupportedSource(other.to_string())),
        }
    }
}

/// Fields as found in a review fragment, before defaults are applied.
///
/// Adapters fill in whatever they can locate; [`ReviewRecord::new`] turns
/// this into the normalized record.
#[derive(Debug, Default, Clone)]
pub struct RawReview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub rating: Option<String>,
    pub reviewer: Option<String>,
    pub job_title: Option<String>,
    pub company_size: Option<String>,
}

/// A normalized customer review.
///
/// Serialized as a flat record:
/// `title, description, date, parsed_date, rating, reviewer, job_title,
/// company_size (when the source exposes it), source`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    title: String,
    description: String,
    #[serde(rename = "date")]
    raw_date: Option<String>,
    parsed_date: Option<NaiveDate>,
    rating: String,
    reviewer: String,
    job_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_size: Option<String>,
    source: SourceKind,
}

impl ReviewRecord {
    /// Build a record for `source`, applying defaults and parsing the date.
    ///
    /// Empty strings count as absent. The rating is kept only if it reads as
    /// a number; anything else becomes empty.
    pub fn new(source: SourceKind, raw: RawReview) -> Self {
        let raw_date = non_empty(raw.date);
        let parsed_date = raw_date
            .as_deref()
            .and_then(|d| parse_review_date(d, source));

        let rating = non_empty(raw.rating)
            .filter(|r| {
                let numeric = r.parse::<f64>().is_ok();
                if !numeric {
                    tracing::debug!(%source, rating = %r, "Discarding non-numeric rating");
                }
                numeric
            })
            .unwrap_or_default();

        Self {
            title: non_empty(raw.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            description: non_empty(raw.description).unwrap_or_default(),
            raw_date,
            parsed_date,
            rating,
            reviewer: non_empty(raw.reviewer).unwrap_or_else(|| DEFAULT_REVIEWER.to_string()),
            job_title: non_empty(raw.job_title).unwrap_or_default(),
            company_size: raw.company_size.map(|s| s.trim().to_string()),
            source,
        }
    }

    /// Whether the record carries any real content.
    ///
    /// Records with the default title, no description and no rating are
    /// placeholders and are never collected.
    pub fn is_substantive(&self) -> bool {
        self.title != DEFAULT_TITLE || !self.description.is_empty() || !self.rating.is_empty()
    }

    /// Key used to order results: the ISO date, or `""` when undated.
    pub fn sort_key(&self) -> String {
        self.parsed_date.map(|d| d.to_string()).unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn raw_date(&self) -> Option<&str> {
        self.raw_date.as_deref()
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.parsed_date
    }

    pub fn rating(&self) -> &str {
        &self.rating
    }

    pub fn reviewer(&self) -> &str {
        &self.reviewer
    }

    pub fn job_title(&self) -> &str {
        &self.job_title
    }

    pub fn company_size(&self) -> Option<&str> {
        self.company_size.as_deref()
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Why a pagination run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    /// A page loaded but contained no review fragments.
    NoElements,
    /// No displayed "Next" control was found.
    NoNextControl,
    /// The review container never appeared within the bounded wait.
    Timeout,
    /// The adapter decided no later page can hold in-range reviews.
    ExhaustedByDate,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TerminationReason::NoElements => "no-elements",
            TerminationReason::NoNextControl => "no-next-control",
            TerminationReason::Timeout => "timeout",
            TerminationReason::ExhaustedByDate => "exhausted-by-date",
        };
        f.write_str(s)
    }
}

/// Everything one extraction run produced.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub source: SourceKind,
    pub company: String,
    pub range: DateRange,
    /// Records sorted newest first.
    pub records: Vec<ReviewRecord>,
    pub termination: TerminationReason,
    pub pages_visited: u32,
}

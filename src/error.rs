//! Error taxonomy for review extraction.
//!
//! Only [`ScrapeError`] ever crosses a run boundary. Per-fragment problems are
//! described by [`FragmentError`], which adapters log and swallow so a single
//! malformed review never aborts a page.

use crate::models::SourceKind;
use thiserror::Error;

/// Failures that end (or prevent) an extraction run.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Bad user input; reported before any browser work starts.
    #[error("invalid input:\n{}", .0.join("\n"))]
    InputValidation(Vec<String>),

    /// Discovery could not find a product link within the bounded wait.
    #[error("could not find '{company}' on {site}; check the company name spelling")]
    ProductNotFound { company: String, site: SourceKind },

    /// The browser session failed to navigate, read or interact with a page.
    #[error("browser transport failed: {0}")]
    Transport(String),

    /// The user stopped the run (Ctrl-C) before it finished.
    #[error("interrupted by user")]
    Interrupted,

    /// A source name that no adapter handles.
    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    /// The configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}

impl ScrapeError {
    /// Wrap any displayable browser-layer failure as a transport error.
    pub fn transport(e: impl std::fmt::Display) -> Self {
        ScrapeError::Transport(e.to_string())
    }
}

/// A single review fragment whose markup does not have the expected shape.
#[derive(Error, Debug, PartialEq)]
pub enum FragmentError {
    /// The fragment has no element matching the adapter's review root.
    #[error("fragment has no review root matching `{0}`")]
    MissingRoot(&'static str),

    /// The fragment carried no markup at all.
    #[error("fragment is empty")]
    Empty,
}

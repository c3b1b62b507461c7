//! Top-level orchestration of one extraction run.
//!
//! The engine picks the adapter for the requested source once, asks it to
//! discover the product, lets the [`PaginationController`] walk the listing
//! and returns the collected reviews newest first.

use crate::browser::BrowserSession;
use crate::config::ScraperConfig;
use crate::dates::DateRange;
use crate::error::ScrapeError;
use crate::models::{ScrapeOutcome, SourceKind};
use crate::pagination::{PaginationController, PaginationState};
use crate::scrapers::ReviewSource;
use crate::scrapers::capterra::CapterraAdapter;
use crate::scrapers::g2::G2Adapter;
use crate::scrapers::trustradius::TrustRadiusAdapter;
use itertools::Itertools;
use std::future::Future;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Runs extractions through a borrowed browser session.
///
/// The caller owns the session and keeps it alive for the whole run.
pub struct ExtractionEngine<'a, S> {
    session: &'a S,
    config: &'a ScraperConfig,
}

impl<'a, S: BrowserSession> ExtractionEngine<'a, S> {
    pub fn new(session: &'a S, config: &'a ScraperConfig) -> Self {
        Self { session, config }
    }

    /// Collect reviews of `company` on `source` dated within `range`.
    ///
    /// Records are sorted descending by parsed date. Undated records sort
    /// last, in the order they were extracted.
    #[instrument(
        level = "info",
        skip(self, range),
        fields(start = %range.start(), end = %range.end())
    )]
    pub async fn run(
        &self,
        source: SourceKind,
        company: &str,
        range: &DateRange,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let company = company.trim();
        if company.is_empty() {
            return Err(ScrapeError::InputValidation(vec![
                "Company name cannot be empty".to_string(),
            ]));
        }

        match source {
            SourceKind::G2 => self.run_with(&G2Adapter, company, range).await,
            SourceKind::Capterra => self.run_with(&CapterraAdapter, company, range).await,
            SourceKind::TrustRadius => self.run_with(&TrustRadiusAdapter, company, range).await,
        }
    }

    async fn run_with<A: ReviewSource>(
        &self,
        adapter: &A,
        company: &str,
        range: &DateRange,
    ) -> Result<ScrapeOutcome, ScrapeError> {
        let t0 = Instant::now();
        let source = adapter.kind();

        let product_url = match adapter
            .discover_product(self.session, company, self.config)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!(%source, company, error = %e, "Product discovery failed");
                return Err(e);
            }
        };

        let mut state = PaginationState::new();
        let termination = PaginationController::new(self.session, self.config)
            .drive(adapter, &product_url, range, &mut state)
            .await?;

        let records = state
            .collected
            .into_iter()
            .sorted_by(|a, b| b.sort_key().cmp(&a.sort_key()))
            .collect::<Vec<_>>();

        info!(
            %source,
            company,
            count = records.len(),
            pages = state.page_index,
            reason = %termination,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Scraping complete"
        );

        Ok(ScrapeOutcome {
            source,
            company: company.to_string(),
            range: *range,
            records,
            termination,
            pages_visited: state.page_index,
        })
    }
}

/// Race a run against an interrupt signal such as `tokio::signal::ctrl_c()`.
///
/// The losing future is dropped, which releases anything it borrowed.
///
/// # Returns
///
/// The run's own result, or [`ScrapeError::Interrupted`] when the signal
/// fires first.
pub async fn until_interrupted<T, R, I>(run: R, interrupt: I) -> Result<T, ScrapeError>
where
    R: Future<Output = Result<T, ScrapeError>>,
    I: Future,
{
    tokio::select! {
        res = run => res,
        _ = interrupt => {
            warn!("Scraping interrupted by user");
            Err(ScrapeError::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::FakeSession;
    use crate::models::TerminationReason;
    use crate::scrapers::g2::fixtures::{card, page, search_page};
    use chrono::NaiveDate;

    const SEARCH: &str = "https://www.g2.com/search?query=Acme";
    const PRODUCT: &str = "https://www.g2.com/products/acme/reviews";
    const PAGE_2: &str = "https://www.g2.com/products/acme/reviews?page=2";

    fn range_2024() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_acme_g2_two_pages_sorted_newest_first() {
        let first = page(
            &[
                card("a", "2024-03-10"),
                card("b", "2024-11-02"),
                card("c", "2024-07-19"),
                card("d", "2024-01-05"),
                card("e", "2024-09-30"),
            ],
            true,
        );
        let second = page(
            &[card("f", "2024-05-05"), card("g", "2024-12-24"), card("h", "2024-02-14")],
            false,
        );
        let session = FakeSession::new()
            .with_page(SEARCH, &search_page("/products/acme/reviews"))
            .with_page(PRODUCT, &first)
            .with_page(PAGE_2, &second)
            .with_transition(PRODUCT, PAGE_2);
        let config = ScraperConfig::instant();

        let outcome = ExtractionEngine::new(&session, &config)
            .run(SourceKind::G2, "Acme", &range_2024())
            .await
            .unwrap();

        assert_eq!(outcome.termination, TerminationReason::NoNextControl);
        assert_eq!(outcome.pages_visited, 2);
        assert_eq!(outcome.records.len(), 8);
        let dates: Vec<String> = outcome.records.iter().map(|r| r.sort_key()).collect();
        let mut expected = dates.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, expected);
        assert_eq!(dates[0], "2024-12-24");
        assert!(outcome.records.iter().all(|r| r.source() == SourceKind::G2));
    }

    #[tokio::test]
    async fn test_undated_records_sort_last() {
        let listing = page(
            &[card("undated", "soon"), card("old", "2024-01-02"), card("new", "2024-06-01")],
            false,
        );
        let session = FakeSession::new()
            .with_page(SEARCH, &search_page("/products/acme/reviews"))
            .with_page(PRODUCT, &listing);
        let config = ScraperConfig::instant();

        let outcome = ExtractionEngine::new(&session, &config)
            .run(SourceKind::G2, "Acme", &range_2024())
            .await
            .unwrap();

        let titles: Vec<&str> = outcome.records.iter().map(|r| r.title()).collect();
        assert_eq!(titles, vec!["\"new\"", "\"old\"", "\"undated\""]);
    }

    #[tokio::test]
    async fn test_missing_product_fails_with_no_records() {
        let session = FakeSession::new().with_page(SEARCH, "<html><body>No matches</body></html>");
        let config = ScraperConfig::instant();

        let err = ExtractionEngine::new(&session, &config)
            .run(SourceKind::G2, "Acme", &range_2024())
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("Acme"));
        assert!(msg.contains("g2"));
        // Discovery never reached a product page.
        assert_eq!(session.navigations.borrow().as_slice(), &[SEARCH.to_string()]);
    }

    #[tokio::test]
    async fn test_empty_company_is_rejected_before_browsing() {
        let session = FakeSession::new();
        let config = ScraperConfig::instant();
        let err = ExtractionEngine::new(&session, &config)
            .run(SourceKind::TrustRadius, "   ", &range_2024())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InputValidation(_)));
        assert!(session.navigations.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_ends_run_with_error() {
        let session = FakeSession::new().with_page(PRODUCT, "<html></html>");
        let config = ScraperConfig::instant();
        let engine = ExtractionEngine::new(&session, &config);

        let err = until_interrupted(
            async {
                std::future::pending::<()>().await;
                engine.run(SourceKind::G2, "Acme", &range_2024()).await
            },
            async {},
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::Interrupted));
    }

    #[tokio::test]
    async fn test_uninterrupted_run_returns_its_result() {
        let err = until_interrupted(
            async { Err::<(), _>(ScrapeError::Transport("gone".to_string())) },
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)));
    }
}

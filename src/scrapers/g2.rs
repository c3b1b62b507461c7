//! G2 review adapter.
//!
//! Review cards are located by their `data-poison` attribute rather than by
//! class names, which G2 regenerates often. Rating, date, title and body come
//! from schema.org microdata inside each card.
//!
//! Reviewer details are rendered as a run of identically styled labels, so the
//! job title and company size can only be told apart by position: the first
//! label is the job title, the third is the company size.

use super::{
    DatePolicy, NavigationAction, ReviewFragment, ReviewSource, attr_of, discover_via_search_link,
    displayed_control, nth_text, parse_root, search_url, selector, split_fragments, text_of,
};
use crate::browser::{BrowserSession, ElementTarget};
use crate::config::ScraperConfig;
use crate::error::{FragmentError, ScrapeError};
use crate::models::{RawReview, ReviewRecord, SourceKind};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

const BASE_URL: &str = "https://www.g2.com";
const SEARCH_URL: &str = "https://www.g2.com/search?query={query}";
const PRODUCT_LINK: &str = "a[href*='/products/'][href*='/reviews']";

const ROOT_CSS: &str = "div[data-poison]";
const NEXT_CSS: &str = "ul.pagination a";

/// Index of the company-size label among the reviewer labels.
const COMPANY_SIZE_POSITION: usize = 2;

static ROOT: Lazy<Selector> = Lazy::new(|| selector(ROOT_CSS));
static REVIEWER: Lazy<Selector> =
    Lazy::new(|| selector("div[itemprop='author'] meta[itemprop='name']"));
static REVIEWER_LABEL: Lazy<Selector> =
    Lazy::new(|| selector("div.elv-text-xs.elv-font-regular"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("meta[itemprop='datePublished']"));
static RATING: Lazy<Selector> =
    Lazy::new(|| selector("span[itemprop='reviewRating'] meta[itemprop='ratingValue']"));
static ANY_RATING: Lazy<Selector> = Lazy::new(|| selector("meta[itemprop='ratingValue']"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("div[itemprop='name']"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("div[itemprop='reviewBody']"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector(NEXT_CSS));

#[derive(Debug, Default, Clone, Copy)]
pub struct G2Adapter;

impl ReviewSource for G2Adapter {
    fn kind(&self) -> SourceKind {
        SourceKind::G2
    }

    fn review_container(&self) -> &'static str {
        ROOT_CSS
    }

    fn date_policy(&self) -> DatePolicy {
        DatePolicy::StopPageAtFirstOutOfRange
    }

    #[instrument(level = "info", skip(self, session, config))]
    async fn discover_product<S: BrowserSession>(
        &self,
        session: &S,
        company: &str,
        config: &ScraperConfig,
    ) -> Result<Url, ScrapeError> {
        discover_via_search_link(
            session,
            self.kind(),
            company,
            &search_url(SEARCH_URL, company),
            PRODUCT_LINK,
            BASE_URL,
            config,
        )
        .await
    }

    fn fetch_page(&self, content: &str) -> Vec<ReviewFragment> {
        split_fragments(content, &ROOT)
    }

    fn parse_fragment(&self, fragment: &ReviewFragment) -> Result<ReviewRecord, FragmentError> {
        let document = parse_root(fragment, &ROOT, ROOT_CSS)?;
        let card = document
            .select(&ROOT)
            .next()
            .ok_or(FragmentError::MissingRoot(ROOT_CSS))?;

        let rating =
            attr_of(card, &RATING, "content").or_else(|| attr_of(card, &ANY_RATING, "content"));
        let company_size =
            nth_text(card, &REVIEWER_LABEL, COMPANY_SIZE_POSITION).unwrap_or_default();

        let raw = RawReview {
            title: text_of(card, &TITLE),
            description: text_of(card, &BODY),
            date: attr_of(card, &DATE, "content"),
            rating,
            reviewer: attr_of(card, &REVIEWER, "content"),
            job_title: text_of(card, &REVIEWER_LABEL),
            company_size: Some(company_size),
        };
        Ok(ReviewRecord::new(self.kind(), raw))
    }

    fn has_next_page(&self, content: &str) -> Option<NavigationAction> {
        let document = Html::parse_document(content);
        displayed_control(&document, &NEXT, Some("Next")).map(|_| NavigationAction {
            label: "Next",
            target: ElementTarget::css_with_text(NEXT_CSS, "Next"),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{card, page, search_page};
    use super::*;
    use crate::browser::fake::FakeSession;
    use chrono::NaiveDate;

    #[test]
    fn test_fetch_page_finds_cards_by_data_attribute() {
        let content = page(&[card("A", "2024-01-02"), card("B", "2024-01-03")], false);
        let fragments = G2Adapter.fetch_page(&content);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[1].index, 1);
    }

    #[test]
    fn test_fetch_page_empty_listing() {
        assert!(G2Adapter.fetch_page("<html><body><p>No reviews</p></body></html>").is_empty());
    }

    #[test]
    fn test_extract_one_reads_microdata_and_positional_labels() {
        let fragments = G2Adapter.fetch_page(&page(&[card("Reliable", "2024-05-06")], false));
        let record = G2Adapter.extract_one(&fragments[0]).unwrap();
        assert_eq!(record.title(), "\"Reliable\"");
        assert!(record.description().contains("Reliable body"));
        assert_eq!(record.raw_date(), Some("2024-05-06"));
        assert_eq!(record.parsed_date(), NaiveDate::from_ymd_opt(2024, 5, 6));
        assert_eq!(record.rating(), "4.5");
        assert_eq!(record.reviewer(), "Jane D.");
        assert_eq!(record.job_title(), "Engineering Manager");
        assert_eq!(record.company_size(), Some("Mid-Market (51-1000 emp.)"));
        assert_eq!(record.source(), SourceKind::G2);
    }

    #[test]
    fn test_company_size_empty_with_fewer_than_three_labels() {
        let html = r#"<div data-poison="1">
            <div class="elv-text-xs elv-font-regular">CTO</div>
            <div class="elv-text-xs elv-font-regular">Retail</div>
            <div itemprop="name">Short</div>
        </div>"#;
        let fragment = ReviewFragment { index: 0, html: html.to_string() };
        let record = G2Adapter.extract_one(&fragment).unwrap();
        assert_eq!(record.job_title(), "CTO");
        assert_eq!(record.company_size(), Some(""));
        assert_eq!(record.reviewer(), "Anonymous");
    }

    #[test]
    fn test_malformed_fragment_yields_none() {
        let fragment = ReviewFragment { index: 3, html: "<section>broken</section>".to_string() };
        assert!(G2Adapter.extract_one(&fragment).is_none());
    }

    #[test]
    fn test_has_next_page_requires_displayed_next_control() {
        let with_next = page(&[card("A", "2024-01-02")], true);
        let action = G2Adapter.has_next_page(&with_next).unwrap();
        assert_eq!(action.target.selector, "ul.pagination a");
        assert_eq!(action.target.text_contains.as_deref(), Some("Next"));

        assert!(G2Adapter.has_next_page(&page(&[], false)).is_none());

        let hidden = r#"<ul class="pagination"><li><a style="display:none">Next ›</a></li></ul>"#;
        assert!(G2Adapter.has_next_page(hidden).is_none());
    }

    #[tokio::test]
    async fn test_discover_product_resolves_relative_link() {
        let session = FakeSession::new().with_page(
            "https://www.g2.com/search?query=Acme",
            &search_page("/products/acme/reviews"),
        );
        let url = G2Adapter
            .discover_product(&session, "Acme", &ScraperConfig::instant())
            .await
            .unwrap();
        assert_eq!(url.as_str(), "https://www.g2.com/products/acme/reviews");
    }

    #[tokio::test]
    async fn test_discover_product_not_found() {
        let session = FakeSession::new().with_page(
            "https://www.g2.com/search?query=Nobody",
            "<html><body><p>No results</p></body></html>",
        );
        let err = G2Adapter
            .discover_product(&session, "Nobody", &ScraperConfig::instant())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScrapeError::ProductNotFound {
                ref company,
                site: SourceKind::G2
            } if company == "Nobody"
        ));
    }

    #[tokio::test]
    async fn test_discover_product_transport_failure() {
        let session = FakeSession::failing();
        let err = G2Adapter
            .discover_product(&session, "Acme", &ScraperConfig::instant())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)));
    }
}

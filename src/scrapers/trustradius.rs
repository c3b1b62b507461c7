//! TrustRadius review adapter.
//!
//! TrustRadius has no usable search URL, so discovery types the company name
//! into the site search box and follows the first type-ahead suggestion.
//! Review cards use stable BEM class names; the rating comes from microdata.

use super::{
    DatePolicy, NavigationAction, ReviewFragment, ReviewSource, attr_of, displayed_control,
    first_href, not_found, parse_root, resolve_href, selector, split_fragments, text_of,
};
use crate::browser::{BrowserSession, ElementTarget};
use crate::config::ScraperConfig;
use crate::error::{FragmentError, ScrapeError};
use crate::models::{RawReview, ReviewRecord, SourceKind};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;

const BASE_URL: &str = "https://www.trustradius.com/";
const SEARCH_INPUT: &str = "input[placeholder*='Search']";
const SUGGESTION: &str = "ul.autocomplete__list li a";

const ROOT_CSS: &str = "div.reviewCard";
const NEXT_CSS: &str = "a[aria-label='Next Page']";

static ROOT: Lazy<Selector> = Lazy::new(|| selector(ROOT_CSS));
static REVIEWER: Lazy<Selector> = Lazy::new(|| selector("span.reviewCard__reviewerName"));
static ROLE: Lazy<Selector> = Lazy::new(|| selector("span.reviewCard__reviewerRole"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("span.reviewCard__reviewDate"));
static RATING: Lazy<Selector> = Lazy::new(|| selector("meta[itemprop='ratingValue']"));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("h3.reviewCard__title"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("div.reviewCard__body"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector(NEXT_CSS));

#[derive(Debug, Default, Clone, Copy)]
pub struct TrustRadiusAdapter;

impl ReviewSource for TrustRadiusAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::TrustRadius
    }

    fn review_container(&self) -> &'static str {
        ROOT_CSS
    }

    fn date_policy(&self) -> DatePolicy {
        DatePolicy::SkipOutOfRange
    }

    #[instrument(level = "info", skip(self, session, config))]
    async fn discover_product<S: BrowserSession>(
        &self,
        session: &S,
        company: &str,
        config: &ScraperConfig,
    ) -> Result<Url, ScrapeError> {
        session.navigate(BASE_URL).await?;
        sleep(config.load_settle()).await;

        if !session
            .wait_for_presence(SEARCH_INPUT, config.wait_timeout())
            .await?
        {
            warn!("Search box never appeared");
            return Err(not_found(company, self.kind()));
        }
        session.type_into(SEARCH_INPUT, company.trim()).await?;
        sleep(config.typing_settle()).await;

        if !session
            .wait_for_presence(SUGGESTION, config.wait_timeout())
            .await?
        {
            warn!("No search suggestions appeared");
            return Err(not_found(company, self.kind()));
        }

        let content = session.current_page_content().await?;
        let url = first_href(&content, SUGGESTION)
            .and_then(|href| resolve_href(BASE_URL, &href))
            .ok_or_else(|| not_found(company, self.kind()))?;

        if session
            .locate_and_activate(&ElementTarget::css(SUGGESTION))
            .await?
        {
            sleep(config.load_settle()).await;
        }
        info!(%url, "Opened product page");
        Ok(url)
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

        let raw = RawReview {
            title: text_of(card, &TITLE),
            description: text_of(card, &BODY),
            date: text_of(card, &DATE),
            rating: attr_of(card, &RATING, "content"),
            reviewer: text_of(card, &REVIEWER),
            job_title: text_of(card, &ROLE),
            company_size: None,
        };
        Ok(ReviewRecord::new(self.kind(), raw))
    }

    fn has_next_page(&self, content: &str) -> Option<NavigationAction> {
        let document = Html::parse_document(content);
        displayed_control(&document, &NEXT, None).map(|_| NavigationAction {
            label: "Next Page",
            target: ElementTarget::css(NEXT_CSS),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{card, page};
    use super::*;
    use crate::browser::fake::FakeSession;
    use chrono::NaiveDate;

    #[test]
    fn test_extract_one_reads_class_fields() {
        let fragments =
            TrustRadiusAdapter.fetch_page(&page(&[card("Good CRM", "Mar 4, 2024")], false));
        assert_eq!(fragments.len(), 1);
        let record = TrustRadiusAdapter.extract_one(&fragments[0]).unwrap();
        assert_eq!(record.title(), "Good CRM");
        assert_eq!(record.description(), "Body of Good CRM");
        assert_eq!(record.reviewer(), "Sam K.");
        assert_eq!(record.job_title(), "IT Director");
        assert_eq!(record.rating(), "9");
        assert_eq!(record.parsed_date(), NaiveDate::from_ymd_opt(2024, 3, 4));
        assert_eq!(record.company_size(), None);
    }

    #[test]
    fn test_unparseable_date_keeps_record() {
        let fragments = TrustRadiusAdapter.fetch_page(&page(&[card("Odd", "last spring")], false));
        let record = TrustRadiusAdapter.extract_one(&fragments[0]).unwrap();
        assert_eq!(record.raw_date(), Some("last spring"));
        assert_eq!(record.parsed_date(), None);
    }

    #[test]
    fn test_has_next_page_uses_labelled_control() {
        let action = TrustRadiusAdapter
            .has_next_page(&page(&[], true))
            .unwrap();
        assert_eq!(action.label, "Next Page");
        assert_eq!(action.target, ElementTarget::css("a[aria-label='Next Page']"));
        assert!(TrustRadiusAdapter.has_next_page(&page(&[], false)).is_none());
    }

    #[tokio::test]
    async fn test_discover_product_via_type_ahead() {
        let home = r#"<html><body>
            <input placeholder="Search products">
            <ul class="autocomplete__list"><li><a href="/products/acme/reviews">Acme</a></li></ul>
        </body></html>"#;
        let session = FakeSession::new().with_page("https://www.trustradius.com/", home);
        let url = TrustRadiusAdapter
            .discover_product(&session, "Acme", &ScraperConfig::instant())
            .await
            .unwrap();
        assert_eq!(url.as_str(), "https://www.trustradius.com/products/acme/reviews");
        assert_eq!(
            session.typed.borrow().as_slice(),
            &[(SEARCH_INPUT.to_string(), "Acme".to_string())]
        );
        assert_eq!(session.activations.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_discover_product_without_suggestions() {
        let home = r#"<html><body><input placeholder="Search products"></body></html>"#;
        let session = FakeSession::new().with_page("https://www.trustradius.com/", home);
        let err = TrustRadiusAdapter
            .discover_product(&session, "Acme", &ScraperConfig::instant())
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::ProductNotFound { site: SourceKind::TrustRadius, .. }));
    }
}

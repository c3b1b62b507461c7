//! Capterra review adapter.
//!
//! Capterra review cards carry schema.org `Review` microdata on most layouts
//! and BEM-style class names on the rest, so every field is read from
//! microdata first with a class-name fallback. Reviews are listed newest
//! first, which lets the run stop once a whole page predates the range.

use super::{
    DatePolicy, NavigationAction, ReviewFragment, ReviewSource, attr_of, discover_via_search_link,
    displayed_control, parse_root, search_url, selector, split_fragments, text_of,
};
use crate::browser::{BrowserSession, ElementTarget};
use crate::config::ScraperConfig;
use crate::error::{FragmentError, ScrapeError};
use crate::models::{RawReview, ReviewRecord, SourceKind};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::instrument;
use url::Url;

const BASE_URL: &str = "https://www.capterra.com";
const SEARCH_URL: &str = "https://www.capterra.com/search?query={query}";
const PRODUCT_LINK: &str = "a[href*='/p/'][href*='/reviews/']";

const ROOT_CSS: &str = "div[itemtype$='schema.org/Review'], div.review-card";
const NEXT_CSS: &str = "button[data-test-id='pagination-next'], a[aria-label='Next']";

static ROOT: Lazy<Selector> = Lazy::new(|| selector(ROOT_CSS));

static TITLE: Lazy<Selector> = Lazy::new(|| selector("[itemprop='headline']"));
static TITLE_CLASS: Lazy<Selector> = Lazy::new(|| selector("h3.review-card__title"));
static BODY: Lazy<Selector> = Lazy::new(|| selector("[itemprop='reviewBody']"));
static BODY_CLASS: Lazy<Selector> = Lazy::new(|| selector("div.review-card__body"));
static DATE: Lazy<Selector> = Lazy::new(|| selector("meta[itemprop='datePublished']"));
static DATE_CLASS: Lazy<Selector> = Lazy::new(|| selector(".review-card__date"));
static RATING: Lazy<Selector> =
    Lazy::new(|| selector("[itemprop='reviewRating'] meta[itemprop='ratingValue']"));
static RATING_CLASS: Lazy<Selector> = Lazy::new(|| selector(".review-card__rating"));
static REVIEWER: Lazy<Selector> = Lazy::new(|| selector("[itemprop='author'] [itemprop='name']"));
static REVIEWER_CLASS: Lazy<Selector> = Lazy::new(|| selector(".review-card__reviewer-name"));
static ROLE: Lazy<Selector> = Lazy::new(|| selector(".review-card__reviewer-role"));
static COMPANY_SIZE: Lazy<Selector> = Lazy::new(|| selector(".review-card__company-size"));
static NEXT: Lazy<Selector> = Lazy::new(|| selector(NEXT_CSS));

#[derive(Debug, Default, Clone, Copy)]
pub struct CapterraAdapter;

impl ReviewSource for CapterraAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Capterra
    }

    fn review_container(&self) -> &'static str {
        ROOT_CSS
    }

    fn date_policy(&self) -> DatePolicy {
        DatePolicy::SkipUntilPageOlderThanRange
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

        let reviewer = attr_of(card, &REVIEWER, "content")
            .or_else(|| text_of(card, &REVIEWER))
            .or_else(|| text_of(card, &REVIEWER_CLASS));

        let raw = RawReview {
            title: text_of(card, &TITLE).or_else(|| text_of(card, &TITLE_CLASS)),
            description: text_of(card, &BODY).or_else(|| text_of(card, &BODY_CLASS)),
            date: attr_of(card, &DATE, "content").or_else(|| text_of(card, &DATE_CLASS)),
            rating: attr_of(card, &RATING, "content").or_else(|| text_of(card, &RATING_CLASS)),
            reviewer,
            job_title: text_of(card, &ROLE),
            company_size: Some(text_of(card, &COMPANY_SIZE).unwrap_or_default()),
        };
        Ok(ReviewRecord::new(self.kind(), raw))
    }

    fn has_next_page(&self, content: &str) -> Option<NavigationAction> {
        let document = Html::parse_document(content);
        displayed_control(&document, &NEXT, None).map(|_| NavigationAction {
            label: "Next",
            target: ElementTarget::css(NEXT_CSS),
        })
    }
}

/// Markup builders shaped like Capterra's review listing.
#[cfg(test)]
pub(crate) mod fixtures {
    /// A search results page linking to each of `hrefs`.
    pub fn search_page(hrefs: &[&str]) -> String {
        let links: String = hrefs
            .iter()
            .map(|href| format!(r#"<a href="{href}">result</a>"#))
            .collect();
        format!("<html><body>{links}</body></html>")
    }

    /// A card carrying microdata.
    pub fn card(title: &str, date: &str) -> String {
        format!(
            r#"<div class="review-card" itemscope itemtype="https://schema.org/Review">
                <div itemprop="author" itemscope><span itemprop="name">Lee P.</span></div>
                <span class="review-card__reviewer-role">Office Manager</span>
                <span class="review-card__company-size">11-50 employees</span>
                <meta itemprop="datePublished" content="{date}">
                <div itemprop="reviewRating"><meta itemprop="ratingValue" content="5.0"></div>
                <h3 itemprop="headline">{title}</h3>
                <p itemprop="reviewBody">Body of {title}</p>
            </div>"#
        )
    }

    /// A card with class names only, dates printed Capterra-style.
    pub fn plain_card(title: &str, date: &str) -> String {
        format!(
            r#"<div class="review-card">
                <span class="review-card__reviewer-name">Ana R.</span>
                <span class="review-card__date">{date}</span>
                <span class="review-card__rating">4.0</span>
                <h3 class="review-card__title">{title}</h3>
                <div class="review-card__body">Plain {title}</div>
            </div>"#
        )
    }

    pub fn page(cards: &[String], with_next: bool) -> String {
        let next = if with_next {
            r#"<button data-test-id="pagination-next">Next</button>"#
        } else {
            r#"<button data-test-id="pagination-next" disabled>Next</button>"#
        };
        format!("<html><body>{}{}</body></html>", cards.join("\n"), next)
    }
}

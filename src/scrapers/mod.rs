//! Review source adapters.
//!
//! Each review site gets one adapter implementing [`ReviewSource`]. The
//! pagination controller is written once against that trait; nothing outside
//! this module branches on the source name.
//!
//! # Supported Sources
//!
//! | Source | Module | Discovery | Fragments | Next control | Date policy |
//! |--------|--------|-----------|-----------|--------------|-------------|
//! | G2 | [`g2`] | search page link | `div[data-poison]` | `ul.pagination a` "Next" | stop page at first out-of-range |
//! | Capterra | [`capterra`] | search page link | review cards (microdata first) | "Next" button | skip, stop run when page is older than range |
//! | TrustRadius | [`trustradius`] | type-ahead suggestion | `div.reviewCard` | `a[aria-label='Next Page']` | skip out-of-range |
//!
//! # Common Patterns
//!
//! Each adapter:
//! - discovers the product review URL through the browser session
//! - splits page markup into [`ReviewFragment`]s
//! - builds a [`ReviewRecord`] per fragment, logging and skipping malformed ones
//! - reports whether a displayed "Next" control exists

pub mod capterra;
pub mod g2;
pub mod trustradius;

use crate::browser::{BrowserSession, ElementTarget};
use crate::config::ScraperConfig;
use crate::error::{FragmentError, ScrapeError};
use crate::models::{ReviewRecord, SourceKind};
use scraper::{ElementRef, Html, Selector};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// One review's raw markup, cut out of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFragment {
    /// Position of the fragment on its page, starting at 0.
    pub index: usize,
    pub html: String,
}

/// A pagination step the controller should perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationAction {
    /// Human-readable name for logs, e.g. "Next".
    pub label: &'static str,
    pub target: ElementTarget,
}

/// How an adapter treats records whose date falls outside the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePolicy {
    /// Stop reading the current page at the first out-of-range record.
    /// Later pages are still visited.
    StopPageAtFirstOutOfRange,
    /// Drop out-of-range records and keep scanning.
    SkipOutOfRange,
    /// Drop out-of-range records; end the run once a page holds only
    /// records older than the range start.
    SkipUntilPageOlderThanRange,
}

/// Per-source discovery, extraction and pagination logic.
pub trait ReviewSource {
    fn kind(&self) -> SourceKind;

    /// Selector whose presence means the review list has rendered.
    fn review_container(&self) -> &'static str;

    fn date_policy(&self) -> DatePolicy;

    /// Find the product's review page for `company`.
    async fn discover_product<S: BrowserSession>(
        &self,
        session: &S,
        company: &str,
        config: &ScraperConfig,
    ) -> Result<Url, ScrapeError>;

    /// Split page markup into one fragment per visible review.
    ///
    /// An empty result is a valid end-of-listing signal.
    fn fetch_page(&self, content: &str) -> Vec<ReviewFragment>;

    /// Build a record from one fragment, or explain why it is malformed.
    fn parse_fragment(&self, fragment: &ReviewFragment) -> Result<ReviewRecord, FragmentError>;

    /// Build a record from one fragment. Malformed fragments are logged and
    /// yield `None`; they never abort the page.
    fn extract_one(&self, fragment: &ReviewFragment) -> Option<ReviewRecord> {
        match self.parse_fragment(fragment) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    source = %self.kind(),
                    index = fragment.index,
                    error = %e,
                    "Skipping malformed review fragment"
                );
                None
            }
        }
    }

    /// The pagination control to activate, if one is present and displayed.
    fn has_next_page(&self, content: &str) -> Option<NavigationAction>;
}

/// Parse a selector that is known to be valid at compile time.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector `{css}`: {e}"))
}

/// Cut every element matching `root` out of `content`.
pub(crate) fn split_fragments(content: &str, root: &Selector) -> Vec<ReviewFragment> {
    let document = Html::parse_document(content);
    document
        .select(root)
        .enumerate()
        .map(|(index, element)| ReviewFragment {
            index,
            html: element.html(),
        })
        .collect()
}

/// Re-parse a fragment and return the markup of its review root.
///
/// The returned document owns the markup; callers select the root from it
/// with the same selector.
pub(crate) fn parse_root(
    fragment: &ReviewFragment,
    root: &Selector,
    root_css: &'static str,
) -> Result<Html, FragmentError> {
    if fragment.html.trim().is_empty() {
        return Err(FragmentError::Empty);
    }
    let document = Html::parse_fragment(&fragment.html);
    if document.select(root).next().is_none() {
        return Err(FragmentError::MissingRoot(root_css));
    }
    Ok(document)
}

/// Visible text of the first match, whitespace collapsed.
pub(crate) fn text_of(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Attribute value of the first match.
pub(crate) fn attr_of(scope: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    scope
        .select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Visible text of the `n`th (0-based) match.
///
/// Used for fields a site only distinguishes by position among identically
/// styled labels. Precondition: the scope holds at least `n + 1` matches;
/// otherwise this returns `None` and the caller applies its fallback.
pub(crate) fn nth_text(scope: ElementRef<'_>, sel: &Selector, n: usize) -> Option<String> {
    scope.select(sel).nth(n).map(element_text)
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Whether markup for a control suggests it is hidden or disabled.
pub(crate) fn looks_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    let style = value
        .attr("style")
        .unwrap_or_default()
        .replace(' ', "")
        .to_ascii_lowercase();
    value.attr("hidden").is_some()
        || value.attr("aria-hidden") == Some("true")
        || value.attr("aria-disabled") == Some("true")
        || value.attr("disabled").is_some()
        || style.contains("display:none")
        || style.contains("visibility:hidden")
        || value.classes().any(|c| c == "disabled" || c == "hidden")
}

/// First displayed element matching `sel` whose text contains `text`.
pub(crate) fn displayed_control<'a>(
    document: &'a Html,
    sel: &Selector,
    text: Option<&str>,
) -> Option<ElementRef<'a>> {
    document.select(sel).find(|el| {
        let text_ok = text.is_none_or(|t| element_text(*el).contains(t));
        text_ok && !looks_hidden(*el)
    })
}

/// Search-page discovery shared by sources with a query URL.
///
/// Loads `search_url`, waits for `link_css` to appear and resolves the first
/// displayed, enabled match's href against `base`.
#[instrument(level = "info", skip(session, config), fields(%source))]
pub(crate) async fn discover_via_search_link<S: BrowserSession>(
    session: &S,
    source: SourceKind,
    company: &str,
    search_url: &str,
    link_css: &'static str,
    base: &str,
    config: &ScraperConfig,
) -> Result<Url, ScrapeError> {
    info!(%search_url, "Searching for product");
    session.navigate(search_url).await?;
    sleep(config.load_settle()).await;

    if !session
        .wait_for_presence(link_css, config.wait_timeout())
        .await?
    {
        warn!(company, "No product link appeared");
        return Err(not_found(company, source));
    }

    let content = session.current_page_content().await?;
    let href = first_href(&content, link_css).ok_or_else(|| not_found(company, source))?;
    let url = resolve_href(base, &href).ok_or_else(|| not_found(company, source))?;
    info!(%url, "Found product page");
    Ok(url)
}

/// `href` of the first actionable element matching `css` in `content`.
///
/// Hidden or disabled links are skipped; they cannot be followed by a user.
pub(crate) fn first_href(content: &str, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    let document = Html::parse_document(content);
    let href = document
        .select(&sel)
        .filter(|el| !looks_hidden(*el))
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|h| !h.is_empty())
        .map(str::to_string);
    debug!(?href, css, "Resolved first link");
    href
}

/// Resolve a possibly-relative `href` against `base`.
pub(crate) fn resolve_href(base: &str, href: &str) -> Option<Url> {
    Url::parse(base).ok()?.join(href).ok()
}

pub(crate) fn not_found(company: &str, source: SourceKind) -> ScrapeError {
    ScrapeError::ProductNotFound {
        company: company.to_string(),
        site: source,
    }
}

/// Build the search URL for `company` from a `{query}` template.
pub(crate) fn search_url(template: &str, company: &str) -> String {
    template.replace("{query}", &urlencoding::encode(company.trim()))
}

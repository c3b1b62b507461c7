//! Page-by-page extraction loop shared by every source.
//!
//! The controller loads the product page, waits for the review list, hands
//! the markup to the adapter, applies the adapter's date policy and follows
//! the "Next" control until one of the [`TerminationReason`]s fires.

use crate::browser::BrowserSession;
use crate::config::ScraperConfig;
use crate::dates::DateRange;
use crate::error::ScrapeError;
use crate::models::{ReviewRecord, TerminationReason};
use crate::scrapers::{DatePolicy, ReviewFragment, ReviewSource};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Progress of one adapter run. Only the controller mutates it.
#[derive(Debug)]
pub struct PaginationState {
    /// Current page, starting at 1.
    pub page_index: u32,
    pub collected: Vec<ReviewRecord>,
    pub terminated: bool,
    pub termination_reason: Option<TerminationReason>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationState {
    pub fn new() -> Self {
        Self {
            page_index: 1,
            collected: Vec::new(),
            terminated: false,
            termination_reason: None,
        }
    }

    fn terminate(&mut self, reason: TerminationReason) -> TerminationReason {
        self.terminated = true;
        self.termination_reason = Some(reason);
        reason
    }
}

/// Records surviving one page, plus what the page told us about the run.
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<ReviewRecord>,
    /// The page scan stopped before its last fragment.
    pub stopped_early: bool,
    /// Every dated record on the page predates the range.
    pub exhausted: bool,
}

/// Extract and filter one page's fragments under the adapter's date policy.
///
/// Undated records are kept and never influence the policy. Placeholder
/// records are dropped.
pub fn extract_page<A: ReviewSource>(
    adapter: &A,
    fragments: &[ReviewFragment],
    range: &DateRange,
) -> PageExtraction {
    let policy = adapter.date_policy();
    let mut page = PageExtraction::default();
    let mut dated = 0usize;
    let mut older = 0usize;

    for fragment in fragments {
        let Some(record) = adapter.extract_one(fragment) else {
            continue;
        };

        if let Some(date) = record.parsed_date() {
            dated += 1;
            if date < range.start() {
                older += 1;
            }
            if !range.contains(Some(date)) {
                if policy == DatePolicy::StopPageAtFirstOutOfRange {
                    debug!(index = fragment.index, %date, "Out of range; ignoring rest of page");
                    page.stopped_early = true;
                    break;
                }
                debug!(index = fragment.index, %date, "Out of range; skipping review");
                continue;
            }
        }

        if record.is_substantive() {
            page.records.push(record);
        } else {
            debug!(index = fragment.index, "Dropping placeholder review");
        }
    }

    page.exhausted =
        policy == DatePolicy::SkipUntilPageOlderThanRange && dated > 0 && older == dated;
    page
}

/// Drives an adapter across pages through a browser session.
pub struct PaginationController<'a, S> {
    session: &'a S,
    config: &'a ScraperConfig,
}

impl<'a, S: BrowserSession> PaginationController<'a, S> {
    pub fn new(session: &'a S, config: &'a ScraperConfig) -> Self {
        Self { session, config }
    }

    /// Walk the listing at `product_url`, appending survivors to `state`.
    ///
    /// Wait expiry ends the run with [`TerminationReason::Timeout`] and keeps
    /// what was collected; only session failures are returned as errors.
    /// A "Next" activation that leaves the listing unchanged counts as the
    /// last page.
    #[instrument(level = "info", skip_all, fields(source = %adapter.kind(), url = %product_url))]
    pub async fn drive<A: ReviewSource>(
        &self,
        adapter: &A,
        product_url: &Url,
        range: &DateRange,
        state: &mut PaginationState,
    ) -> Result<TerminationReason, ScrapeError> {
        self.session.navigate(product_url.as_str()).await?;
        sleep(self.config.load_settle()).await;

        // Fragments of the page before the last "Next" activation.
        let mut previous: Option<Vec<ReviewFragment>> = None;

        loop {
            let page = state.page_index;
            info!(page, "Processing page");

            let present = self
                .session
                .wait_for_presence(adapter.review_container(), self.config.wait_timeout())
                .await?;
            if !present {
                warn!(page, "Timeout waiting for reviews to load");
                return Ok(state.terminate(TerminationReason::Timeout));
            }

            let content = self.session.current_page_content().await?;
            let fragments = adapter.fetch_page(&content);
            if fragments.is_empty() {
                warn!(page, "No review elements found on this page");
                return Ok(state.terminate(TerminationReason::NoElements));
            }
            if previous.as_ref() == Some(&fragments) {
                warn!(page, "Listing unchanged after Next; treating as last page");
                return Ok(state.terminate(TerminationReason::NoNextControl));
            }

            let extraction = extract_page(adapter, &fragments, range);
            let found = extraction.records.len();
            state.collected.extend(extraction.records);
            info!(
                page,
                fragments = fragments.len(),
                found,
                total = state.collected.len(),
                stopped_early = extraction.stopped_early,
                "Collected reviews from page"
            );

            if extraction.exhausted {
                info!(page, "Page predates the range; stopping");
                return Ok(state.terminate(TerminationReason::ExhaustedByDate));
            }

            let Some(action) = adapter.has_next_page(&content) else {
                info!(page, "No more pages to scrape");
                return Ok(state.terminate(TerminationReason::NoNextControl));
            };
            if !self.session.locate_and_activate(&action.target).await? {
                info!(page, control = action.label, "Next control not actionable");
                return Ok(state.terminate(TerminationReason::NoNextControl));
            }
            debug!(page, control = action.label, "Activated pagination control");
            sleep(self.config.pagination_settle()).await;
            previous = Some(fragments);
            state.page_index += 1;
        }
    }
}

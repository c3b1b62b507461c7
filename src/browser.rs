//! Browser session used to drive the review sites.
//!
//! The extraction core only talks to [`BrowserSession`]. [`ChromeSession`] is
//! the production implementation over `headless_chrome`; it owns the browser
//! process and releases it when dropped, so a run that returns early, fails
//! or is cancelled still tears the browser down.
//!
//! A session is driven by exactly one run at a time. Concurrent runs need one
//! session each.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Flags that keep sites from serving their bot-detection variant.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-infobars",
    "--log-level=3",
];

const HIDE_WEBDRIVER: &str =
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

const CLICK_JS: &str = "function() { this.click(); }";

const IS_DISPLAYED_JS: &str = r#"function() {
    const style = window.getComputedStyle(this);
    return this.offsetParent !== null
        && style.visibility !== 'hidden'
        && style.display !== 'none';
}"#;

/// An element to act on: a CSS selector, optionally narrowed to elements
/// whose visible text contains a given string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementTarget {
    pub selector: String,
    pub text_contains: Option<String>,
}

impl ElementTarget {
    pub fn css(selector: &str) -> Self {
        Self {
            selector: selector.to_string(),
            text_contains: None,
        }
    }

    pub fn css_with_text(selector: &str, text: &str) -> Self {
        Self {
            selector: selector.to_string(),
            text_contains: Some(text.to_string()),
        }
    }
}

/// The operations the extraction core needs from a browser.
pub trait BrowserSession {
    /// Load `url` and wait for the navigation to finish.
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError>;

    /// Markup of the page as currently rendered.
    async fn current_page_content(&self) -> Result<String, ScrapeError>;

    /// Wait up to `timeout` for `selector` to match something.
    ///
    /// Expiry is `Ok(false)`, not an error.
    async fn wait_for_presence(&self, selector: &str, timeout: Duration)
    -> Result<bool, ScrapeError>;

    /// Activate the first displayed element matching `target`.
    ///
    /// Returns `Ok(false)` when nothing matching is currently displayed.
    async fn locate_and_activate(&self, target: &ElementTarget) -> Result<bool, ScrapeError>;

    /// Replace the value of the input matching `selector` with `text`.
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError>;
}

/// A Chrome/Chromium instance with a single tab.
pub struct ChromeSession {
    tab: Arc<Tab>,
    // Dropped after `tab`; dropping it kills the browser process.
    _browser: Browser,
}

impl ChromeSession {
    /// Launch a browser configured from `config`.
    #[instrument(level = "info", skip_all, fields(headless = config.headless))]
    pub fn launch(config: &ScraperConfig) -> Result<Self, ScrapeError> {
        let args: Vec<&OsStr> = LAUNCH_ARGS.iter().map(OsStr::new).collect();
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false)
            .window_size(Some((config.window_width, config.window_height)))
            .path(config.chrome_path.clone())
            .idle_browser_timeout(Duration::from_secs(300))
            .args(args)
            .build()
            .map_err(ScrapeError::transport)?;

        let browser = Browser::new(options).map_err(ScrapeError::transport)?;
        let tab = browser.new_tab().map_err(ScrapeError::transport)?;
        tab.call_method(Page::AddScriptToEvaluateOnNewDocument {
            source: HIDE_WEBDRIVER.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(ScrapeError::transport)?;

        info!("Chrome session started");
        Ok(Self {
            tab,
            _browser: browser,
        })
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        info!("Chrome session released");
    }
}

fn is_displayed(element: &Element<'_>) -> bool {
    element
        .call_js_fn(IS_DISPLAYED_JS, vec![], false)
        .ok()
        .and_then(|remote| remote.value)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

/// Run a synchronous CDP call on the blocking pool so the runtime keeps
/// polling other branches (Ctrl-C) while Chrome works.
async fn run_blocking<T, F>(f: F) -> Result<T, ScrapeError>
where
    F: FnOnce() -> Result<T, ScrapeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ScrapeError::transport)?
}

fn find_and_click(tab: &Tab, target: &ElementTarget) -> Result<bool, ScrapeError> {
    // find_elements errors when nothing matches.
    let Ok(elements) = tab.find_elements(&target.selector) else {
        return Ok(false);
    };

    for element in elements {
        if let Some(text) = &target.text_contains {
            let inner = element.get_inner_text().unwrap_or_default();
            if !inner.contains(text.as_str()) {
                continue;
            }
        }
        if !is_displayed(&element) {
            debug!("Matching element is not displayed");
            continue;
        }
        // Script click: some controls have no href to follow.
        element
            .call_js_fn(CLICK_JS, vec![], false)
            .map_err(ScrapeError::transport)?;
        return Ok(true);
    }
    Ok(false)
}

impl BrowserSession for ChromeSession {
    #[instrument(level = "debug", skip(self))]
    async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let url = url.to_string();
        run_blocking(move || {
            tab.navigate_to(&url).map_err(ScrapeError::transport)?;
            tab.wait_until_navigated().map_err(ScrapeError::transport)?;
            Ok(())
        })
        .await
    }

    async fn current_page_content(&self) -> Result<String, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        run_blocking(move || tab.get_content().map_err(ScrapeError::transport)).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn wait_for_presence(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        run_blocking(move || {
            match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
                Ok(_) => Ok(true),
                Err(e) => {
                    debug!(error = %e, "Element did not appear");
                    Ok(false)
                }
            }
        })
        .await
    }

    #[instrument(level = "debug", skip(self))]
    async fn locate_and_activate(&self, target: &ElementTarget) -> Result<bool, ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let target = target.clone();
        run_blocking(move || find_and_click(&tab, &target)).await
    }

    #[instrument(level = "debug", skip(self, text))]
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        let tab = Arc::clone(&self.tab);
        let selector = selector.to_string();
        let text = text.to_string();
        run_blocking(move || {
            let element = tab
                .wait_for_element(&selector)
                .map_err(ScrapeError::transport)?;
            element.click().map_err(ScrapeError::transport)?;
            if let Err(e) = element.call_js_fn("function() { this.value = ''; }", vec![], false) {
                warn!(error = %e, "Could not clear input before typing");
            }
            element.type_into(&text).map_err(ScrapeError::transport)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_blocking_calls_leave_runtime_responsive() {
        let slow = run_blocking(|| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        let interrupted = tokio::select! {
            _ = slow => false,
            _ = tokio::time::sleep(Duration::from_millis(20)) => true,
        };
        assert!(interrupted);
    }

    #[tokio::test]
    async fn test_blocking_call_errors_pass_through() {
        let err = run_blocking::<(), _>(|| Err(ScrapeError::Transport("tab closed".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(msg) if msg == "tab closed"));
    }
}

/// In-memory session serving HTML fixtures, for tests.
#[cfg(test)]
pub mod fake {
    use super::*;
    use scraper::{Html, Selector};
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeSession {
        pages: HashMap<String, String>,
        transitions: HashMap<String, String>,
        current: RefCell<Option<String>>,
        pub navigations: RefCell<Vec<String>>,
        pub activations: RefCell<Vec<ElementTarget>>,
        pub typed: RefCell<Vec<(String, String)>>,
        pub fail_navigation: bool,
    }

    impl FakeSession {
        pub fn new() -> Self {
            Self::default()
        }

        /// Serve `html` at `url`.
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        /// Activating a control on `from` moves the session to `to`.
        pub fn with_transition(mut self, from: &str, to: &str) -> Self {
            self.transitions.insert(from.to_string(), to.to_string());
            self
        }

        pub fn failing() -> Self {
            Self {
                fail_navigation: true,
                ..Self::default()
            }
        }

        fn current_html(&self) -> String {
            self.current
                .borrow()
                .as_ref()
                .and_then(|url| self.pages.get(url).cloned())
                .unwrap_or_else(|| "<html><body></body></html>".to_string())
        }
    }

    impl BrowserSession for FakeSession {
        async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
            if self.fail_navigation {
                return Err(ScrapeError::Transport(format!("cannot reach {url}")));
            }
            self.navigations.borrow_mut().push(url.to_string());
            *self.current.borrow_mut() = Some(url.to_string());
            Ok(())
        }

        async fn current_page_content(&self) -> Result<String, ScrapeError> {
            Ok(self.current_html())
        }

        async fn wait_for_presence(
            &self,
            selector: &str,
            _timeout: Duration,
        ) -> Result<bool, ScrapeError> {
            let selector = Selector::parse(selector)
                .map_err(|e| ScrapeError::Transport(format!("bad selector: {e}")))?;
            let document = Html::parse_document(&self.current_html());
            let found = document.select(&selector).next().is_some();
            Ok(found)
        }

        async fn locate_and_activate(&self, target: &ElementTarget) -> Result<bool, ScrapeError> {
            let selector = Selector::parse(&target.selector)
                .map_err(|e| ScrapeError::Transport(format!("bad selector: {e}")))?;
            let found = {
                let document = Html::parse_document(&self.current_html());
                document.select(&selector).any(|el| match &target.text_contains {
                    Some(text) => el.text().collect::<String>().contains(text.as_str()),
                    None => true,
                })
            };
            if !found {
                return Ok(false);
            }
            self.activations.borrow_mut().push(target.clone());
            let from = self.current.borrow().clone().unwrap_or_default();
            if let Some(to) = self.transitions.get(&from) {
                *self.current.borrow_mut() = Some(to.clone());
            }
            Ok(true)
        }

        async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
            self.typed
                .borrow_mut()
                .push((selector.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fake_session_follows_transitions() {
        let session = FakeSession::new()
            .with_page("p1", r#"<ul class="pagination"><a>Next ›</a></ul>"#)
            .with_page("p2", "<p>end</p>")
            .with_transition("p1", "p2");
        session.navigate("p1").await.unwrap();
        let moved = session
            .locate_and_activate(&ElementTarget::css_with_text("ul.pagination a", "Next"))
            .await
            .unwrap();
        assert!(moved);
        assert!(session.current_page_content().await.unwrap().contains("end"));
        assert!(
            !session
                .wait_for_presence("ul.pagination", Duration::ZERO)
                .await
                .unwrap()
        );
    }
}

use crate::scrapers::page::{Cookie, Key, Locator, PageSource};
use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::browser::tab::element::Element;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Scrolls the element when it has its own scrollbar, the window otherwise
const SCROLL_JS: &str = "function(direction) { \
    const own = this !== document.body && this !== document.documentElement \
        && this.scrollHeight > this.clientHeight; \
    (own ? this : window).scrollBy(0, direction * window.innerHeight * 0.9); }";

/// Focus without a click, caret after the current value
const CARET_TO_END_JS: &str = "function() { \
    this.focus(); \
    const end = (this.value || '').length; \
    if (this.setSelectionRange) { this.setSelectionRange(end, end); } }";

/// Chrome session driving a single tab
pub struct ChromePage {
    // Dropping the browser closes the tab
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromePage {
    /// Launch Chrome. Interactive browsing needs a visible window, so
    /// `headless` is up to the caller.
    pub fn launch(headless: bool) -> Result<Self> {
        info!("Launching Chrome (headless: {headless})...");

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1440, 900)))
            .idle_browser_timeout(Duration::from_secs(60 * 60))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab().context("Failed to open a tab")?;

        Ok(Self { _browser: browser, tab })
    }

    /// Matches of `locator`; no match is an empty list
    fn elements(&self, locator: &Locator) -> Vec<Element<'_>> {
        let found = match self.tab.find_elements(&locator.css) {
            Ok(found) => found,
            Err(e) => {
                debug!("no match for {}: {e}", locator.css);
                return Vec::new();
            }
        };
        if locator.text.is_none() {
            return found;
        }
        found
            .into_iter()
            .filter(|element| {
                element
                    .get_inner_text()
                    .map(|text| locator.accepts(&text))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl PageSource for ChromePage {
    fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigating to {url}");
        self.tab
            .navigate_to(url)
            .with_context(|| format!("Failed to open {url}"))?
            .wait_until_navigated()
            .with_context(|| format!("Navigation to {url} did not finish"))?;
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        // get_url() is cached target info that outlives the window
        let location = self
            .tab
            .evaluate("window.location.href", false)
            .context("Browser is not responding")?;
        location
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Page reported no location"))
    }

    fn html(&self) -> Result<String> {
        self.tab.get_content().context("Failed to read page HTML")
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.elements(locator)
            .iter()
            .map(|element| element.get_inner_text().context("Failed to read element text"))
            .collect()
    }

    fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        match self.elements(locator).first() {
            Some(element) => element.get_attribute_value(name),
            None => Ok(None),
        }
    }

    fn click(&mut self, locator: &Locator) -> Result<bool> {
        match self.elements(locator).first() {
            Some(element) => {
                element.click().with_context(|| format!("Failed to click {}", locator.css))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn click_all(&mut self, locator: &Locator) -> Result<usize> {
        let elements = self.elements(locator);
        for element in &elements {
            element.click().with_context(|| format!("Failed to click {}", locator.css))?;
        }
        Ok(elements.len())
    }

    fn type_text(&mut self, locator: &Locator, text: &str) -> Result<bool> {
        match self.elements(locator).first() {
            Some(element) => {
                element
                    .call_js_fn(CARET_TO_END_JS, vec![], false)
                    .with_context(|| format!("Failed to focus {}", locator.css))?;
                self.tab
                    .type_str(text)
                    .with_context(|| format!("Failed to type into {}", locator.css))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn press_key(&mut self, locator: &Locator, key: Key) -> Result<bool> {
        match self.elements(locator).first() {
            Some(element) => {
                if let Some(direction) = key.scroll_direction() {
                    element
                        .call_js_fn(SCROLL_JS, vec![json!(direction)], false)
                        .with_context(|| format!("Failed to scroll {}", locator.css))?;
                } else {
                    element
                        .focus()
                        .with_context(|| format!("{} is not focusable", locator.css))?;
                    self.tab
                        .press_key(key.as_str())
                        .with_context(|| format!("Failed to press {} on {}", key.as_str(), locator.css))?;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        let cookies = self.tab.get_cookies().context("Failed to read cookies")?;
        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
            })
            .collect())
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .context("Failed to capture screenshot")
    }

    fn exists(&self, locator: &Locator) -> Result<bool> {
        Ok(!self.elements(locator).is_empty())
    }
}

use crate::error::ScoutError;
use anyhow::{anyhow, Context, Result};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// CSS selector plus an optional case-insensitive text filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub text: Option<String>,
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: None,
        }
    }

    /// `<tag data-testid="id">`
    pub fn test_id(tag: &str, id: &str) -> Self {
        Self::css(format!("{tag}[data-testid=\"{id}\"]"))
    }

    /// Only elements whose text contains `needle`
    pub fn containing(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    /// Descendants of this locator's matches (drops the text filter)
    pub fn descendant(&self, css: &str) -> Self {
        Self::css(format!("{} {}", self.css, css))
    }

    /// Whether `text` passes the filter, comparing with whitespace collapsed
    pub fn accepts(&self, text: &str) -> bool {
        match &self.text {
            None => true,
            Some(needle) => normalize(text).contains(&normalize(needle)),
        }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Keys the crawlers send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    PageDown,
    PageUp,
    ArrowDown,
    Enter,
}

impl Key {
    /// DevTools key name
    pub fn as_str(self) -> &'static str {
        match self {
            Key::PageDown => "PageDown",
            Key::PageUp => "PageUp",
            Key::ArrowDown => "ArrowDown",
            Key::Enter => "Enter",
        }
    }

    /// Scroll direction of the paging keys; `None` for keys that need focus
    pub fn scroll_direction(self) -> Option<i32> {
        match self {
            Key::PageDown => Some(1),
            Key::PageUp => Some(-1),
            Key::ArrowDown | Key::Enter => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

/// What the crawlers need from a browser session.
///
/// Every element operation acts on matches of a [`Locator`]. An element
/// that is not there is a normal outcome reported as `false`/`None`/empty,
/// not an error.
pub trait PageSource {
    fn navigate(&mut self, url: &str) -> Result<()>;

    /// Fails once the browser has gone away
    fn current_url(&self) -> Result<String>;

    /// Serialized DOM of the current page
    fn html(&self) -> Result<String>;

    /// Rendered text of every match, in document order
    fn texts(&self, locator: &Locator) -> Result<Vec<String>>;

    /// Attribute of the first match
    fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// Click the first match; `false` if there is none
    fn click(&mut self, locator: &Locator) -> Result<bool>;

    /// Click every match, returning how many were clicked
    fn click_all(&mut self, locator: &Locator) -> Result<usize>;

    /// Append `text` to the first match's value. Repeated calls keep
    /// appending at the end of what is already there.
    fn type_text(&mut self, locator: &Locator, text: &str) -> Result<bool>;

    /// Paging keys scroll the first match, or the window when the match
    /// does not scroll itself. Other keys go to the focused match, which
    /// must be focusable.
    fn press_key(&mut self, locator: &Locator, key: Key) -> Result<bool>;

    fn cookies(&self) -> Result<Vec<Cookie>>;

    /// PNG bytes of the viewport
    fn screenshot(&self) -> Result<Vec<u8>>;

    fn exists(&self, locator: &Locator) -> Result<bool> {
        Ok(!self.texts(locator)?.is_empty())
    }

    fn text(&self, locator: &Locator) -> Result<Option<String>> {
        Ok(self.texts(locator)?.into_iter().next())
    }

    /// Poll until `locator` matches or `timeout` elapses
    fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let start = Instant::now();
        loop {
            if self.exists(locator)? {
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(ScoutError::ElementTimeout {
                    selector: locator.css.clone(),
                    timeout,
                }
                .into());
            }
            thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
        }
    }

    fn navigate_if_needed(&mut self, url: &str) -> Result<()> {
        if self.current_url()? != url {
            self.navigate(url)?;
        }
        Ok(())
    }
}

/// Absolute hrefs of every `css` match in `html`, resolved against `base`
pub fn collect_links(html: &str, base: &str, css: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e:?}"))?;
    let base = Url::parse(base).with_context(|| format!("invalid page url {base}"))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_filter_ignores_case_and_spacing() {
        let locator = Locator::css("button").containing("Show more");
        assert!(locator.accepts("  SHOW\n   more details"));
        assert!(!locator.accepts("Show less"));
        assert!(Locator::css("button").accepts("anything"));
    }

    #[test]
    fn only_paging_keys_scroll() {
        assert_eq!(Key::PageDown.scroll_direction(), Some(1));
        assert_eq!(Key::PageUp.scroll_direction(), Some(-1));
        assert_eq!(Key::Enter.scroll_direction(), None);
        assert_eq!(Key::ArrowDown.scroll_direction(), None);
    }

    #[test]
    fn test_id_and_descendant_build_css() {
        let locator = Locator::test_id("div", "card-content").descendant("a");
        assert_eq!(locator.css, "div[data-testid=\"card-content\"] a");
    }

    #[test]
    fn links_resolve_against_page() {
        let html = r#"<div class="card"><a href="/detail/1">one</a></div>
            <div class="card"><a href="https://other.example/2">two</a></div>
            <div class="card"><a href="">empty</a><a>none</a></div>"#;
        let links = collect_links(html, "https://www.realtor.com/search/pg-2", "div.card a").unwrap();
        assert_eq!(links, vec!["https://www.realtor.com/detail/1", "https://other.example/2"]);
    }
}

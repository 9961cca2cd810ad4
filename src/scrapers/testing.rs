//! Static-HTML stand-in for a browser session.

use crate::scrapers::page::{Cookie, Key, Locator, PageSource};
use anyhow::{anyhow, bail, Result};
use scraper::{ElementRef, Html, Selector};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use url::Url;

/// Serves registered HTML documents by URL and records every interaction.
///
/// Clicking an `<a href>` navigates to the resolved href. Clicking or
/// pressing a non-paging key on a routed selector navigates to its route.
/// Non-paging keys need a focusable match, as in Chrome.
#[derive(Default)]
pub struct HtmlPage {
    pages: HashMap<String, String>,
    current: String,
    visits: Vec<String>,
    typed: Vec<(String, String)>,
    values: HashMap<String, String>,
    routes: HashMap<String, String>,
    /// `current_url` answers this many more times, then fails
    closing: Cell<Option<usize>>,
    keys: Vec<(String, Key)>,
    clicks: Vec<String>,
    reads: RefCell<Vec<String>>,
    /// Selector -> remaining lookups before it stops matching
    vanishing: RefCell<HashMap<String, usize>>,
}

impl HtmlPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, url: &str, html: &str) -> &mut Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Make `css` stop matching after `lookups` lookups
    pub fn vanish_after(&mut self, css: &str, lookups: usize) -> &mut Self {
        self.vanishing.borrow_mut().insert(css.to_string(), lookups);
        self
    }

    /// Interacting with `css` loads `url`, like a script-driven form submit
    pub fn route(&mut self, css: &str, url: &str) -> &mut Self {
        self.routes.insert(css.to_string(), url.to_string());
        self
    }

    /// Simulate the window closing after `answers` more `current_url` calls
    pub fn close_after(&mut self, answers: usize) -> &mut Self {
        self.closing.set(Some(answers));
        self
    }

    /// Everything typed into `css` so far
    pub fn value(&self, css: &str) -> Option<&str> {
        self.values.get(css).map(String::as_str)
    }

    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    pub fn typed(&self) -> &[(String, String)] {
        &self.typed
    }

    pub fn keys(&self) -> &[(String, Key)] {
        &self.keys
    }

    pub fn clicks(&self) -> &[String] {
        &self.clicks
    }

    /// Selectors whose text or presence was queried
    pub fn reads(&self) -> Vec<String> {
        self.reads.borrow().clone()
    }

    fn with_matches<T>(&self, locator: &Locator, f: impl FnOnce(Vec<ElementRef<'_>>) -> T) -> Result<T> {
        self.reads.borrow_mut().push(locator.css.clone());

        if let Some(remaining) = self.vanishing.borrow_mut().get_mut(&locator.css) {
            if *remaining == 0 {
                return Ok(f(Vec::new()));
            }
            *remaining -= 1;
        }

        let html = self.pages.get(&self.current).map(String::as_str).unwrap_or_default();
        let document = Html::parse_document(html);
        let selector =
            Selector::parse(&locator.css).map_err(|e| anyhow!("invalid selector {}: {e:?}", locator.css))?;
        let matches = document
            .select(&selector)
            .filter(|element| locator.accepts(&element_text(element)))
            .collect();
        Ok(f(matches))
    }

    fn follow_route(&mut self, css: &str) -> Result<()> {
        if let Some(url) = self.routes.get(css).cloned() {
            self.navigate(&url)?;
        }
        Ok(())
    }
}

/// Text nodes trimmed and joined line by line, roughly like `innerText`
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn focusable(element: &ElementRef<'_>) -> bool {
    let element = element.value();
    matches!(element.name(), "a" | "button" | "input" | "select" | "textarea")
        || element.attr("tabindex").is_some()
}

impl PageSource for HtmlPage {
    fn navigate(&mut self, url: &str) -> Result<()> {
        if !self.pages.contains_key(url) {
            bail!("no fixture for {url}");
        }
        self.current = url.to_string();
        self.visits.push(url.to_string());
        Ok(())
    }

    fn current_url(&self) -> Result<String> {
        match self.closing.get() {
            Some(0) => bail!("browser window closed"),
            Some(n) => self.closing.set(Some(n - 1)),
            None => {}
        }
        Ok(self.current.clone())
    }

    fn html(&self) -> Result<String> {
        Ok(self.pages.get(&self.current).cloned().unwrap_or_default())
    }

    fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        self.with_matches(locator, |matches| matches.iter().map(element_text).collect())
    }

    fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.with_matches(locator, |matches| {
            matches
                .first()
                .and_then(|element| element.value().attr(name))
                .map(str::to_string)
        })
    }

    fn click(&mut self, locator: &Locator) -> Result<bool> {
        let href = self.with_matches(locator, |matches| {
            matches
                .first()
                .map(|element| element.value().attr("href").map(str::to_string))
        })?;
        let Some(href) = href else {
            return Ok(false);
        };

        self.clicks.push(locator.css.clone());
        if let Some(href) = href {
            let target = Url::parse(&self.current)?.join(&href)?;
            self.navigate(target.as_str())?;
        } else {
            self.follow_route(&locator.css)?;
        }
        Ok(true)
    }

    fn click_all(&mut self, locator: &Locator) -> Result<usize> {
        let count = self.with_matches(locator, |matches| matches.len())?;
        for _ in 0..count {
            self.clicks.push(locator.css.clone());
        }
        Ok(count)
    }

    fn type_text(&mut self, locator: &Locator, text: &str) -> Result<bool> {
        if !self.exists(locator)? {
            return Ok(false);
        }
        self.typed.push((locator.css.clone(), text.to_string()));
        self.values.entry(locator.css.clone()).or_default().push_str(text);
        Ok(true)
    }

    fn press_key(&mut self, locator: &Locator, key: Key) -> Result<bool> {
        let Some(can_focus) = self.with_matches(locator, |matches| matches.first().map(focusable))? else {
            return Ok(false);
        };
        if key.scroll_direction().is_none() {
            if !can_focus {
                bail!("{} is not focusable", locator.css);
            }
            self.follow_route(&locator.css)?;
        }
        self.keys.push((locator.css.clone(), key));
        Ok(true)
    }

    fn cookies(&self) -> Result<Vec<Cookie>> {
        let domain = Url::parse(&self.current)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        Ok(vec![Cookie {
            name: "session".to_string(),
            value: "fixture".to_string(),
            domain,
        }])
    }

    fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.zillow.com/homes/";

    fn page() -> HtmlPage {
        let mut page = HtmlPage::new();
        page.add(
            URL,
            r#"<html><body><div id="grid"><p>cards</p></div><input id="q"><button id="go">Go</button></body></html>"#,
        );
        page.navigate(URL).unwrap();
        page
    }

    #[test]
    fn paging_keys_scroll_any_element() {
        let mut page = page();
        assert!(page.press_key(&Locator::css("body"), Key::PageDown).unwrap());
        assert!(page.press_key(&Locator::css("#grid"), Key::PageUp).unwrap());
        assert_eq!(page.keys().len(), 2);
    }

    #[test]
    fn other_keys_need_a_focusable_match() {
        let mut page = page();
        let err = page.press_key(&Locator::css("#grid"), Key::Enter).unwrap_err();
        assert!(err.to_string().contains("not focusable"));
        assert!(page.press_key(&Locator::css("#q"), Key::Enter).unwrap());
        assert!(!page.press_key(&Locator::css("#missing"), Key::Enter).unwrap());
    }

    #[test]
    fn typing_appends_to_the_value() {
        let mut page = page();
        for c in "San Jose,".chars() {
            page.type_text(&Locator::css("#q"), &c.to_string()).unwrap();
        }
        assert_eq!(page.value("#q"), Some("San Jose,"));
    }

    #[test]
    fn closed_window_fails_current_url() {
        let mut page = page();
        page.close_after(1);
        assert_eq!(page.current_url().unwrap(), URL);
        assert!(page.current_url().is_err());
    }
}

use crate::error::ScoutError;
use crate::scrapers::crawler::{crawl, PageStep, SearchPager};
use crate::scrapers::page::{collect_links, Key, Locator, PageSource};
use crate::scrapers::traits::ListingProvider;
use crate::scrapers::types::{jitter, pause, CrawlConfig, SearchQuery};
use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

const HOME: &str = "https://www.zillow.com";
const CONTAINER: &str = ".layout-static-column-container";
const CAPTCHA: &str = "#px-captcha-modal";
const RESULTS: &str = "#search-page-list-container";
const CARD_LINKS: &str = "div[data-testid=\"property-card-data\"] > a";
const PAGINATION: &str = "div[data-testid=\"search-pagination\"]";
const SEARCH_INPUT: &str = "div[data-testid=\"search-bar-container\"] input";
const LISTING_TYPE_MODAL: &str = "div[aria-label=\"Choose listing type\"] button";
const SORT_MENU: &str = "button[data-test=\"sort-popover-dropdown-button\"]";
const SORT_NEWEST: &str = "button[data-value=\"days\"]";

/// Collapsed sections opened before reading
const COLLAPSED: [&str; 2] = ["description", "facts-and-features-wrapper-footer"];
const REGIONS: [&str; 4] = [
    "home-details-chip-container",
    "description",
    "facts-and-features-module",
    "seller-attribution",
];
const LABELED_REGIONS: [&str; 1] = ["At a glance facts"];

/// Price ceiling used when only a floor is given
const DEFAULT_PRICE_MAX: u64 = 10_000_000;

/// zillow.com adapter
pub struct ZillowProvider {
    config: CrawlConfig,
}

impl ZillowProvider {
    pub fn new(config: CrawlConfig) -> Self {
        Self { config }
    }

    /// Wait out the anti-bot interstitial, failing once it outlives
    /// `captcha_timeout`.
    fn wait_for_challenge(&self, page: &mut dyn PageSource) -> Result<()> {
        let captcha = Locator::css(CAPTCHA);
        if !page.exists(&captcha)? {
            return Ok(());
        }

        let start = Instant::now();
        while page.exists(&captcha)? {
            warn!("must solve captcha!");
            if start.elapsed() >= self.config.captcha_timeout {
                return Err(ScoutError::ChallengeTimeout(self.config.captcha_timeout).into());
            }
            pause(self.config.captcha_poll);
        }
        info!("captcha cleared");
        Ok(())
    }

    fn scroll_body(&self, page: &mut dyn PageSource) -> Result<()> {
        let body = Locator::css("body");
        for key in [Key::PageDown, Key::PageUp] {
            for _ in 0..5 {
                page.press_key(&body, key)?;
                pause(self.config.scroll_pause);
            }
        }
        Ok(())
    }

    /// Scroll the results list so lazy cards render, then read their links
    fn visit_search_page(&self, page: &mut dyn PageSource) -> Result<Vec<String>> {
        let grid = Locator::css(RESULTS);
        page.wait_for(&grid, self.config.element_timeout)?;
        for _ in 0..10 {
            page.press_key(&grid, Key::PageDown)?;
            pause(self.config.scroll_pause / 2);
        }

        collect_links(&page.html()?, &page.current_url()?, CARD_LINKS)
    }

    /// Rewrite the JSON `searchQueryState` value of a results URL with the
    /// query's price and contingent filters.
    pub fn filtered_url(current: &str, query: &SearchQuery) -> Result<String> {
        let mut url = Url::parse(current).with_context(|| format!("invalid results url {current}"))?;
        let (key, state) = url
            .query_pairs()
            .find(|(key, _)| key == "searchQueryState")
            .or_else(|| url.query_pairs().next())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .ok_or_else(|| anyhow!("results url carries no filter payload: {current}"))?;

        let mut state: Value =
            serde_json::from_str(&state).with_context(|| format!("filter payload is not json: {state}"))?;
        let filters = state
            .as_object_mut()
            .ok_or_else(|| anyhow!("filter payload is not an object"))?
            .entry("filterState")
            .or_insert_with(|| json!({}));
        let filters = filters
            .as_object_mut()
            .ok_or_else(|| anyhow!("filterState is not an object"))?;

        if query.price_min.is_some() || query.price_max.is_some() {
            filters.insert(
                "price".to_string(),
                json!({
                    "min": query.price_min.unwrap_or(0),
                    "max": query.price_max.unwrap_or(DEFAULT_PRICE_MAX),
                }),
            );
        }
        filters.insert("pnd".to_string(), json!({ "value": query.show_contingent }));

        let payload = serde_json::to_string(&state)?;
        url.query_pairs_mut().clear().append_pair(&key, &payload);
        Ok(url.into())
    }
}

impl ListingProvider for ZillowProvider {
    fn is_listing_page(&self, url: &str) -> bool {
        url.contains("homedetails")
    }

    fn fetch_listing_text(&self, page: &mut dyn PageSource, url: &str) -> Result<String> {
        debug!("{url} - expanding property details");
        page.navigate_if_needed(url)?;

        page.wait_for(&Locator::css(CONTAINER), self.config.element_timeout)?;
        self.wait_for_challenge(page)?;
        page.wait_for(&Locator::css("body"), self.config.element_timeout)?;
        self.scroll_body(page)?;

        // Enter rather than click, clicks trip unrelated handlers
        for section in COLLAPSED {
            let button = Locator::test_id("div", section).descendant("button");
            if !page.press_key(&button, Key::Enter)? {
                debug!("{url} - no {section} toggle");
            }
            pause(self.config.input_pause);
        }

        let mut text = Vec::with_capacity(REGIONS.len() + LABELED_REGIONS.len() + 1);
        text.push(page.texts(&Locator::css(CONTAINER).descendant("dt"))?.join(" "));
        for region in REGIONS {
            match page.text(&Locator::test_id("div", region))? {
                Some(region_text) => text.push(region_text),
                None => debug!("{url} - region {region} not rendered"),
            }
        }
        for label in LABELED_REGIONS {
            match page.text(&Locator::css(format!("div[aria-label=\"{label}\"]")))? {
                Some(region_text) => text.push(region_text),
                None => debug!("{url} - region {label:?} not rendered"),
            }
        }

        jitter(self.config.settle_ceiling);
        Ok(text.join("\n"))
    }

    fn search(&self, page: &mut dyn PageSource, query: &SearchQuery) -> Result<Vec<String>> {
        page.navigate(HOME)?;
        let input = Locator::css(SEARCH_INPUT);
        page.wait_for(&input, self.config.element_timeout)?;

        debug!("applying the search");
        page.type_text(&input, &query.location.search_text())?;
        pause(self.config.input_pause);
        page.press_key(&input, Key::Enter)?;
        pause(self.config.input_pause);

        if page.click(&Locator::css(LISTING_TYPE_MODAL))? {
            debug!("for sale/rent modal dismissed");
        }

        // the filter payload only shows up in the url after a sort change
        let grid = Locator::css(RESULTS);
        page.wait_for(&grid, self.config.element_timeout)?;
        if !page.click(&Locator::css(SORT_MENU))? {
            warn!("no sort control on {}, the url may lack a filter payload", page.current_url()?);
        } else {
            pause(self.config.input_pause);
            if !page.click(&Locator::css(SORT_NEWEST))? {
                warn!("sort menu has no newest-first option");
            }
            pause(self.config.input_pause);
            page.wait_for(&grid, self.config.element_timeout)?;
        }

        let current = page.current_url()?;
        let search_url = Self::filtered_url(&current, query)?;
        debug!("modified the search url from {current} to {search_url}");
        page.navigate(&search_url)?;

        let max_page = page
            .text(&Locator::css(PAGINATION))?
            .and_then(|text| {
                text.split(|c: char| !c.is_ascii_digit())
                    .filter(|n| !n.is_empty())
                    .last()
                    .and_then(|n| n.parse::<usize>().ok())
            })
            .unwrap_or(1);
        info!("{max_page} pages to search through!");

        let mut pager = ZillowPager { provider: self };
        crawl(page, &mut pager, &self.config)
    }
}

/// Follows the "next" arrow until it is missing or disabled
struct ZillowPager<'a> {
    provider: &'a ZillowProvider,
}

impl ZillowPager<'_> {
    fn next_arrow() -> Locator {
        Locator::css(format!("{PAGINATION} a[rel=\"next\"]"))
    }
}

impl SearchPager for ZillowPager<'_> {
    fn harvest(&mut self, page: &mut dyn PageSource) -> Result<Vec<String>> {
        self.provider.visit_search_page(page)
    }

    fn advance(&mut self, page: &mut dyn PageSource, _visited: usize) -> Result<PageStep> {
        let next = Self::next_arrow();
        if !page.exists(&next)? {
            return Ok(PageStep::Done);
        }
        if page.attribute(&next, "aria-disabled")?.as_deref() == Some("true") {
            return Ok(PageStep::Done);
        }
        Ok(PageStep::Click(next))
    }
}

use crate::error::ScoutError;
use crate::scrapers::crawler::{crawl, PageStep, SearchPager};
use crate::scrapers::page::{collect_links, Key, Locator, PageSource};
use crate::scrapers::traits::ListingProvider;
use crate::scrapers::types::{jitter, pause, CrawlConfig, LocationFilter, SearchQuery};
use anyhow::{Context, Result};
use regex::RegexBuilder;
use tracing::{debug, info, warn};
use url::Url;

const SEARCH_ROOT: &str = "https://www.realtor.com/realestateandhomes-search";
const DETAILS: &str = "[id=\"Property details\"]";
const CARD_LINKS: &str = "div[data-testid=\"card-content\"] a";
const PAGINATION: &str = "div[aria-label=\"pagination\"]";

/// Regions read, in order, ahead of the full details section
const REGIONS: [&str; 6] = [
    "for-sale",
    "ldp-agent-overview",
    "ldp-list-price",
    "ldp-home-facts",
    "ldp-highlighted-facts",
    "ldp-commute-time",
];

fn end_of_results() -> Locator {
    Locator::css("p").containing("nd of matching")
}

/// realtor.com adapter
pub struct RealtorProvider {
    config: CrawlConfig,
}

impl RealtorProvider {
    pub fn new(config: CrawlConfig) -> Self {
        Self { config }
    }

    /// Search URL with filters encoded as path segments, e.g.
    /// `.../San-Jose_CA/price-na-400000/pnd-ctg-hide/`
    pub fn search_url(query: &SearchQuery) -> String {
        let mut tokens = vec![SEARCH_ROOT.to_string()];

        tokens.push(match &query.location {
            LocationFilter::CityState { city, state } => {
                format!("{}_{}", city.split_whitespace().collect::<Vec<_>>().join("-"), state)
            }
            LocationFilter::Zip(zip) => zip.clone(),
        });

        if query.price_min.is_some() || query.price_max.is_some() {
            let bound = |v: Option<u64>| v.map_or_else(|| "na".to_string(), |v| v.to_string());
            tokens.push(format!("price-{}-{}", bound(query.price_min), bound(query.price_max)));
        }
        if !query.show_contingent {
            tokens.push("pnd-ctg-hide".to_string());
        }

        format!("{}/", tokens.join("/"))
    }

    /// `url` with its last path segment set to `pg-<number>`
    pub fn page_url(url: &str, number: usize) -> Result<String> {
        let mut parsed = Url::parse(url).with_context(|| format!("invalid search url {url}"))?;
        let mut segments: Vec<String> = parsed
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();
        if segments.last().is_some_and(|s| s.starts_with("pg-")) {
            segments.pop();
        }
        segments.push(format!("pg-{number}"));

        parsed.set_query(None);
        parsed.set_fragment(None);
        parsed.set_path(&format!("/{}", segments.join("/")));
        Ok(parsed.into())
    }

    /// Highest page number in the pagination control's text
    pub fn max_page(pagination_text: &str) -> Result<usize> {
        let regex = RegexBuilder::new(r"(\d+)\nnext")
            .multi_line(true)
            .case_insensitive(true)
            .build()?;
        regex
            .captures(pagination_text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| ScoutError::PaginationInvariant(pagination_text.to_string()).into())
    }

    /// Scroll until the end marker or the pagination control renders, then
    /// read every result card link.
    fn visit_search_page(&self, page: &mut dyn PageSource) -> Result<Vec<String>> {
        let url = page.current_url()?;
        debug!("scraping page {url}");
        page.wait_for(&Locator::css(CARD_LINKS), self.config.element_timeout)?;

        let body = Locator::css("body");
        let mut scrolls = 0;
        loop {
            if page.exists(&end_of_results())? || page.exists(&Locator::css(PAGINATION))? {
                break;
            }
            if scrolls >= self.config.max_scrolls {
                warn!("no pagination control after {scrolls} scrolls on {url}, reading what rendered");
                break;
            }
            page.press_key(&body, Key::PageDown)?;
            pause(self.config.scroll_pause / 2);
            scrolls += 1;
        }

        collect_links(&page.html()?, &page.current_url()?, CARD_LINKS)
    }
}

impl ListingProvider for RealtorProvider {
    fn is_listing_page(&self, url: &str) -> bool {
        url.contains("realestateandhomes-detail")
    }

    fn fetch_listing_text(&self, page: &mut dyn PageSource, url: &str) -> Result<String> {
        debug!("{url} - expanding property details");
        page.navigate_if_needed(url)?;

        let details = Locator::css(DETAILS);
        page.wait_for(&details, self.config.element_timeout)?;
        let expanded = page.click_all(&details.descendant("button").containing("show more"))?;
        debug!("{url} - expanded {expanded} sections");

        let mut text = Vec::with_capacity(REGIONS.len() + 1);
        for region in REGIONS {
            match page.text(&Locator::css(format!("[data-testid=\"{region}\"]")))? {
                Some(region_text) => text.push(region_text),
                None => debug!("{url} - region {region} not rendered"),
            }
        }
        text.push(page.text(&details)?.unwrap_or_default());

        jitter(self.config.settle_ceiling);
        Ok(text.join("\n"))
    }

    fn search(&self, page: &mut dyn PageSource, query: &SearchQuery) -> Result<Vec<String>> {
        let search_url = Self::search_url(query);
        info!("{search_url}");
        page.navigate_if_needed(&search_url)?;

        let mut pager = RealtorPager {
            provider: self,
            max_page: None,
            base: String::new(),
        };
        crawl(page, &mut pager, &self.config)
    }

    /// Types the address one character at a time; a pasted address leaves
    /// the autocomplete drop-down out of step with the input.
    fn populate_commute(&self, page: &mut dyn PageSource, url: &str, address: &str) -> Result<bool> {
        debug!("looking for the commute button");
        page.navigate_if_needed(url)?;
        page.wait_for(&Locator::css(DETAILS), self.config.element_timeout)?;

        let add = Locator::test_id("button", "ldp-commute-time-btn").containing("add a commute");
        if !page.click(&add)? {
            debug!("no commute button on {url}");
            return Ok(true);
        }

        debug!("inputting the commute {address:?}");
        let modal = Locator::css("#ldp-commute-time-modal");
        page.wait_for(&modal, self.config.element_timeout)?;
        let input = modal.descendant("#searchbox-input");

        let tokens: Vec<&str> = address.split(',').collect();
        for token in &tokens[..tokens.len() - 1] {
            for c in token.chars() {
                page.type_text(&input, &c.to_string())?;
            }
            page.type_text(&input, ",")?;
        }

        debug!("sending keys down and enter");
        pause(self.config.autocomplete_pause);
        page.press_key(&input, Key::ArrowDown)?;
        pause(self.config.input_pause);
        page.press_key(&input, Key::Enter)?;

        debug!("looking for the confirm button");
        pause(self.config.autocomplete_pause);
        let confirm = Locator::test_id("button", "update-commute-button").containing("add commute");
        if !page.click(&confirm)? {
            warn!("commute confirm button missing on {url}");
        }
        pause(self.config.autocomplete_pause);

        Ok(true)
    }
}

/// Numbered pages reached by rewriting the last path segment
struct RealtorPager<'a> {
    provider: &'a RealtorProvider,
    max_page: Option<usize>,
    base: String,
}

impl SearchPager for RealtorPager<'_> {
    fn harvest(&mut self, page: &mut dyn PageSource) -> Result<Vec<String>> {
        self.provider.visit_search_page(page)
    }

    fn advance(&mut self, page: &mut dyn PageSource, visited: usize) -> Result<PageStep> {
        let max_page = match self.max_page {
            Some(max_page) => max_page,
            None => {
                if page.exists(&end_of_results())? {
                    return Ok(PageStep::Done);
                }
                let Some(text) = page.text(&Locator::css(PAGINATION))? else {
                    warn!("no pagination control, treating results as a single page");
                    return Ok(PageStep::Done);
                };
                let max_page = RealtorProvider::max_page(&text)?;
                info!("{max_page} pages to search through");
                self.base = page.current_url()?;
                self.max_page = Some(max_page);
                max_page
            }
        };

        if visited >= max_page {
            return Ok(PageStep::Done);
        }
        Ok(PageStep::Navigate(RealtorProvider::page_url(&self.base, visited + 1)?))
    }
}

//! Walks a provider's search result pages until the provider reports that
//! there is nothing further.

use crate::scrapers::page::{Locator, PageSource};
use crate::scrapers::types::{jitter, CrawlConfig};
use anyhow::Result;
use std::collections::HashSet;
use tracing::{info, warn};

/// How to reach the next result page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStep {
    Navigate(String),
    Click(Locator),
    Done,
}

/// Provider-specific half of the pagination loop
pub trait SearchPager {
    /// Listing URLs on the page currently loaded
    fn harvest(&mut self, page: &mut dyn PageSource) -> Result<Vec<String>>;

    /// Decide what follows page number `visited` (1-based)
    fn advance(&mut self, page: &mut dyn PageSource, visited: usize) -> Result<PageStep>;
}

/// Harvest the loaded page, then follow `pager` until it returns
/// [`PageStep::Done`]. URLs are de-duplicated in discovery order.
pub fn crawl(page: &mut dyn PageSource, pager: &mut dyn SearchPager, config: &CrawlConfig) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    let mut visited = 1;

    let mut collect = |found: Vec<String>, urls: &mut Vec<String>| {
        for url in found {
            if seen.insert(url.clone()) {
                urls.push(url);
            }
        }
    };

    collect(pager.harvest(page)?, &mut urls);
    info!("scraped page 1, {} urls discovered so far", urls.len());

    loop {
        if config.max_pages.is_some_and(|max| visited >= max) {
            warn!("stopping at the {visited} page limit");
            break;
        }

        match pager.advance(page, visited)? {
            PageStep::Done => break,
            PageStep::Navigate(url) => page.navigate(&url)?,
            PageStep::Click(locator) => {
                if !page.click(&locator)? {
                    warn!("next page control {} vanished", locator.css);
                    break;
                }
            }
        }
        visited += 1;

        collect(pager.harvest(page)?, &mut urls);
        info!("scraped page {visited}, {} urls discovered so far", urls.len());
        jitter(config.page_delay_ceiling);
    }

    info!("found {} urls", urls.len());
    Ok(urls)
}

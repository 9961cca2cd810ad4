use crate::scrapers::page::PageSource;
use crate::scrapers::types::SearchQuery;
use anyhow::Result;

/// Per-site browser logic.
/// Adding a site means a new rule table plus one implementation of this trait.
pub trait ListingProvider {
    /// Whether `url` is a single listing's detail page on this site
    fn is_listing_page(&self, url: &str) -> bool;

    /// Assemble the raw text blob for one listing
    fn fetch_listing_text(&self, page: &mut dyn PageSource, url: &str) -> Result<String>;

    /// Run a search and walk every result page, returning listing URLs
    fn search(&self, page: &mut dyn PageSource, query: &SearchQuery) -> Result<Vec<String>>;

    /// Attach a commute estimate to the listing page. Sites without the
    /// feature have nothing to do and report success.
    fn populate_commute(&self, _page: &mut dyn PageSource, _url: &str, _address: &str) -> Result<bool> {
        Ok(true)
    }
}

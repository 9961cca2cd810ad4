//! One run: URLs in, cached text, parsed listings and aggregate files out.

use crate::cache::{cache_key, ListingCache};
use crate::error::ScoutError;
use crate::extract::extract;
use crate::models::{Listing, MortgageTerms, Provider};
use crate::output::{read_url_list, write_url_list, AggregateWriter, MergeStrategy};
use crate::scrapers::types::pause;
use crate::scrapers::{
    CrawlConfig, ListingProvider, PageSource, RealtorProvider, SearchQuery, ZillowProvider,
};
use crate::snapshot::SnapshotSaver;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const BROWSE_POLL: Duration = Duration::from_millis(200);

/// Output name for browse and search runs
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

struct Providers {
    realtor: RealtorProvider,
    zillow: ZillowProvider,
}

impl Providers {
    fn get(&self, provider: Provider) -> &dyn ListingProvider {
        match provider {
            Provider::Realtor => &self.realtor,
            Provider::Zillow => &self.zillow,
        }
    }
}

/// A browser session plus everything a run writes to
pub struct Session<P: PageSource> {
    page: P,
    providers: Providers,
    cache: ListingCache,
    output: AggregateWriter,
    output_dir: PathBuf,
    terms: MortgageTerms,
    commute: Option<String>,
    snapshots: Option<SnapshotSaver>,
    fetches: usize,
}

impl<P: PageSource> Session<P> {
    pub fn new(
        page: P,
        output_dir: &Path,
        terms: MortgageTerms,
        config: CrawlConfig,
        merge: MergeStrategy,
    ) -> Result<Self> {
        Ok(Self {
            page,
            providers: Providers {
                realtor: RealtorProvider::new(config.clone()),
                zillow: ZillowProvider::new(config),
            },
            cache: ListingCache::new(output_dir)?,
            output: AggregateWriter::new(output_dir, merge),
            output_dir: output_dir.to_path_buf(),
            terms,
            commute: None,
            snapshots: None,
            fetches: 0,
        })
    }

    /// Address to estimate commutes to, where the site supports it
    pub fn with_commute(mut self, address: Option<String>) -> Self {
        self.commute = address.filter(|a| !a.trim().is_empty());
        self
    }

    /// Save a snapshot of every listing visited while browsing
    pub fn with_snapshots(mut self, root: impl Into<PathBuf>) -> Self {
        self.snapshots = Some(SnapshotSaver::new(root));
        self
    }

    #[cfg(test)]
    pub fn page(&self) -> &P {
        &self.page
    }

    /// Listings read from the browser rather than the cache
    #[cfg(test)]
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// Cache lookup, browser fetch on a miss, extraction and mortgage math
    /// for one URL. `ordinal` names the cache entry of a URL without a path.
    pub fn process(&mut self, url: &str, ordinal: usize) -> Result<Listing> {
        if url.contains("rentals") {
            return Err(ScoutError::RentalListing(url.to_string()).into());
        }
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let provider = Provider::from_host(&host).ok_or_else(|| ScoutError::UnsupportedProvider(host.clone()))?;

        let key = cache_key(url, ordinal);
        let text = match self.cache.read(&key)? {
            Some(entry) => {
                info!("from file:    {url}");
                if entry.url != url {
                    warn!("cache entry {key} was written for {}", entry.url);
                }
                entry.text
            }
            None => {
                info!("from browser: {url}");
                let text = self.providers.get(provider).fetch_listing_text(&mut self.page, url)?;
                self.fetches += 1;
                self.cache.write(&key, url, &text)?;
                text
            }
        };

        let mut listing = extract(&text, &host)?;
        listing.link = url.to_string();
        listing.calculate(&self.terms);
        Ok(listing)
    }

    /// Process every URL, logging and skipping the ones that fail
    pub fn ingest(&mut self, urls: &[String]) -> Vec<Listing> {
        let total = urls.len();
        let mut listings = Vec::with_capacity(total);

        for (i, url) in urls.iter().enumerate() {
            debug!("{} / {} - {url}", i + 1, total);
            match self.process(url, i) {
                Ok(listing) => {
                    debug!("discovered property: {listing}");
                    listings.push(listing);
                }
                Err(e) => error!("{} / {} - skipping {url}: {e:#}", i + 1, total),
            }
        }
        listings
    }

    /// Ingest a URL list file into `<file stem>.json` / `.csv`
    pub fn ingest_file(&mut self, path: &Path) -> Result<Vec<Listing>> {
        let urls = read_url_list(path)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "urls".to_string());

        if let Some(address) = self.commute.clone() {
            let last_realtor = urls
                .iter()
                .rev()
                .find(|u| Provider::from_url(u) == Some(Provider::Realtor));
            if let Some(url) = last_realtor {
                if let Err(e) = self.providers.realtor.populate_commute(&mut self.page, url, &address) {
                    warn!("could not populate commute: {e:#}");
                }
            }
        }

        info!("url processing");
        let listings = self.ingest(&urls);
        self.output.write(&stem, listings)
    }

    /// Follow the user around the browser, processing each listing page
    /// they open, until the browser goes away or `stop` is raised. What was
    /// collected is written either way.
    pub fn browse(&mut self, stop: &AtomicBool) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        let mut last = String::new();
        let mut visited = 0;
        let mut commute_done = self.commute.is_none();

        while !stop.load(Ordering::Relaxed) {
            let url = match self.page.current_url() {
                Ok(url) => url.trim().to_string(),
                Err(e) => {
                    warn!("driver is likely dead: {e:#}");
                    break;
                }
            };
            if url == last {
                pause(BROWSE_POLL);
                continue;
            }
            last = url.clone();

            let Some(provider) = Provider::from_url(&url) else {
                debug!("not a listing site: {url}");
                continue;
            };
            if !self.providers.get(provider).is_listing_page(&url) {
                continue;
            }
            visited += 1;

            if provider == Provider::Realtor && !commute_done {
                if let Some(address) = &self.commute {
                    if let Err(e) = self.providers.realtor.populate_commute(&mut self.page, &url, address) {
                        warn!("could not populate commute: {e:#}");
                    }
                }
                commute_done = true;
            }

            match self.process(&url, visited) {
                Ok(listing) => {
                    info!("discovered property: {listing}");
                    listings.push(listing);
                }
                Err(e) => error!("{visited} - skipping {url}: {e:#}"),
            }

            if let Some(saver) = self.snapshots.as_mut() {
                if let Err(e) = saver.save(&self.page) {
                    warn!("could not save snapshot: {e:#}");
                }
            }
        }

        if stop.load(Ordering::Relaxed) {
            warn!("ctrl + c detected!");
        }
        self.output.write(&today(), listings)
    }

    /// Crawl both sites, save the URL list as `<date>.urls`, then ingest it
    pub fn search(&mut self, query: &SearchQuery) -> Result<Vec<Listing>> {
        let zillow = self.search_provider(Provider::Zillow, query);
        let realtor = self.search_provider(Provider::Realtor, query);

        let urls: Vec<String> = realtor.into_iter().chain(zillow).collect();
        if urls.is_empty() {
            warn!("search found nothing");
            return Ok(Vec::new());
        }

        let url_file = self.output_dir.join(format!("{}.urls", today()));
        write_url_list(&url_file, &urls)?;
        self.ingest_file(&url_file)
    }

    /// One site's results; a failed site yields nothing
    fn search_provider(&mut self, provider: Provider, query: &SearchQuery) -> Vec<String> {
        match self.providers.get(provider).search(&mut self.page, query) {
            Ok(urls) => {
                info!("{provider}: {} urls", urls.len());
                urls
            }
            Err(e) => {
                error!("{provider} search failed: {e:#}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RateSnapshot;
    use crate::output::load_json;
    use crate::scrapers::testing::HtmlPage;
    use std::fs;
    use std::sync::Arc;
    use std::thread;

    const HOME_A: &str = "https://www.realtor.com/realestateandhomes-detail/1300-E-San-Antonio-St_M1";
    const HOME_B: &str = "https://www.realtor.com/realestateandhomes-detail/742-Evergreen-Ter_M2";

    fn listing_html(price: &str, address: &str) -> String {
        format!(
            r#"<html><body>
            <div data-testid="ldp-agent-overview">
                <p>Listed by John A. Mcdougall III</p><p>Brokered by Reliant Realty</p></div>
            <div data-testid="ldp-list-price"><p>${price}</p></div>
            <div data-testid="ldp-home-facts"><p>2</p><p>bed</p><p>1</p><p>bath</p><p>{address}</p></div>
            <div id="Property details"><p>Property type</p><p>Single family</p><p>Year built</p><p>2021</p></div>
            </body></html>"#
        )
    }

    fn fixture() -> HtmlPage {
        let mut page = HtmlPage::new();
        page.add(HOME_A, &listing_html("139,990", "1300 E San Antonio St Spc 67, San Jose, CA 95116"));
        page.add(HOME_B, &listing_html("848,000", "742 Evergreen Ter, Campbell, CA 95008"));
        page
    }

    fn session(page: HtmlPage, dir: &Path, merge: MergeStrategy) -> Session<HtmlPage> {
        let terms = MortgageTerms::new(RateSnapshot {
            rate_30: 6.088,
            rate_20: 6.0,
            rate_15: 5.5,
        });
        Session::new(page, dir, terms, CrawlConfig::immediate(), merge).unwrap()
    }

    fn url_file(dir: &Path) -> PathBuf {
        let path = dir.join("homes.urls");
        fs::write(&path, format!("# two homes\n{HOME_A}\n\n{HOME_B}\n")).unwrap();
        path
    }

    #[test]
    fn process_fetches_caches_and_calculates() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(fixture(), dir.path(), MergeStrategy::Append);

        let listing = session.process(HOME_B, 0).unwrap();
        assert_eq!(listing.link, HOME_B);
        assert_eq!(listing.address, "742 Evergreen Ter, Campbell, CA 95008");
        assert_eq!(listing.price, 848000.0);
        assert_eq!(listing.bed, 2);
        assert_eq!(listing.property_type, "Single family");
        assert_eq!(listing.listing_agent, "John A. Mcdougall III");
        assert_eq!(listing.monthly_30, 4106.0);
        assert_eq!(listing.per_person, 2053.0);
        assert_eq!(session.fetches(), 1);

        let cached = fs::read_to_string(dir.path().join("742-Evergreen-Ter_M2.txt")).unwrap();
        assert!(cached.starts_with(&format!("{HOME_B}\n")));
    }

    #[test]
    fn second_ingest_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let urls = url_file(dir.path());

        let mut first = session(fixture(), dir.path(), MergeStrategy::Append);
        let written = first.ingest_file(&urls).unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(first.fetches(), 2);

        // no fixtures: any browser fetch would fail
        let mut second = session(HtmlPage::new(), dir.path(), MergeStrategy::Append);
        let written = second.ingest_file(&urls).unwrap();
        assert_eq!(second.fetches(), 0);
        assert!(second.page().visits().is_empty());
        assert_eq!(written.len(), 4);
        assert_eq!(written[0], written[2]);
        assert_eq!(load_json(&dir.path().join("homes.json")).unwrap().len(), 4);
    }

    #[test]
    fn upsert_keeps_one_record_per_url() {
        let dir = tempfile::tempdir().unwrap();
        let urls = url_file(dir.path());

        session(fixture(), dir.path(), MergeStrategy::Upsert).ingest_file(&urls).unwrap();
        let written = session(HtmlPage::new(), dir.path(), MergeStrategy::Upsert)
            .ingest_file(&urls)
            .unwrap();
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn failing_urls_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(fixture(), dir.path(), MergeStrategy::Append);

        let urls = vec![
            "https://www.redfin.com/CA/San-Jose/home/1".to_string(),
            "https://www.realtor.com/rentals/details/1".to_string(),
            HOME_A.to_string(),
            "https://www.realtor.com/realestateandhomes-detail/not-in-fixture".to_string(),
        ];
        let listings = session.ingest(&urls);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].link, HOME_A);

        let err = session.process(&urls[0], 0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScoutError>(),
            Some(ScoutError::UnsupportedProvider(host)) if host == "www.redfin.com"
        ));
        let err = session.process(&urls[1], 1).unwrap_err();
        assert!(matches!(err.downcast_ref::<ScoutError>(), Some(ScoutError::RentalListing(_))));
    }

    #[test]
    fn commute_runs_on_last_realtor_url() {
        let dir = tempfile::tempdir().unwrap();
        let urls = url_file(dir.path());
        let mut session = session(fixture(), dir.path(), MergeStrategy::Append)
            .with_commute(Some("1 Washington Sq, San Jose, CA, 95112".to_string()));

        session.ingest_file(&urls).unwrap();
        assert_eq!(session.page().visits().first().map(String::as_str), Some(HOME_B));
    }

    #[test]
    fn browse_flushes_when_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = fixture();
        page.navigate(HOME_A).unwrap();
        let mut session = session(page, dir.path(), MergeStrategy::Append).with_snapshots(dir.path().join("pages"));

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(500));
            flag.store(true, Ordering::Relaxed);
        });

        let listings = session.browse(&stop).unwrap();
        stopper.join().unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].link, HOME_A);
        assert!(dir.path().join(format!("{}.json", today())).is_file());
        assert!(dir.path().join("pages").join("0").join("metadata.json").is_file());
    }

    #[test]
    fn browse_ends_when_browser_closes() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = fixture();
        page.navigate(HOME_A).unwrap();
        // one answer for the poll, one for the fetch, one repeat poll
        page.close_after(3);
        let mut session = session(page, dir.path(), MergeStrategy::Append);

        let stop = AtomicBool::new(false);
        let listings = session.browse(&stop).unwrap();

        assert!(!stop.load(Ordering::Relaxed));
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].link, HOME_A);
        assert_eq!(load_json(&dir.path().join(format!("{}.json", today()))).unwrap().len(), 1);
    }

    #[test]
    fn search_collects_urls_then_ingests() {
        let dir = tempfile::tempdir().unwrap();
        let query = SearchQuery::new(Some("San Jose"), Some("CA"), None).unwrap();

        let mut page = fixture();
        page.add(
            &RealtorProvider::search_url(&query),
            r#"<html><body>
                <div data-testid="card-content">
                    <a href="/realestateandhomes-detail/1300-E-San-Antonio-St_M1">A</a></div>
                <p>End of matching results</p>
            </body></html>"#,
        );

        // zillow.com has no fixture, so that half fails and is skipped
        let mut session = session(page, dir.path(), MergeStrategy::Append);
        let listings = session.search(&query).unwrap();

        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].link, HOME_A);
        let saved = read_url_list(&dir.path().join(format!("{}.urls", today()))).unwrap();
        assert_eq!(saved, vec![HOME_A.to_string()]);
    }
}

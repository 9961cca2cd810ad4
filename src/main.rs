mod cache;
mod error;
mod extract;
mod models;
mod output;
mod pipeline;
mod rates;
mod scrapers;
mod snapshot;

use clap::{Args, Parser, Subcommand};
use models::{Listing, MortgageTerms, RateSnapshot, Rounding};
use output::MergeStrategy;
use pipeline::Session;
use rates::{DatawrapperRates, RateSource};
use scrapers::{ChromePage, CrawlConfig, SearchQuery};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Scrape for-sale listings from realtor.com and zillow.com into CSV/JSON
#[derive(Debug, Parser)]
#[command(name = "listing-scout", version)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    opts: RunOptions,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Scrape every listing URL in a file, one per line
    UrlFile {
        path: PathBuf,
    },
    /// Scrape each listing page opened in the browser until it closes or ctrl + c
    Browse,
    /// Search both sites, save the result URLs, then scrape them
    Search(SearchArgs),
}

#[derive(Debug, Args)]
struct SearchArgs {
    #[arg(long)]
    city: Option<String>,
    /// Two-letter state code
    #[arg(long)]
    state: Option<String>,
    #[arg(long)]
    zip: Option<String>,
    #[arg(long)]
    price_min: Option<u64>,
    #[arg(long)]
    price_max: Option<u64>,
    /// Include contingent and pending listings
    #[arg(long)]
    show_contingent: bool,
}

#[derive(Debug, Args)]
struct RunOptions {
    /// Commute destination, e.g. "1 Washington Sq, San Jose, CA, 95112"
    #[arg(short, long, global = true)]
    commute: Option<String>,

    /// Cache, rate dataset and output files go here
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    headless: bool,

    /// How this run's records combine with the existing output file
    #[arg(long, value_enum, default_value_t = MergeStrategy::Append, global = true)]
    merge: MergeStrategy,

    /// Override the fetched 30-year fixed rate (percent)
    #[arg(long, global = true)]
    rate_30: Option<f64>,

    #[arg(long, global = true)]
    rate_20: Option<f64>,

    #[arg(long, global = true)]
    rate_15: Option<f64>,

    /// Down payment, percent of price
    #[arg(long, default_value_t = 20.0, global = true)]
    down_payment: f64,

    /// Keep monthly payments to the cent instead of whole dollars
    #[arg(long, global = true)]
    exact_payments: bool,

    /// Ceiling of the random pause after each listing
    #[arg(long, default_value_t = 3, global = true)]
    settle_secs: u64,

    #[arg(long, default_value_t = 25, global = true)]
    captcha_timeout_secs: u64,

    /// Save HTML, cookies and a screenshot of every page visited while browsing
    #[arg(long, global = true)]
    save_pages: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

impl RunOptions {
    fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("listing-scout"))
    }

    fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            settle_ceiling: Duration::from_secs(self.settle_secs),
            captcha_timeout: Duration::from_secs(self.captcha_timeout_secs),
            ..CrawlConfig::default()
        }
    }

    fn apply_overrides(&self, rates: RateSnapshot) -> RateSnapshot {
        RateSnapshot {
            rate_30: self.rate_30.unwrap_or(rates.rate_30),
            rate_20: self.rate_20.unwrap_or(rates.rate_20),
            rate_15: self.rate_15.unwrap_or(rates.rate_15),
        }
    }
}

fn init_logging(opts: &RunOptions) {
    let filter = if opts.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn mortgage_terms(opts: &RunOptions, output_dir: &Path) -> MortgageTerms {
    let fetched = match DatawrapperRates::new() {
        Ok(source) => match source.fetch_rates(output_dir).await {
            Ok(rates) => rates,
            Err(e) => {
                warn!("{} rates unavailable ({e:#}), using defaults", source.source_name());
                RateSnapshot::default()
            }
        },
        Err(e) => {
            warn!("{e:#}, using default rates");
            RateSnapshot::default()
        }
    };

    MortgageTerms {
        down_payment: opts.down_payment,
        rounding: if opts.exact_payments { Rounding::Exact } else { Rounding::Whole },
        ..MortgageTerms::new(opts.apply_overrides(fetched))
    }
}

fn print_summary(listings: &[Listing]) {
    for (i, listing) in listings.iter().enumerate() {
        println!("{}. {}", i + 1, listing);
        println!(
            "   30y ${:.0}/mo, total ${:.0}/mo, ${:.0}/person",
            listing.monthly_30, listing.total, listing.per_person
        );
        if !listing.commute.is_empty() {
            println!("   Commute: {}", listing.commute);
        }
        println!("   {}", listing.link);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let opts = &cli.opts;
    init_logging(opts);

    let query = match &cli.mode {
        Mode::Search(args) => Some(
            SearchQuery::new(args.city.as_deref(), args.state.as_deref(), args.zip.as_deref())?
                .with_price(args.price_min, args.price_max)
                .with_contingent(args.show_contingent),
        ),
        _ => None,
    };

    let output_dir = opts.output_dir();
    tokio::fs::create_dir_all(&output_dir).await?;
    info!("writing to \"{}\"", output_dir.display());

    let terms = mortgage_terms(opts, &output_dir).await;
    info!(
        "rates 30y {:.3}% / 20y {:.3}% / 15y {:.3}%, {}% down",
        terms.rates.rate_30, terms.rates.rate_20, terms.rates.rate_15, terms.down_payment
    );

    let page = ChromePage::launch(opts.headless)?;
    let mut session = Session::new(page, &output_dir, terms, opts.crawl_config(), opts.merge)?
        .with_commute(opts.commute.clone());

    let listings = match &cli.mode {
        Mode::UrlFile { path } => session.ingest_file(path)?,
        Mode::Browse => {
            if opts.save_pages {
                session = session.with_snapshots(output_dir.join("pages"));
            }
            let stop = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&stop);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::Relaxed);
                }
            });
            info!("open listing pages in the browser; ctrl + c to finish");
            session.browse(&stop)?
        }
        Mode::Search(_) => match &query {
            Some(query) => session.search(query)?,
            None => Vec::new(),
        },
    };

    print_summary(&listings);
    info!("{} listings in \"{}\"", listings.len(), output_dir.display());
    Ok(())
}

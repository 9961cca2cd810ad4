use crate::error::ScoutError;
use crate::models::RateSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DATASET_URL: &str = "https://datawrapper.dwcdn.net/cHKhW/56/dataset.csv";
const DATASET_FILE: &str = "dataset.csv";
const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
);

/// Where current mortgage rates come from
#[async_trait]
pub trait RateSource: Send + Sync {
    /// 30/20/15-year fixed rates; `cache_dir` may hold a downloaded copy
    async fn fetch_rates(&self, cache_dir: &Path) -> Result<RateSnapshot>;

    fn source_name(&self) -> &'static str;
}

/// Semicolon-delimited rate table published through Datawrapper
pub struct DatawrapperRates {
    client: Client,
    url: String,
}

impl DatawrapperRates {
    pub fn new() -> Result<Self> {
        Self::with_url(DATASET_URL)
    }

    pub fn with_url(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn download(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch mortgage rates")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch mortgage rates: {}", response.status());
        }
        response.text().await.context("Failed to read response body")
    }
}

#[async_trait]
impl RateSource for DatawrapperRates {
    async fn fetch_rates(&self, cache_dir: &Path) -> Result<RateSnapshot> {
        let stored = cache_dir.join(DATASET_FILE);

        let dataset = match self.download().await {
            Ok(dataset) => {
                tokio::fs::create_dir_all(cache_dir).await?;
                tokio::fs::write(&stored, &dataset)
                    .await
                    .with_context(|| format!("failed to write {}", stored.display()))?;
                debug!("saved rate dataset to {}", stored.display());
                dataset
            }
            Err(e) if stored.is_file() => {
                warn!("{e:#}, using {}", stored.display());
                tokio::fs::read_to_string(&stored).await?
            }
            Err(e) => return Err(e),
        };

        parse_rates(&dataset)
    }

    fn source_name(&self) -> &'static str {
        "Datawrapper"
    }
}

#[derive(Debug, Deserialize)]
struct RateRow {
    #[serde(rename = "Loan Term")]
    term: String,
    #[serde(rename = "Interest Rate")]
    rate: f64,
}

/// Pick the three fixed-term rates out of the dataset. Terms that are
/// missing keep the default snapshot's rate.
pub fn parse_rates(dataset: &str) -> Result<RateSnapshot> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .trim(csv::Trim::All)
        .from_reader(dataset.as_bytes());

    let (mut rate_30, mut rate_20, mut rate_15) = (None, None, None);
    for row in reader.deserialize::<RateRow>() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!("skipping rate row: {e}");
                continue;
            }
        };
        match row.term.as_str() {
            "30-Year Fixed" => rate_30 = Some(row.rate),
            "20-Year Fixed" => rate_20 = Some(row.rate),
            "15-Year Fixed" => rate_15 = Some(row.rate),
            _ => {}
        }
    }

    if rate_30.is_none() && rate_20.is_none() && rate_15.is_none() {
        return Err(ScoutError::MissingRates.into());
    }

    let defaults = RateSnapshot::default();
    let pick = |rate: Option<f64>, fallback: f64, term: &str| {
        rate.unwrap_or_else(|| {
            warn!("no {term} rate in dataset, assuming {fallback}%");
            fallback
        })
    };
    let snapshot = RateSnapshot {
        rate_30: pick(rate_30, defaults.rate_30, "30-year"),
        rate_20: pick(rate_20, defaults.rate_20, "20-year"),
        rate_15: pick(rate_15, defaults.rate_15, "15-year"),
    };
    info!("30 Year mortgage rate of {:.2}%", snapshot.rate_30);
    Ok(snapshot)
}

//! Aggregated run output.
//!
//! Each run writes `<stem>.json` and `<stem>.csv` from the records of the run
//! merged with whatever `<stem>.json` already held.

use crate::models::Listing;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// How a run's records combine with records already on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum MergeStrategy {
    /// Keep every record, new ones first. Revisited URLs repeat.
    #[default]
    Append,
    /// One record per link; the newest run wins.
    Upsert,
}

/// Combine this run's records with earlier ones
pub fn merge(new: Vec<Listing>, existing: Vec<Listing>, strategy: MergeStrategy) -> Vec<Listing> {
    match strategy {
        MergeStrategy::Append => new.into_iter().chain(existing).collect(),
        MergeStrategy::Upsert => {
            let mut seen = HashSet::new();
            new.into_iter()
                .chain(existing)
                .filter(|listing| listing.link.is_empty() || seen.insert(listing.link.clone()))
                .collect()
        }
    }
}

pub struct AggregateWriter {
    dir: PathBuf,
    strategy: MergeStrategy,
}

impl AggregateWriter {
    pub fn new(dir: impl Into<PathBuf>, strategy: MergeStrategy) -> Self {
        Self {
            dir: dir.into(),
            strategy,
        }
    }

    pub fn json_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.json"))
    }

    pub fn csv_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.csv"))
    }

    /// Merge `listings` into `<stem>.json` and rewrite both files.
    /// Returns the full merged set; nothing is written for an empty run.
    pub fn write(&self, stem: &str, listings: Vec<Listing>) -> Result<Vec<Listing>> {
        info!("found {} properties", listings.len());
        if listings.is_empty() {
            return Ok(listings);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output dir: {}", self.dir.display()))?;

        let json_path = self.json_path(stem);
        let existing = if json_path.is_file() {
            load_json(&json_path)?
        } else {
            Vec::new()
        };
        let merged = merge(listings, existing, self.strategy);

        let csv_path = self.csv_path(stem);
        write_csv(&csv_path, &merged)?;
        info!("wrote \"{}\"", csv_path.display());

        let json = serde_json::to_string_pretty(&merged)?;
        fs::write(&json_path, json).with_context(|| format!("failed to write {}", json_path.display()))?;
        info!("wrote \"{}\"", json_path.display());

        Ok(merged)
    }
}

pub fn load_json(path: &Path) -> Result<Vec<Listing>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Header is the full field list in declaration order
pub fn write_csv(path: &Path, listings: &[Listing]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(Listing::FIELD_NAMES)?;
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
pub fn read_csv(path: &Path) -> Result<Vec<Listing>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("failed to open {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<Listing>, _>>()
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// URLs from a list file, skipping blank lines and `#` comments
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

pub fn write_url_list(path: &Path, urls: &[String]) -> Result<()> {
    fs::write(path, urls.join("\n")).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote \"{}\"", path.display());
    Ok(())
}

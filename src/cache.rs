//! Per-listing text cache.
//!
//! A listing URL maps to `<dir>/<key>.txt` holding the URL on the first line
//! and the assembled page text after it. A present file means the listing
//! was already fetched. Entries never expire; delete the file to refetch.

use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use url::Url;

/// Filesystem-safe key: the URL's last non-empty path segment, or `ordinal`
/// when there is none.
pub fn cache_key(url: &str, ordinal: usize) -> String {
    let segment = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_string)
    });

    match segment {
        Some(segment) => segment
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || "-_.".contains(c) { c } else { '_' })
            .collect(),
        None => ordinal.to_string(),
    }
}

/// A cached fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub text: String,
}

pub struct ListingCache {
    dir: PathBuf,
}

impl ListingCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache dir: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.txt"))
    }

    pub fn read(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };

        let (url, text) = contents.split_once('\n').unwrap_or((contents.as_str(), ""));
        Ok(Some(CacheEntry {
            url: url.to_string(),
            text: text.to_string(),
        }))
    }

    pub fn write(&self, key: &str, url: &str, text: &str) -> Result<PathBuf> {
        let path = self.path_for(key);
        fs::write(&path, format!("{url}\n{text}"))
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

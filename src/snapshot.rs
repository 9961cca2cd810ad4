use crate::scrapers::page::{Cookie, PageSource};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use url::Url;

#[derive(Debug, Serialize)]
struct SnapshotMetadata<'a> {
    current_uri: &'a str,
    uri: &'a str,
    host: &'a str,
    components: Vec<&'a str>,
    iteration: usize,
    cookies: &'a [Cookie],
}

/// Saves numbered copies of pages (HTML, cookies, screenshot) for offline
/// inspection. Each save goes in its own `<root>/<n>/` directory.
pub struct SnapshotSaver {
    root: PathBuf,
    iteration: usize,
}

impl SnapshotSaver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            iteration: 0,
        }
    }

    #[cfg(test)]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn save(&mut self, page: &dyn PageSource) -> Result<PathBuf> {
        let current_uri = page.current_url()?;
        let uri = current_uri.split('?').next().unwrap_or_default();
        let parsed = Url::parse(uri).with_context(|| format!("cannot snapshot {current_uri}"))?;
        let host = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or_default());
        let components: Vec<&str> = uri.strip_prefix(host.as_str()).unwrap_or(uri).split('/').collect();
        let component = components
            .iter()
            .rev()
            .find(|c| !c.is_empty())
            .copied()
            .unwrap_or("index");

        let dir = self.root.join(self.iteration.to_string());
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        info!("saving {} - {} to \"{}\"", self.iteration, uri, dir.display());

        let cookies = page.cookies()?;
        let metadata = SnapshotMetadata {
            current_uri: &current_uri,
            uri,
            host: &host,
            components: components.clone(),
            iteration: self.iteration,
            cookies: &cookies,
        };
        fs::write(dir.join("metadata.json"), serde_json::to_string_pretty(&metadata)?)?;
        fs::write(dir.join(format!("{component}.html")), page.html()?)?;
        fs::write(
            dir.join(format!("{component}.cookies")),
            serde_json::to_string_pretty(&cookies)?,
        )?;
        let cookie_str = cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        fs::write(dir.join(format!("{component}.cookiestr")), cookie_str)?;
        fs::write(dir.join(format!("{component}.png")), page.screenshot()?)?;

        self.iteration += 1;
        Ok(dir)
    }
}

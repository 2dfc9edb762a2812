//! Search provider contract + the fixture-backed provider implementation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use dejobs_core::{JobRecord, Site};
use thiserror::Error;

pub const CRATE_NAME: &str = "dejobs-providers";

/// One scraping query handed to a provider: a single term at a single
/// location, fanned out across the configured job boards.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub sites: Vec<Site>,
    pub search_term: String,
    pub location: String,
    pub results_wanted: usize,
    pub hours_old: u32,
    pub country_hint: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

#[async_trait]
pub trait JobSearchProvider: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<JobRecord>, ProviderError>;
}

/// Lowercases and collapses punctuation so terms and locations map onto
/// directory and file names ("Berlin, Germany" -> "berlin-germany").
pub fn query_slug(input: &str) -> String {
    input
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Serves search results from JSON files checked into the workspace instead
/// of live board traffic. Layout: `<root>/<term-slug>/<location-slug>.json`,
/// each file a JSON array of job rows. A missing file means the query simply
/// had no captured results.
#[derive(Debug, Clone)]
pub struct FixtureSearchProvider {
    root: PathBuf,
}

impl FixtureSearchProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn fixture_path(&self, search_term: &str, location: &str) -> PathBuf {
        self.root
            .join(query_slug(search_term))
            .join(format!("{}.json", query_slug(location)))
    }
}

#[async_trait]
impl JobSearchProvider for FixtureSearchProvider {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<JobRecord>, ProviderError> {
        let path = self.fixture_path(&request.search_term, &request.location);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut rows = load_fixture_rows(&path)?;
        rows.truncate(request.results_wanted);
        Ok(rows)
    }
}

fn load_fixture_rows(path: &Path) -> Result<Vec<JobRecord>> {
    let data = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
}

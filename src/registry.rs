//! Feed source registry (`feeds.json`).
//!
//! The file maps a group name to a list of sources:
//!
//! ```json
//! {
//!   "economy":  [{"url": "https://…", "title": "Markets", "limit": 4}],
//!   "robotics": [{"url": "https://…", "title": "arXiv cs.RO", "cat": "paper"}]
//! }
//! ```
//!
//! The registry is consumed, never written. A missing or malformed file is
//! not fatal: the run proceeds with no sources and logs why.
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::storage::Category;

const ECONOMY_GROUP: &str = "economy";
const ROBOTICS_GROUP: &str = "robotics";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read feed registry: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid feed registry JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One feed to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub url: String,
    pub display_name: String,
    /// Category the source's entries start from before keyword matching.
    pub category_seed: Category,
    /// Entries considered from this source per run (`None` = all).
    pub item_cap: Option<usize>,
}

impl FeedSource {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>, seed: Category) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
            category_seed: seed,
            item_cap: None,
        }
    }

    pub fn with_item_cap(mut self, cap: usize) -> Self {
        self.item_cap = Some(cap);
        self
    }

    pub fn is_paper(&self) -> bool {
        self.category_seed.is_paper()
    }
}

#[derive(Debug, Deserialize)]
struct SourceRecord {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    cat: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

/// All sources of one run, split by how they are processed.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Transient markets news: enriched, never archived.
    pub economy: Vec<FeedSource>,
    /// Archived robotics news and papers.
    pub robotics: Vec<FeedSource>,
}

impl Registry {
    /// Load the registry, degrading to an empty one on any error.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(registry) => registry,
            Err(RegistryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Feed registry not found, no sources to fetch");
                Self::default()
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load feed registry");
                Self::default()
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let registry = Self::from_json(&content)?;
        tracing::info!(
            economy = registry.economy.len(),
            robotics = registry.robotics.len(),
            "Loaded feed registry"
        );
        Ok(registry)
    }

    pub fn from_json(content: &str) -> Result<Self, RegistryError> {
        let groups: BTreeMap<String, Vec<SourceRecord>> = serde_json::from_str(content)?;
        let mut registry = Self::default();

        for (group, records) in groups {
            let (target, default_seed) = match group.as_str() {
                ECONOMY_GROUP => (&mut registry.economy, Category::Economy),
                ROBOTICS_GROUP => (&mut registry.robotics, Category::Robotics),
                other => {
                    tracing::warn!(group = %other, "Unknown feed group, ignoring");
                    continue;
                }
            };

            target.extend(
                records
                    .into_iter()
                    .filter_map(|record| into_source(record, &default_seed)),
            );
        }

        Ok(registry)
    }

    /// Robotics sources in processing order: general news first, then papers.
    pub fn robotics_passes(&self) -> (Vec<&FeedSource>, Vec<&FeedSource>) {
        self.robotics.iter().partition(|s| !s.is_paper())
    }
}

fn into_source(record: SourceRecord, default_seed: &Category) -> Option<FeedSource> {
    match Url::parse(&record.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            tracing::warn!(url = %record.url, scheme = %url.scheme(), "Skipping feed with unsupported scheme");
            return None;
        }
        Err(e) => {
            tracing::warn!(url = %record.url, error = %e, "Skipping feed with invalid URL");
            return None;
        }
    }

    let display_name = record
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| record.url.clone());
    let category_seed = record
        .cat
        .map(Category::from)
        .unwrap_or_else(|| default_seed.clone());

    Some(FeedSource {
        url: record.url,
        display_name,
        category_seed,
        item_cap: record.limit,
    })
}

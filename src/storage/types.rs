use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while reading or persisting the archive.
///
/// [`ArchiveStore::load`](super::ArchiveStore::load) swallows read errors and
/// starts empty; [`ArchiveStore::try_load`](super::ArchiveStore::try_load)
/// and `save` surface them.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Archive I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive is not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("Failed to serialize archive: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Category
// ============================================================================

/// Topical bucket of a feed source or archived item.
///
/// Serialized as its lowercase name. Strings outside the known set are kept
/// verbatim in [`Category::Other`] so an archive written by a newer keyword
/// table still round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// Markets and economy news. Transient, never archived.
    Economy,
    /// Generic robotics news that matched no specific keyword set.
    Robotics,
    Humanoid,
    /// Hands, grippers and manipulation. Sticky once assigned.
    Hand,
    /// Research paper sub-kind: archived only when reclassified out of it.
    Paper,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Economy => "economy",
            Category::Robotics => "robotics",
            Category::Humanoid => "humanoid",
            Category::Hand => "hand",
            Category::Paper => "paper",
            Category::Other(name) => name,
        }
    }

    pub fn is_paper(&self) -> bool {
        matches!(self, Category::Paper)
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "economy" => Category::Economy,
            "robotics" => Category::Robotics,
            "humanoid" => Category::Humanoid,
            "hand" => Category::Hand,
            "paper" => Category::Paper,
            _ => Category::Other(value),
        }
    }
}

impl From<&str> for Category {
    fn from(value: &str) -> Self {
        Category::from(value.to_string())
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        match value {
            Category::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Archived Item
// ============================================================================

/// Format of [`ArchivedItem::date`]. Lexicographic order equals chronological
/// order, which is what the archive sorts on.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One enriched news item as persisted in the archive file.
///
/// `link` is the primary key. Only `category` changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedItem {
    /// Translated title. Older archives may lack it; `repair` drops those.
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_title: String,
    pub link: String,
    pub date: String,
    #[serde(rename = "source", default)]
    pub source_name: String,
    pub category: Category,
    #[serde(default)]
    pub summary: String,
}

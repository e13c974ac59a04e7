use chrono::{DateTime, Utc};
use thiserror::Error;

use super::parser::RawEntry;
use crate::registry::FeedSource;
use crate::storage::Category;
use crate::util::{clean_html, strip_control_chars};

/// Why a raw entry could not be turned into a [`NormalizedEntry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("entry has no link")]
    MissingLink,
    #[error("entry has no title")]
    MissingTitle,
}

/// Where the resolved publish timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Published,
    Updated,
    /// Neither field was present; the run time was used.
    RunTime,
}

/// The canonical shape every later stage works on.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntry {
    pub title: String,
    pub link: String,
    /// Plain-text description; the title when the feed gave none.
    pub snippet: String,
    pub published_at: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
    pub source_name: String,
    pub category_seed: Category,
}

/// Convert a raw feed entry into a [`NormalizedEntry`].
///
/// Pure: the only input besides the entry and its source is `now`, which
/// stands in for a missing timestamp. Undated entries therefore always look
/// fresh to the recency filter.
pub fn normalize(
    raw: RawEntry,
    source: &FeedSource,
    now: DateTime<Utc>,
) -> Result<NormalizedEntry, NormalizeError> {
    let link = raw
        .link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or(NormalizeError::MissingLink)?;

    let title = raw
        .title
        .map(|t| strip_control_chars(t.trim()).into_owned())
        .filter(|t| !t.is_empty())
        .ok_or(NormalizeError::MissingTitle)?;

    let snippet = raw
        .raw_description
        .as_deref()
        .map(clean_html)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| title.clone());

    let (published_at, timestamp_source) = match (raw.published_at, raw.updated_at) {
        (Some(published), _) => (published, TimestampSource::Published),
        (None, Some(updated)) => (updated, TimestampSource::Updated),
        (None, None) => (now, TimestampSource::RunTime),
    };

    Ok(NormalizedEntry {
        title,
        link,
        snippet,
        published_at,
        timestamp_source,
        source_name: source.display_name.clone(),
        category_seed: source.category_seed.clone(),
    })
}

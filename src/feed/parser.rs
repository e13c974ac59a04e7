use chrono::{DateTime, Utc};
use feed_rs::parser;

/// One entry as it appears in a feed, before normalization.
///
/// Every field is optional here; [`normalize`](super::normalize) decides
/// what is usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    /// RSS `description` or Atom `summary`, falling back to content body.
    pub raw_description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Parse RSS/Atom bytes into raw entries, in feed order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let raw_description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));

            RawEntry {
                title: entry.title.map(|t| t.content),
                link,
                raw_description,
                published_at: entry.published,
                updated_at: entry.updated,
            }
        })
        .collect();

    Ok(entries)
}

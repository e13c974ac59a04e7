//! Admission filters applied to normalized entries before enrichment.
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Link-based duplicate gate.
///
/// Seeded with every link already in the archive; each admitted link is
/// remembered for the rest of the run, so overlapping feeds cannot admit the
/// same entry twice. Exact string match, no content similarity.
#[derive(Debug, Default)]
pub struct DedupGate {
    seen: HashSet<String>,
}

impl DedupGate {
    pub fn new<I, S>(existing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: existing.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` and records the link if it has not been seen before.
    pub fn admit(&mut self, link: &str) -> bool {
        self.seen.insert(link.to_string())
    }

    pub(crate) fn len(&self) -> usize {
        self.seen.len()
    }
}

/// Rejects entries whose age in whole days exceeds the window.
///
/// An entry 7 days and 23 hours old passes a 7-day window; one 8 days old
/// does not. Entries dated in the future are always fresh.
#[derive(Debug, Clone, Copy)]
pub struct RecencyFilter {
    max_age_days: i64,
}

impl RecencyFilter {
    pub fn new(max_age_days: i64) -> Self {
        Self { max_age_days }
    }

    pub fn is_fresh(&self, published_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age: Duration = now.signed_duration_since(published_at);
        age.num_days() <= self.max_age_days
    }
}

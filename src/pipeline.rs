//! One batch run: fetch every source, filter, classify, enrich and archive.
//!
//! Processing is strictly sequential. Every request is awaited before the
//! next begins, so the only pacing needed is the enricher's own cooldown.
use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::classify::{classify, passes_paper_filter};
use crate::enrich::{Enricher, LanguageModel};
use crate::feed::{
    fetch_entries, normalize, FetchPolicy, NormalizedEntry, RawEntry, TimestampSource,
};
use crate::filter::{DedupGate, RecencyFilter};
use crate::registry::{FeedSource, Registry};
use crate::storage::{ArchiveError, ArchiveStore, ArchivedItem, Category, DATE_FORMAT};

/// Per-run caps and windows.
#[derive(Debug, Clone)]
pub struct RunLimits {
    /// Items archived per run across all sources.
    pub max_new_items: usize,
    /// Items archived per run from paper sources.
    pub max_paper_items: usize,
    pub recency_days: i64,
    pub economy_recency_days: i64,
    /// Entries taken from an economy source that sets no `limit`.
    pub economy_items_per_source: usize,
    /// Offset of the archive `date` string from UTC.
    pub utc_offset_hours: i32,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_new_items: 200,
            max_paper_items: 8,
            recency_days: 7,
            economy_recency_days: 3,
            economy_items_per_source: 4,
            utc_offset_hours: 9,
        }
    }
}

/// Items archived so far in this run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub archived: usize,
    /// Subset of `archived` that came from paper sources.
    pub papers: usize,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub archived: usize,
    pub papers: usize,
    /// Entries whose link was already archived or seen earlier in the run.
    pub duplicates: usize,
    /// Entries older than their recency window.
    pub stale: usize,
    /// Paper entries discarded because no keyword moved them out of `paper`.
    pub papers_filtered: usize,
    /// Entries without a link or title.
    pub invalid_entries: usize,
    pub failed_sources: usize,
    /// Items stored with the untranslated fallback text.
    pub fallback_enrichments: usize,
    /// Transient economy items, newest first. Never archived.
    pub economy: Vec<ArchivedItem>,
}

/// Which robotics pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    News,
    Papers,
}

/// Run orchestrator. Owns the HTTP client and the enricher for one run.
pub struct Pipeline<M> {
    http: reqwest::Client,
    fetch: FetchPolicy,
    enricher: Enricher<M>,
    limits: RunLimits,
    offset: FixedOffset,
    probe_models: bool,
    reclassify_on_load: bool,
}

impl<M: LanguageModel> Pipeline<M> {
    pub fn new(
        http: reqwest::Client,
        fetch: FetchPolicy,
        enricher: Enricher<M>,
        limits: RunLimits,
    ) -> Self {
        let offset = FixedOffset::east_opt(limits.utc_offset_hours.saturating_mul(3600))
            .unwrap_or_else(|| {
                tracing::warn!(
                    hours = limits.utc_offset_hours,
                    "Invalid UTC offset, formatting dates in UTC"
                );
                Utc.fix()
            });

        Self {
            http,
            fetch,
            enricher,
            limits,
            offset,
            probe_models: true,
            reclassify_on_load: true,
        }
    }

    pub fn probe_models(mut self, enabled: bool) -> Self {
        self.probe_models = enabled;
        self
    }

    pub fn reclassify_on_load(mut self, enabled: bool) -> Self {
        self.reclassify_on_load = enabled;
        self
    }

    /// Run against the current time.
    pub async fn run(
        &mut self,
        registry: &Registry,
        archive: &mut ArchiveStore,
    ) -> Result<RunReport, ArchiveError> {
        self.run_at(registry, archive, Utc::now()).await
    }

    /// Run as if the clock read `now`.
    ///
    /// The archive is saved exactly once, at the end. A failed save is the
    /// only error; feed and model failures only degrade the report.
    pub async fn run_at(
        &mut self,
        registry: &Registry,
        archive: &mut ArchiveStore,
        now: DateTime<Utc>,
    ) -> Result<RunReport, ArchiveError> {
        let mut report = RunReport::default();

        if self.reclassify_on_load {
            let changed = archive.reclassify();
            if changed > 0 {
                tracing::info!(changed, "Reclassified archived items");
            }
        }

        if self.probe_models {
            if let Some(model) = self.enricher.probe().await {
                tracing::info!(model = %model, "Active model selected");
            }
        }

        self.run_economy(&registry.economy, now, &mut report).await;

        let mut gate = DedupGate::new(archive.links());
        tracing::debug!(known_links = gate.len(), "Dedup gate seeded from archive");
        let mut counters = RunCounters::default();
        let (news, papers) = registry.robotics_passes();

        self.run_pass(Pass::News, &news, now, &mut gate, &mut counters, archive, &mut report)
            .await;
        if counters.archived < self.limits.max_new_items {
            self.run_pass(Pass::Papers, &papers, now, &mut gate, &mut counters, archive, &mut report)
                .await;
        } else {
            tracing::info!("Global item cap reached, skipping paper sources");
        }

        report.archived = counters.archived;
        report.papers = counters.papers;

        archive.save()?;

        tracing::info!(
            archived = report.archived,
            papers = report.papers,
            duplicates = report.duplicates,
            stale = report.stale,
            papers_filtered = report.papers_filtered,
            failed_sources = report.failed_sources,
            fallbacks = report.fallback_enrichments,
            economy = report.economy.len(),
            "Run complete"
        );
        Ok(report)
    }

    async fn run_economy(
        &mut self,
        sources: &[FeedSource],
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) {
        let recency = RecencyFilter::new(self.limits.economy_recency_days);

        for source in sources {
            let cap = source
                .item_cap
                .unwrap_or(self.limits.economy_items_per_source);
            let raw = self.fetch_source(source, report).await;

            for entry in raw.into_iter().take(cap) {
                let Some(entry) = normalize_or_skip(entry, source, now, report) else {
                    continue;
                };
                if !recency.is_fresh(entry.published_at, now) {
                    report.stale += 1;
                    continue;
                }

                let item = self.enrich_item(&entry, Category::Economy, report).await;
                report.economy.push(item);
            }
        }

        report.economy.sort_by(|a, b| b.date.cmp(&a.date));
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pass(
        &mut self,
        pass: Pass,
        sources: &[&FeedSource],
        now: DateTime<Utc>,
        gate: &mut DedupGate,
        counters: &mut RunCounters,
        archive: &mut ArchiveStore,
        report: &mut RunReport,
    ) {
        let recency = RecencyFilter::new(self.limits.recency_days);

        for source in sources {
            if self.cap_reached(pass, counters) {
                return;
            }

            let raw = self.fetch_source(source, report).await;
            let cap = source.item_cap.unwrap_or(usize::MAX);

            for entry in raw.into_iter().take(cap) {
                let Some(entry) = normalize_or_skip(entry, source, now, report) else {
                    continue;
                };

                if !gate.admit(&entry.link) {
                    report.duplicates += 1;
                    continue;
                }
                if self.cap_reached(pass, counters) {
                    tracing::info!(?pass, "Item cap reached, ending pass");
                    return;
                }
                if !recency.is_fresh(entry.published_at, now) {
                    tracing::debug!(link = %entry.link, "Skipping stale entry");
                    report.stale += 1;
                    continue;
                }

                let pre = classify(&entry.title, &entry.snippet, &entry.category_seed);
                let item = self.enrich_item(&entry, pre, report).await;

                if !passes_paper_filter(&entry.category_seed, &item.category) {
                    tracing::debug!(link = %entry.link, "Discarding paper without robotics keywords");
                    report.papers_filtered += 1;
                    continue;
                }

                if archive.append(item) {
                    counters.archived += 1;
                    if pass == Pass::Papers {
                        counters.papers += 1;
                    }
                }
            }
        }
    }

    fn cap_reached(&self, pass: Pass, counters: &RunCounters) -> bool {
        counters.archived >= self.limits.max_new_items
            || (pass == Pass::Papers && counters.papers >= self.limits.max_paper_items)
    }

    async fn fetch_source(&self, source: &FeedSource, report: &mut RunReport) -> Vec<RawEntry> {
        match fetch_entries(&self.http, source, &self.fetch).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(source = %source.display_name, url = %source.url, error = %e, "Feed fetch failed");
                report.failed_sources += 1;
                Vec::new()
            }
        }
    }

    /// Enrich an entry and build its archive record. `seed` is the category
    /// before enrichment; the translated text is classified again from it,
    /// except for economy items, which keep their category.
    async fn enrich_item(
        &mut self,
        entry: &NormalizedEntry,
        seed: Category,
        report: &mut RunReport,
    ) -> ArchivedItem {
        let enrichment = self.enricher.enrich(&entry.title, &entry.snippet).await;
        if enrichment.outcome.is_fallback() {
            report.fallback_enrichments += 1;
        }

        let category = if seed == Category::Economy {
            seed
        } else {
            classify(&enrichment.title, &enrichment.summary, &seed)
        };

        ArchivedItem {
            title: enrichment.title,
            original_title: entry.title.clone(),
            link: entry.link.clone(),
            date: entry
                .published_at
                .with_timezone(&self.offset)
                .format(DATE_FORMAT)
                .to_string(),
            source_name: entry.source_name.clone(),
            category,
            summary: enrichment.summary,
        }
    }
}

fn normalize_or_skip(
    raw: RawEntry,
    source: &FeedSource,
    now: DateTime<Utc>,
    report: &mut RunReport,
) -> Option<NormalizedEntry> {
    match normalize(raw, source, now) {
        Ok(entry) => {
            if entry.timestamp_source == TimestampSource::RunTime {
                tracing::debug!(
                    source = %source.display_name,
                    link = %entry.link,
                    "Entry has no date, using run time"
                );
            }
            Some(entry)
        }
        Err(e) => {
            tracing::debug!(source = %source.display_name, reason = %e, "Skipping invalid entry");
            report.invalid_entries += 1;
            None
        }
    }
}

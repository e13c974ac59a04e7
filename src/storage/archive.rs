use std::collections::HashSet;
use std::path::PathBuf;

use super::types::{ArchiveError, ArchivedItem, Category};
use crate::classify::classify;
use crate::util::write_atomic;

/// Marker left in titles by a broken encoding round trip.
const GARBLED_MARKER: &str = "????";

/// The bounded, link-unique archive of enriched items.
///
/// Held fully in memory for the duration of a run and written back once with
/// [`ArchiveStore::save`]. Persisted order is `date` descending.
#[derive(Debug)]
pub struct ArchiveStore {
    path: PathBuf,
    items: Vec<ArchivedItem>,
    max_items: usize,
}

impl ArchiveStore {
    /// Empty store that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>, max_items: usize) -> Self {
        Self {
            path: path.into(),
            items: Vec::new(),
            max_items,
        }
    }

    /// Load the archive at `path` for a run.
    ///
    /// Never fails. A missing file yields an empty store; an unreadable or
    /// corrupt one is logged and also yields an empty store, which the next
    /// save overwrites.
    pub fn load(path: impl Into<PathBuf>, max_items: usize) -> Self {
        let path = path.into();
        match Self::try_load(path.clone(), max_items) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot load archive, starting empty");
                Self::new(path, max_items)
            }
        }
    }

    /// Load the archive at `path`, failing on unreadable or corrupt content.
    ///
    /// A missing file is still an empty store. Later duplicates of a link are
    /// dropped.
    pub fn try_load(path: impl Into<PathBuf>, max_items: usize) -> Result<Self, ArchiveError> {
        let mut store = Self::new(path, max_items);

        let content = match std::fs::read(&store.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %store.path.display(), "No archive yet, starting empty");
                return Ok(store);
            }
            Err(e) => return Err(ArchiveError::Io(e)),
        };

        let items: Vec<ArchivedItem> =
            serde_json::from_slice(&content).map_err(ArchiveError::Parse)?;

        let total = items.len();
        let mut seen = HashSet::with_capacity(total);
        store.items = items
            .into_iter()
            .filter(|item| seen.insert(item.link.clone()))
            .collect();

        if store.items.len() < total {
            tracing::warn!(
                dropped = total - store.items.len(),
                "Dropped duplicate links from archive"
            );
        }
        tracing::info!(path = %store.path.display(), items = store.items.len(), "Loaded archive");
        Ok(store)
    }

    /// Strictly load the archive at `path`, apply `op`, and save only when
    /// `op` reports changes. Returns the change count and the item count.
    ///
    /// Used by maintenance commands, which must never replace a corrupt
    /// archive with an empty one.
    pub fn maintain<F>(
        path: impl Into<PathBuf>,
        max_items: usize,
        op: F,
    ) -> Result<(usize, usize), ArchiveError>
    where
        F: FnOnce(&mut Self) -> usize,
    {
        let mut store = Self::try_load(path, max_items)?;
        let changed = op(&mut store);
        if changed > 0 {
            store.save()?;
        } else {
            tracing::info!(path = %store.path.display(), "Nothing changed, archive left untouched");
        }
        Ok((changed, store.len()))
    }

    pub fn items(&self) -> &[ArchivedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.link.as_str())
    }

    pub fn contains(&self, link: &str) -> bool {
        self.items.iter().any(|item| item.link == link)
    }

    /// Add an item in memory. Returns `false` if its link is already present.
    pub fn append(&mut self, item: ArchivedItem) -> bool {
        if self.contains(&item.link) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// Re-run the classifier over every item, seeding with its current
    /// category. Items without a title are left alone. Returns how many
    /// categories changed.
    pub fn reclassify(&mut self) -> usize {
        let mut changed = 0;
        for item in self.items.iter_mut().filter(|item| !item.title.is_empty()) {
            let category = classify(&item.title, &item.summary, &item.category);
            if category != item.category {
                tracing::debug!(
                    link = %item.link,
                    from = %item.category,
                    to = %category,
                    "Reclassified archived item"
                );
                item.category = category;
                changed += 1;
            }
        }
        changed
    }

    /// Sort newest first and evict everything past `max_items`.
    ///
    /// The sort is stable, so items sharing a date keep their relative order.
    /// Returns the evicted items.
    pub fn truncate(&mut self) -> Vec<ArchivedItem> {
        self.items.sort_by(|a, b| b.date.cmp(&a.date));
        if self.items.len() <= self.max_items {
            return Vec::new();
        }
        self.items.split_off(self.max_items)
    }

    /// Truncate, then atomically replace the archive file with pretty JSON.
    pub fn save(&mut self) -> Result<(), ArchiveError> {
        let evicted = self.truncate();
        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), "Evicted oldest archive items");
        }

        let json = serde_json::to_vec_pretty(&self.items)?;
        write_atomic(&self.path, &json)?;
        tracing::info!(path = %self.path.display(), items = self.items.len(), "Saved archive");
        Ok(())
    }

    /// Up to `n` items of `category`, newest first.
    pub fn latest(&self, category: &Category, n: usize) -> Vec<&ArchivedItem> {
        let mut matching: Vec<&ArchivedItem> = self
            .items
            .iter()
            .filter(|item| item.category == *category)
            .collect();
        matching.sort_by(|a, b| b.date.cmp(&a.date));
        matching.truncate(n);
        matching
    }

    /// Drop items whose title is empty, garbled, or still wrapped in
    /// markdown. Returns how many were removed.
    pub fn repair(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| {
            let title = item.title.trim();
            !(title.is_empty() || title.contains(GARBLED_MARKER) || title.starts_with("**"))
        });
        before - self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn item(link: &str, date: &str, title: &str, category: Category) -> ArchivedItem {
        ArchivedItem {
            title: title.to_string(),
            original_title: String::new(),
            link: link.to_string(),
            date: date.to_string(),
            source_name: "Test".to_string(),
            category,
            summary: String::new(),
        }
    }

    fn links(store: &ArchiveStore) -> Vec<&str> {
        store.links().collect()
    }

    #[test]
    fn test_missing_or_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(ArchiveStore::load(dir.path().join("none.json"), 10).is_empty());

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(ArchiveStore::load(&path, 10).is_empty());
    }

    #[test]
    fn test_try_load_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[{ truncated").unwrap();

        let result = ArchiveStore::try_load(&path, 10);
        assert!(matches!(result, Err(ArchiveError::Parse(_))));
        assert!(ArchiveStore::try_load(dir.path().join("none.json"), 10)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_maintain_never_overwrites_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        let corrupt = r#"[{"title": "정상 제목", "link": "https://ok", "date": "d", "category": "robotics"}, TRUNC"#;
        std::fs::write(&path, corrupt).unwrap();

        let result = ArchiveStore::maintain(&path, 10, ArchiveStore::repair);
        assert!(matches!(result, Err(ArchiveError::Parse(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), corrupt);
    }

    #[test]
    fn test_maintain_skips_save_without_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        let compact = serde_json::to_string(&vec![item(
            "https://ok",
            "2026-01-01 00:00",
            "정상 제목",
            Category::Robotics,
        )])
        .unwrap();
        std::fs::write(&path, &compact).unwrap();

        assert_eq!(ArchiveStore::maintain(&path, 10, ArchiveStore::repair).unwrap(), (0, 1));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), compact);
    }

    #[test]
    fn test_maintain_saves_when_items_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        let items = vec![
            item("https://ok", "2026-01-02 00:00", "정상 제목", Category::Robotics),
            item("https://md", "2026-01-01 00:00", "**굵은 제목**", Category::Robotics),
        ];
        std::fs::write(&path, serde_json::to_vec(&items).unwrap()).unwrap();

        assert_eq!(ArchiveStore::maintain(&path, 10, ArchiveStore::repair).unwrap(), (1, 1));
        assert_eq!(links(&ArchiveStore::try_load(&path, 10).unwrap()), vec!["https://ok"]);
    }

    #[test]
    fn test_load_drops_duplicate_links_keeping_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        let items = vec![
            item("https://a", "2026-01-02 10:00", "first", Category::Robotics),
            item("https://a", "2026-01-01 10:00", "second", Category::Robotics),
        ];
        std::fs::write(&path, serde_json::to_vec(&items).unwrap()).unwrap();

        let store = ArchiveStore::load(&path, 10);
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].title, "first");
    }

    #[test]
    fn test_append_rejects_existing_link() {
        let mut store = ArchiveStore::new("unused.json", 10);
        assert!(store.append(item("https://a", "2026-01-01 00:00", "A", Category::Robotics)));
        assert!(!store.append(item("https://a", "2026-01-02 00:00", "B", Category::Hand)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_truncate_evicts_oldest() {
        let mut store = ArchiveStore::new("unused.json", 2);
        store.append(item("https://old", "2026-01-01 09:00", "A", Category::Robotics));
        store.append(item("https://new", "2026-01-03 09:00", "B", Category::Robotics));
        store.append(item("https://mid", "2026-01-02 09:00", "C", Category::Robotics));

        let evicted = store.truncate();
        assert_eq!(links(&store), vec!["https://new", "https://mid"]);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].link, "https://old");
    }

    #[test]
    fn test_save_writes_sorted_pretty_utf8_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.json");
        let mut store = ArchiveStore::new(&path, 10);
        store.append(item("https://1", "2026-01-01 09:00", "휴머노이드", Category::Humanoid));
        store.append(item("https://2", "2026-01-05 09:00", "그리퍼", Category::Hand));
        store.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("휴머노이드"), "non-ASCII must not be escaped");
        assert!(text.contains("\n  {"), "output is pretty-printed");

        let reloaded = ArchiveStore::load(&path, 10);
        assert_eq!(links(&reloaded), vec!["https://2", "https://1"]);
    }

    #[test]
    fn test_reclassify_upgrades_but_never_downgrades_hand() {
        let mut store = ArchiveStore::new("unused.json", 10);
        store.append(item("https://1", "d", "New gripper", Category::Robotics));
        store.append(item("https://2", "d", "Plain news", Category::Hand));
        store.append(item("https://3", "d", "", Category::Paper));

        assert_eq!(store.reclassify(), 1);
        let categories: Vec<_> = store.items().iter().map(|i| i.category.clone()).collect();
        assert_eq!(categories, vec![Category::Hand, Category::Hand, Category::Paper]);
        assert_eq!(store.reclassify(), 0);
    }

    #[test]
    fn test_latest_filters_and_orders() {
        let mut store = ArchiveStore::new("unused.json", 10);
        store.append(item("https://h1", "2026-01-01 00:00", "A", Category::Hand));
        store.append(item("https://r1", "2026-01-04 00:00", "B", Category::Robotics));
        store.append(item("https://h2", "2026-01-03 00:00", "C", Category::Hand));
        store.append(item("https://h3", "2026-01-02 00:00", "D", Category::Hand));

        let latest: Vec<_> = store
            .latest(&Category::Hand, 2)
            .into_iter()
            .map(|i| i.link.as_str())
            .collect();
        assert_eq!(latest, vec!["https://h2", "https://h3"]);
    }

    #[test]
    fn test_repair_drops_broken_titles() {
        let mut store = ArchiveStore::new("unused.json", 10);
        store.append(item("https://ok", "d", "정상 제목", Category::Robotics));
        store.append(item("https://empty", "d", "  ", Category::Robotics));
        store.append(item("https://garbled", "d", "로봇 ???? 공개", Category::Robotics));
        store.append(item("https://md", "d", "**굵은 제목**", Category::Robotics));

        assert_eq!(store.repair(), 3);
        assert_eq!(links(&store), vec!["https://ok"]);
    }
}

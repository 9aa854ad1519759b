//! StateCache - authoritative in-memory volume state
//!
//! Two maps over [`VolumeRecord`]: one keyed by the ephemeral tab id, one by
//! the durable page address. Every mutation is applied here first and then
//! handed to the [`Persister`].

use std::collections::HashMap;

use tracing::{debug, info, warn};
use volumestore::{KvStore, StoreError, StoreKey};

use crate::domain::validate::{is_valid_tab_id, normalize_page_address};
use crate::domain::{RecordDraft, TabId, VolumeRecord};

use super::persist::Persister;

/// Counts from a startup hydration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HydrateSummary {
    pub tabs: usize,
    pub addresses: usize,
    pub skipped: usize,
}

/// In-memory volume state with write-through persistence
#[derive(Debug)]
pub struct StateCache {
    by_tab: HashMap<TabId, VolumeRecord>,
    by_address: HashMap<String, VolumeRecord>,
    persister: Persister,
}

impl StateCache {
    /// Create an empty cache writing through `persister`
    pub fn new(persister: Persister) -> Self {
        Self {
            by_tab: HashMap::new(),
            by_address: HashMap::new(),
            persister,
        }
    }

    /// Load every durable key once
    ///
    /// Keys outside both families are skipped. Malformed values are coerced
    /// to defaults field by field.
    pub async fn hydrate(&mut self, store: &dyn KvStore) -> Result<HydrateSummary, StoreError> {
        debug!("StateCache::hydrate: called");
        let entries = store.get_all().await?;
        let mut summary = HydrateSummary::default();

        for (key, value) in entries {
            match StoreKey::parse(&key) {
                Some(StoreKey::Tab(tab_id)) if is_valid_tab_id(tab_id) => {
                    self.by_tab.insert(tab_id, VolumeRecord::from_stored(&value));
                    summary.tabs += 1;
                }
                Some(StoreKey::Address(raw)) => {
                    let Some(address) = normalize_page_address(&raw) else {
                        debug!(%key, "StateCache::hydrate: skipping untracked page address");
                        summary.skipped += 1;
                        continue;
                    };
                    // a key already in normal form beats a legacy spelling of it
                    let canonical = address == raw;
                    if !canonical && self.by_address.contains_key(&address) {
                        summary.skipped += 1;
                        continue;
                    }
                    let mut record = VolumeRecord::from_stored(&value);
                    record.page_address = Some(address.clone());
                    if self.by_address.insert(address, record).is_some() {
                        summary.skipped += 1;
                    } else {
                        summary.addresses += 1;
                    }
                }
                _ => {
                    debug!(%key, "StateCache::hydrate: skipping foreign key");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            tabs = summary.tabs,
            addresses = summary.addresses,
            skipped = summary.skipped,
            "Hydrated volume state"
        );
        Ok(summary)
    }

    /// Record for `tab_id`, falling back to address history, then defaults
    ///
    /// A hit in the address map is copied under the tab id and persisted, so
    /// later lookups by tab id alone see the same values. The default record
    /// is returned without being stored.
    pub fn get(&mut self, tab_id: TabId, page_address: Option<&str>) -> VolumeRecord {
        debug!(%tab_id, ?page_address, "StateCache::get: called");
        if let Some(record) = self.by_tab.get(&tab_id) {
            return record.clone();
        }

        if let Some(address) = page_address.and_then(normalize_page_address)
            && let Some(history) = self.by_address.get(&address)
        {
            debug!(%tab_id, %address, "StateCache::get: seeding tab from address history");
            let mut record = history.clone();
            record.page_address = Some(address);
            self.by_tab.insert(tab_id, record.clone());
            self.persister.write(StoreKey::Tab(tab_id).to_string(), record.to_stored());
            return record;
        }

        VolumeRecord::default()
    }

    /// Record for `tab_id` if one is tracked
    pub fn lookup(&self, tab_id: TabId) -> Option<&VolumeRecord> {
        self.by_tab.get(&tab_id)
    }

    /// Whether a record is tracked for `tab_id`
    pub fn contains(&self, tab_id: TabId) -> bool {
        self.by_tab.contains_key(&tab_id)
    }

    /// Merge `draft` into the tab's record and write it through
    ///
    /// Invalid fields keep their previous value. The record is written under
    /// its tab key and, when it has a page address, under that address too.
    pub fn put(&mut self, tab_id: TabId, draft: &RecordDraft, page_address: Option<&str>) -> VolumeRecord {
        debug!(%tab_id, ?draft, ?page_address, "StateCache::put: called");
        let mut record = self.get(tab_id, page_address);

        let rejected = record.merge_draft(draft);
        if !rejected.is_empty() {
            warn!(%tab_id, ?rejected, "Rejected invalid record fields, kept prior values");
        }
        if let Some(address) = page_address.and_then(normalize_page_address) {
            record.page_address = Some(address);
        }

        self.store(tab_id, record.clone());
        record
    }

    /// Replace the tab's record outright and write it through
    pub fn store(&mut self, tab_id: TabId, record: VolumeRecord) {
        debug!(%tab_id, "StateCache::store: called");
        self.persister.write(StoreKey::Tab(tab_id).to_string(), record.to_stored());
        if let Some(address) = &record.page_address {
            self.persister
                .write(StoreKey::Address(address.clone()).to_string(), record.to_stored());
            self.by_address.insert(address.clone(), record.clone());
        }
        self.by_tab.insert(tab_id, record);
    }

    /// Point the tab at a new page address
    ///
    /// Returns the adopted record when the address has history; that record
    /// overwrites the tab's entry. Otherwise the tracked record, if any, keeps
    /// its values and takes the new address for future writes.
    pub fn adopt_address(&mut self, tab_id: TabId, page_address: &str) -> Option<VolumeRecord> {
        debug!(%tab_id, %page_address, "StateCache::adopt_address: called");
        let address = normalize_page_address(page_address)?;

        if let Some(history) = self.by_address.get(&address) {
            let mut record = history.clone();
            record.page_address = Some(address);
            self.by_tab.insert(tab_id, record.clone());
            self.persister.write(StoreKey::Tab(tab_id).to_string(), record.to_stored());
            return Some(record);
        }

        if let Some(record) = self.by_tab.get_mut(&tab_id) {
            debug!(%tab_id, %address, "StateCache::adopt_address: no history, keeping current values");
            record.page_address = Some(address);
        }
        None
    }

    /// Drop the tab-scoped in-memory entry
    pub fn evict(&mut self, tab_id: TabId) -> Option<VolumeRecord> {
        debug!(%tab_id, "StateCache::evict: called");
        self.by_tab.remove(&tab_id)
    }

    /// Record remembered for a page address
    pub fn address_record(&self, page_address: &str) -> Option<&VolumeRecord> {
        normalize_page_address(page_address).and_then(|address| self.by_address.get(&address))
    }

    /// Number of tracked tabs
    pub fn tab_count(&self) -> usize {
        self.by_tab.len()
    }

    /// Number of remembered addresses
    pub fn address_count(&self) -> usize {
        self.by_address.len()
    }

    /// The persister this cache writes through
    pub fn persister(&self) -> &Persister {
        &self.persister
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use volumestore::MemoryStore;

    const PAGE: &str = "https://video.test/watch?v=1";

    fn cache_over(store: Arc<MemoryStore>) -> StateCache {
        StateCache::new(Persister::spawn(store))
    }

    #[tokio::test]
    async fn test_get_unknown_tab_returns_default_without_storing() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = cache_over(store.clone());

        let record = cache.get(42, None);
        assert_eq!(record, VolumeRecord::default());
        assert!(!cache.contains(42));

        cache.persister().flush().await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_seeds_from_address_history() {
        let store = Arc::new(MemoryStore::with_entries([(
            format!("url-volume-{PAGE}"),
            json!({"volume": 30, "previousVolume": 60, "muted": false, "hasAudio": true}),
        )]));
        let mut cache = cache_over(store.clone());
        cache.hydrate(store.as_ref()).await.unwrap();

        let seeded = cache.get(42, Some(PAGE));
        assert_eq!(seeded.volume, 30);
        assert_eq!(seeded.previous_volume, 60);

        // by tab id alone, same values
        assert_eq!(cache.get(42, None), seeded);

        cache.persister().flush().await;
        let stored = store.get("tab-volume-42").await.unwrap().unwrap();
        assert_eq!(VolumeRecord::from_stored(&stored), seeded);
    }

    #[tokio::test]
    async fn test_put_rejects_out_of_range_volume() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = cache_over(store);

        cache.put(
            1,
            &RecordDraft {
                volume: Some(40.0),
                ..Default::default()
            },
            None,
        );
        let record = cache.put(
            1,
            &RecordDraft {
                volume: Some(101.0),
                ..Default::default()
            },
            None,
        );
        assert_eq!(record.volume, 40);
    }

    #[tokio::test]
    async fn test_put_writes_both_key_families() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = cache_over(store.clone());

        cache.put(5, &RecordDraft::has_audio(true), Some(PAGE));
        cache.persister().flush().await;

        assert!(store.get("tab-volume-5").await.unwrap().is_some());
        assert!(store.get(&format!("url-volume-{PAGE}")).await.unwrap().is_some());
        assert_eq!(cache.address_count(), 1);
    }

    #[tokio::test]
    async fn test_evict_keeps_address_history() {
        let store = Arc::new(MemoryStore::new());
        let mut cache = cache_over(store.clone());

        cache.put(
            42,
            &RecordDraft {
                volume: Some(25.0),
                ..Default::default()
            },
            Some(PAGE),
        );
        assert!(cache.evict(42).is_some());
        assert!(!cache.contains(42));
        assert_eq!(cache.tab_count(), 0);
        assert_eq!(cache.address_count(), 1);

        let reopened = cache.get(77, Some(PAGE));
        assert_eq!(reopened.volume, 25);
    }

    #[tokio::test]
    async fn test_hydrate_skips_foreign_keys_and_coerces_garbage() {
        let store = Arc::new(MemoryStore::with_entries([
            ("tab-volume-3", json!("not a record")),
            ("tab-volume-abc", json!({"volume": 10})),
            ("url-volume-", json!({"volume": 10})),
            ("theme", json!("dark")),
            ("url-volume-https://a.test/", json!({"volume": 55})),
        ]));
        let mut cache = cache_over(store.clone());

        let summary = cache.hydrate(store.as_ref()).await.unwrap();
        assert_eq!(
            summary,
            HydrateSummary {
                tabs: 1,
                addresses: 1,
                skipped: 3
            }
        );
        assert_eq!(cache.lookup(3), Some(&VolumeRecord::default()));
        assert_eq!(cache.address_record("https://a.test/").map(|r| r.volume), Some(55));
    }

    #[tokio::test]
    async fn test_hydrate_normalizes_legacy_address_keys() {
        let store = Arc::new(MemoryStore::with_entries([
            ("url-volume-https://frag.test/page#chapter-2", json!({"volume": 30})),
            ("url-volume-  https://space.test/ ", json!({"volume": 40})),
            ("url-volume-about:blank", json!({"volume": 50})),
        ]));
        let mut cache = cache_over(store.clone());

        let summary = cache.hydrate(store.as_ref()).await.unwrap();
        assert_eq!(summary.addresses, 2);
        assert_eq!(summary.skipped, 1);

        let record = cache.get(8, Some("https://frag.test/page"));
        assert_eq!(record.volume, 30);
        assert_eq!(record.page_address.as_deref(), Some("https://frag.test/page"));
        assert_eq!(cache.address_record("https://space.test/").map(|r| r.volume), Some(40));
    }

    #[tokio::test]
    async fn test_hydrate_prefers_normalized_key_over_legacy_spelling() {
        let store = Arc::new(MemoryStore::with_entries([
            ("url-volume-https://dup.test/#top", json!({"volume": 10})),
            ("url-volume-https://dup.test/", json!({"volume": 90})),
        ]));
        let mut cache = cache_over(store.clone());

        cache.hydrate(store.as_ref()).await.unwrap();
        assert_eq!(cache.address_count(), 1);
        assert_eq!(cache.address_record("https://dup.test/").map(|r| r.volume), Some(90));
    }

    #[tokio::test]
    async fn test_adopt_address() {
        let store = Arc::new(MemoryStore::with_entries([(
            format!("url-volume-{PAGE}"),
            json!({"volume": 15, "previousVolume": 15, "muted": true, "hasAudio": true}),
        )]));
        let mut cache = cache_over(store.clone());
        cache.hydrate(store.as_ref()).await.unwrap();

        cache.put(
            9,
            &RecordDraft {
                volume: Some(80.0),
                ..Default::default()
            },
            Some("https://other.test/"),
        );

        let adopted = cache.adopt_address(9, PAGE).unwrap();
        assert_eq!(adopted.volume, 15);
        assert!(adopted.muted);
        assert_eq!(cache.lookup(9), Some(&adopted));

        assert!(cache.adopt_address(9, "https://fresh.test/").is_none());
        let kept = cache.lookup(9).unwrap();
        assert_eq!(kept.volume, 15);
        assert_eq!(kept.page_address.as_deref(), Some("https://fresh.test/"));

        assert!(cache.adopt_address(9, "about:blank").is_none());
    }
}

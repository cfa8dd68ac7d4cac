//! Cache manager enforcing expiry and size policy over the stored blob
//!
//! Provides a `CacheManager` that keeps arbitrary serializable payloads in a
//! single JSON mapping, expires entries by age on read and trims the oldest
//! non-priority entries when the estimated size crosses a threshold.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, info, warn};

use super::config::{CacheConfig, ConfigSource};
use super::store::{estimate_size_bytes, BlobStore, FileStore, StoreError};

/// Bytes in one megabyte for threshold comparisons
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// An eviction pass considers the oldest `1 / EVICTION_DIVISOR` of the entries (20%)
const EVICTION_DIVISOR: usize = 5;

/// One cached value and the time it was written
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Milliseconds since the Unix epoch
    timestamp: i64,
    data: Value,
}

/// The whole cache as persisted in the store
type CacheBlob = BTreeMap<String, CacheEntry>;

/// Source of the current time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Lifecycle of a manager's configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// No configuration yet
    Uninitialized,
    /// `initialize` is awaiting the configuration source
    Initializing,
    /// A configuration is in place and immutable
    Ready,
}

/// Where the active configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    /// Loaded from a configuration source or supplied by the caller
    Loaded,
    /// Built-in defaults
    Default,
}

/// Snapshot of the cache contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of stored entries
    pub entry_count: usize,
    /// Entries whose key matches a priority book
    pub priority_entry_count: usize,
    /// Estimated size of the persisted blob
    pub estimated_bytes: usize,
    /// Timestamp of the oldest entry, if any
    pub oldest_timestamp: Option<i64>,
    /// Timestamp of the newest entry, if any
    pub newest_timestamp: Option<i64>,
}

/// Applies cache policy around a [`BlobStore`]
///
/// Every operation reads the whole blob, changes it and writes it back while
/// holding the manager's lock, so one manager can be shared across tasks
/// and threads through an `Arc` without losing updates.
///
/// Failures never reach the caller as errors: a missing, corrupt or
/// unwritable blob behaves like an empty cache.
pub struct CacheManager<S: BlobStore = FileStore> {
    store: S,
    config: OnceLock<(CacheConfig, ConfigOrigin)>,
    initializing: AtomicBool,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl<S: BlobStore> CacheManager<S> {
    /// Creates an uninitialized manager over `store`
    ///
    /// Call [`initialize`](Self::initialize) to load the policy. Operations
    /// performed before that use the default policy and keep it.
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: OnceLock::new(),
            initializing: AtomicBool::new(false),
            clock: Arc::new(SystemClock),
            lock: Mutex::new(()),
        }
    }

    /// Creates a manager that is ready with the given policy
    pub fn with_config(store: S, config: CacheConfig) -> Self {
        let manager = Self::new(store);
        let _ = manager.config.set((config, ConfigOrigin::Loaded));
        manager
    }

    /// Replaces the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> CacheState {
        if self.config.get().is_some() {
            CacheState::Ready
        } else if self.initializing.load(Ordering::Acquire) {
            CacheState::Initializing
        } else {
            CacheState::Uninitialized
        }
    }

    /// The active policy, pinning the defaults if none was loaded yet
    pub fn config(&self) -> &CacheConfig {
        &self.config_entry().0
    }

    fn config_entry(&self) -> &(CacheConfig, ConfigOrigin) {
        self.config
            .get_or_init(|| (CacheConfig::default(), ConfigOrigin::Default))
    }

    /// Loads the cache policy from `source`
    ///
    /// # Returns
    /// * `true` if the policy was loaded from the source
    /// * `false` if loading failed and the defaults are in use
    ///
    /// On an already ready manager nothing is reloaded; the result tells
    /// whether the active policy came from a source.
    pub async fn initialize(&self, source: &ConfigSource) -> bool {
        if let Some((_, origin)) = self.config.get() {
            debug!(%source, "Cache manager already initialized");
            return *origin == ConfigOrigin::Loaded;
        }

        self.initializing.store(true, Ordering::Release);
        let loaded = match CacheConfig::load(source).await {
            Ok(config) => (config, ConfigOrigin::Loaded),
            Err(e) => {
                warn!(%source, error = %e, "Failed to load cache config, using defaults");
                (CacheConfig::default(), ConfigOrigin::Default)
            }
        };
        self.initializing.store(false, Ordering::Release);

        let origin = loaded.1;
        if self.config.set(loaded).is_err() {
            // A concurrent caller fixed the policy while the source was loading
            return self.config_entry().1 == ConfigOrigin::Loaded;
        }
        origin == ConfigOrigin::Loaded
    }

    /// Reads a cached value
    ///
    /// Returns `None` if the key is absent, the entry has expired, or the
    /// blob or value cannot be parsed. An expired entry is removed from the
    /// persisted blob on the way out.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let _guard = self.lock();
        let max_age_ms = self.config().max_age_ms();

        let mut blob = self.load_blob()?;
        let entry = blob.get(key)?;

        // A timestamp too far from now to subtract counts as expired
        let age = self.clock.now_millis().checked_sub(entry.timestamp);
        if age.map_or(true, |age| age > max_age_ms) {
            debug!(key, age_ms = ?age, "Cache expired");
            blob.remove(key);
            if let Err(e) = self.persist(&blob) {
                warn!(key, error = %e, "Failed to persist cache after expiry");
            }
            return None;
        }

        match serde_json::from_value(entry.data.clone()) {
            Ok(data) => {
                debug!(key, "Cache hit");
                Some(data)
            }
            Err(e) => {
                warn!(key, error = %e, "Cached value has an unexpected shape");
                None
            }
        }
    }

    /// Writes a value to the cache, stamped with the current time
    ///
    /// Runs an eviction pass afterwards if the cache grew over the size
    /// threshold. A failing eviction does not undo the write.
    ///
    /// # Returns
    /// * `true` if the value was persisted
    /// * `false` if it could not be serialized or written
    pub fn set<T: Serialize>(&self, key: &str, data: &T) -> bool {
        let _guard = self.lock();

        let data = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for cache");
                return false;
            }
        };

        let mut blob = self.load_blob().unwrap_or_default();
        blob.insert(
            key.to_string(),
            CacheEntry {
                timestamp: self.clock.now_millis(),
                data,
            },
        );

        let serialized = match self.persist(&blob) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(key, error = %e, "Failed to save to cache");
                return false;
            }
        };
        debug!(key, "Saved to cache");

        self.check_size(blob, &serialized);
        true
    }

    /// Whether `key` names a priority book (case-insensitive substring match)
    pub fn is_priority_book(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.config()
            .priority_books
            .iter()
            .any(|book| key.contains(&book.to_lowercase()))
    }

    /// Removes every cached entry
    ///
    /// Returns `false` only if the underlying store failed to delete the blob.
    pub fn clear_all(&self) -> bool {
        let _guard = self.lock();
        match self.store.delete_blob() {
            Ok(()) => {
                info!("Cache cleared completely");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear cache");
                false
            }
        }
    }

    /// Summarizes what is currently stored
    pub fn stats(&self) -> CacheStats {
        let _guard = self.lock();
        let Some(raw) = self.store.read_blob() else {
            return CacheStats::default();
        };
        let Ok(blob) = serde_json::from_str::<CacheBlob>(&raw) else {
            return CacheStats::default();
        };

        CacheStats {
            entry_count: blob.len(),
            priority_entry_count: blob.keys().filter(|k| self.is_priority_book(k)).count(),
            estimated_bytes: estimate_size_bytes(&raw),
            oldest_timestamp: blob.values().map(|e| e.timestamp).min(),
            newest_timestamp: blob.values().map(|e| e.timestamp).max(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reads and parses the blob; absent or corrupt blobs yield `None`
    fn load_blob(&self) -> Option<CacheBlob> {
        let raw = self.store.read_blob()?;
        match serde_json::from_str(&raw) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(error = %e, "Cache blob is corrupt, treating as empty");
                None
            }
        }
    }

    /// Serializes and writes the blob, returning what was written
    fn persist(&self, blob: &CacheBlob) -> Result<String, StoreError> {
        let serialized = serde_json::to_string(blob)?;
        self.store.write_blob(&serialized)?;
        Ok(serialized)
    }

    /// Runs an eviction pass if the persisted blob is over the threshold
    fn check_size(&self, blob: CacheBlob, serialized: &str) {
        let size_mb = estimate_size_bytes(serialized) as f64 / BYTES_PER_MB;
        let threshold_mb = self.config().auto_cleanup_threshold_mb;
        if size_mb <= threshold_mb {
            return;
        }

        info!(size_mb, threshold_mb, "Cache size exceeded threshold, cleaning up");
        self.evict_oldest(blob);
    }

    /// Removes the oldest 20% of entries, sparing priority books
    ///
    /// Skipped priority entries are not replaced by younger ones, so a cache
    /// whose oldest entries are all priority books does not shrink.
    fn evict_oldest(&self, mut blob: CacheBlob) {
        let mut by_age: Vec<(&String, i64)> =
            blob.iter().map(|(key, entry)| (key, entry.timestamp)).collect();
        // Stable: equal timestamps keep mapping order
        by_age.sort_by_key(|&(_, timestamp)| timestamp);

        let remove_count = by_age.len() / EVICTION_DIVISOR;
        let doomed: Vec<String> = by_age
            .into_iter()
            .take(remove_count)
            .filter_map(|(key, _)| {
                if self.is_priority_book(key) {
                    debug!(key = %key, "Skipping priority item");
                    None
                } else {
                    Some(key.clone())
                }
            })
            .collect();

        info!(window = remove_count, removing = doomed.len(), "Evicting oldest cache entries");
        for key in &doomed {
            blob.remove(key);
        }

        if let Err(e) = self.persist(&blob) {
            warn!(error = %e, "Failed to persist cache after eviction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::AtomicI64;
    use tempfile::TempDir;

    const DAY_MS: i64 = 86_400_000;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestData {
        name: String,
        value: i32,
    }

    /// Clock that only moves when told to
    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn new(start: i64) -> Arc<Self> {
            Arc::new(Self(AtomicI64::new(start)))
        }

        fn advance(&self, ms: i64) {
            self.0.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    fn config_with(priority_books: &[&str], threshold_mb: f64) -> CacheConfig {
        CacheConfig {
            max_age_days: 30.0,
            priority_books: priority_books.iter().map(|b| b.to_string()).collect(),
            auto_cleanup_threshold_mb: threshold_mb,
            download_on_wifi_only: false,
        }
    }

    fn create_test_cache(config: CacheConfig) -> (CacheManager<MemoryStore>, Arc<ManualClock>) {
        let clock = ManualClock::new(1_700_000_000_000);
        let cache = CacheManager::with_config(MemoryStore::new(), config).with_clock(clock.clone());
        (cache, clock)
    }

    fn stored_keys(cache: &CacheManager<MemoryStore>) -> Vec<String> {
        let raw = cache.store.read_blob().expect("Blob should exist");
        let blob: CacheBlob = serde_json::from_str(&raw).expect("Blob should parse");
        blob.keys().cloned().collect()
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());

        assert!(cache.get::<TestData>("nonexistent_key").is_none());

        assert!(cache.set("other", &1));
        assert!(cache.get::<TestData>("nonexistent_key").is_none());
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());
        let data = TestData {
            name: "roundtrip".to_string(),
            value: 12345,
        };

        assert!(cache.set("roundtrip_key", &data));

        assert_eq!(cache.get::<TestData>("roundtrip_key"), Some(data));
    }

    #[test]
    fn test_overwrite_existing_entry() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());

        assert!(cache.set("key", &"first"));
        assert!(cache.set("key", &"second"));

        assert_eq!(cache.get::<String>("key").as_deref(), Some("second"));
        assert_eq!(stored_keys(&cache), vec!["key"]);
    }

    #[test]
    fn test_entry_expires_after_max_age() {
        let (cache, clock) = create_test_cache(config_with(&["João"], 50.0));
        let verses = serde_json::json!({"16": "Porque Deus amou o mundo de tal maneira..."});

        assert!(cache.set("joao_3", &verses));

        clock.advance(DAY_MS);
        assert_eq!(cache.get::<Value>("joao_3"), Some(verses));

        clock.advance(30 * DAY_MS);
        assert!(cache.get::<Value>("joao_3").is_none());
        assert!(stored_keys(&cache).is_empty(), "Expired entry should be removed");
    }

    #[test]
    fn test_entry_at_exact_max_age_is_still_fresh() {
        let (cache, clock) = create_test_cache(CacheConfig::default());
        assert!(cache.set("salmos_23", &1));

        clock.advance(30 * DAY_MS);

        assert_eq!(cache.get::<i32>("salmos_23"), Some(1));
    }

    #[test]
    fn test_corrupt_blob_is_a_miss_and_is_replaced_by_set() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());
        cache.store.write_blob("{not json").unwrap();

        assert!(cache.get::<i32>("anything").is_none());
        assert_eq!(cache.stats(), CacheStats::default());

        assert!(cache.set("fresh", &7));
        assert_eq!(cache.get::<i32>("fresh"), Some(7));
    }

    #[test]
    fn test_out_of_range_timestamp_is_expired() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());
        cache
            .store
            .write_blob(r#"{"joao_3":{"timestamp":-9223372036854775808,"data":1},"joao_1":{"timestamp":1700000000000,"data":2}}"#)
            .unwrap();

        assert!(cache.get::<i32>("joao_3").is_none());
        assert_eq!(stored_keys(&cache), vec!["joao_1"], "Entry should be removed");
        assert_eq!(cache.get::<i32>("joao_1"), Some(2));
    }

    #[test]
    fn test_value_of_wrong_shape_is_a_miss() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());
        assert!(cache.set("key", &"text"));

        assert!(cache.get::<TestData>("key").is_none());
        assert_eq!(cache.get::<String>("key").as_deref(), Some("text"));
    }

    #[test]
    fn test_set_returns_false_when_write_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let cache = CacheManager::with_config(FileStore::with_dir(blocker), CacheConfig::default());

        assert!(!cache.set("key", &1));
        assert!(cache.get::<i32>("key").is_none());
    }

    #[test]
    fn test_is_priority_book_is_case_insensitive_substring() {
        let (cache, _clock) = create_test_cache(config_with(&["João", "Salmos"], 50.0));

        assert!(cache.is_priority_book("João_3"));
        assert!(cache.is_priority_book("JOÃO_1"));
        assert!(cache.is_priority_book("livro_salmos_23"));
        assert!(!cache.is_priority_book("joao_3"), "Accents are not folded");
        assert!(!cache.is_priority_book("genesis_1"));
    }

    #[test]
    fn test_eviction_removes_oldest_fifth() {
        let (cache, clock) = create_test_cache(config_with(&[], 0.0));

        for i in 0..10 {
            assert!(cache.set(&format!("genesis_{}", i), &i));
            clock.advance(1_000);
        }

        // Threshold 0 runs a pass on every set; from five entries on each pass drops one
        assert_eq!(
            stored_keys(&cache),
            vec!["genesis_6", "genesis_7", "genesis_8", "genesis_9"]
        );
    }

    #[test]
    fn test_eviction_on_tenth_set_removes_exactly_two() {
        let clock = ManualClock::new(1_700_000_000_000);
        let store = MemoryStore::new();

        // Nine entries written earlier, oldest first
        let mut blob = CacheBlob::new();
        for i in 0..9 {
            blob.insert(
                format!("mateus_{}", i),
                CacheEntry {
                    timestamp: 1_700_000_000_000 - (9 - i) * 1_000,
                    data: Value::from(i),
                },
            );
        }
        let serialized = serde_json::to_string(&blob).unwrap();
        store.write_blob(&serialized).unwrap();

        // Threshold sits exactly at the nine-entry size, so the tenth set crosses it
        let threshold_mb = estimate_size_bytes(&serialized) as f64 / BYTES_PER_MB;
        let cache = CacheManager::with_config(store, config_with(&[], threshold_mb))
            .with_clock(clock);

        assert!(cache.set("mateus_9", &9));

        let keys = stored_keys(&cache);
        assert_eq!(keys.len(), 8);
        assert!(!keys.contains(&"mateus_0".to_string()));
        assert!(!keys.contains(&"mateus_1".to_string()));
        assert!(keys.contains(&"mateus_2".to_string()));
        assert!(keys.contains(&"mateus_9".to_string()));
    }

    #[test]
    fn test_eviction_skips_priority_books_without_backfill() {
        let (cache, clock) = create_test_cache(config_with(&["Salmos"], 50.0));

        assert!(cache.set("salmos_1", &1));
        clock.advance(1_000);
        assert!(cache.set("salmos_23", &23));
        for i in 0..8 {
            clock.advance(1_000);
            assert!(cache.set(&format!("romanos_{}", i), &i));
        }

        let blob: CacheBlob = serde_json::from_str(&cache.store.read_blob().unwrap()).unwrap();
        cache.evict_oldest(blob);

        // Window of two covers both priority entries; nothing else goes
        assert_eq!(stored_keys(&cache).len(), 10);
        assert_eq!(cache.get::<i32>("salmos_1"), Some(1));
    }

    #[test]
    fn test_eviction_ties_follow_mapping_order() {
        let (cache, _clock) = create_test_cache(config_with(&[], 50.0));

        // Same timestamp for all five; the first key in mapping order goes
        for key in ["e", "d", "c", "b", "a"] {
            assert!(cache.set(key, &key));
        }
        let blob: CacheBlob = serde_json::from_str(&cache.store.read_blob().unwrap()).unwrap();
        cache.evict_oldest(blob);

        assert_eq!(stored_keys(&cache), vec!["b", "c", "d", "e"]);
    }

    #[test]
    fn test_eviction_with_fewer_than_five_entries_removes_nothing() {
        let (cache, clock) = create_test_cache(config_with(&[], 0.0));

        for i in 0..4 {
            assert!(cache.set(&format!("exodo_{}", i), &i));
            clock.advance(1_000);
        }

        assert_eq!(stored_keys(&cache).len(), 4);
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let (cache, _clock) = create_test_cache(CacheConfig::default());
        assert!(cache.set("joao_1", &1));
        assert!(cache.set("joao_3", &3));

        assert!(cache.clear_all());
        assert!(cache.clear_all());

        assert!(cache.get::<i32>("joao_1").is_none());
        assert!(cache.get::<i32>("joao_3").is_none());
    }

    #[test]
    fn test_stats_reports_entries() {
        let (cache, clock) = create_test_cache(config_with(&["Salmos"], 50.0));
        let start = clock.now_millis();

        assert!(cache.set("salmos_1", &1));
        clock.advance(5_000);
        assert!(cache.set("genesis_1", &1));

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.priority_entry_count, 1);
        assert!(stats.estimated_bytes > 0);
        assert_eq!(stats.oldest_timestamp, Some(start));
        assert_eq!(stats.newest_timestamp, Some(start + 5_000));
    }

    #[test]
    fn test_uninitialized_manager_uses_defaults() {
        let cache = CacheManager::new(MemoryStore::new());
        assert_eq!(cache.state(), CacheState::Uninitialized);

        assert!(cache.set("key", &1));

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.config(), &CacheConfig::default());
    }

    #[tokio::test]
    async fn test_initialize_with_unreachable_source_falls_back() {
        let cache = CacheManager::new(MemoryStore::new());
        let source = ConfigSource::Url("http://127.0.0.1:1/bible_cache_config.json".to_string());

        assert!(!cache.initialize(&source).await);

        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.config(), &CacheConfig::default());
        assert!(cache.set("key", &"value"));
        assert_eq!(cache.get::<String>("key").as_deref(), Some("value"));
    }

    #[tokio::test]
    async fn test_initialize_loads_config_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"cache_strategy": {"max_age_days": 1, "priority_books": ["Romanos"], "auto_cleanup_threshold_mb": 5}}"#,
        )
        .unwrap();
        let cache = CacheManager::new(MemoryStore::new());

        assert!(cache.initialize(&ConfigSource::File(path.clone())).await);
        assert_eq!(cache.config().priority_books, vec!["Romanos"]);

        // A second pass keeps the loaded policy
        assert!(cache.initialize(&ConfigSource::File(temp_dir.path().join("gone.json"))).await);
        assert_eq!(cache.config().max_age_ms(), DAY_MS);
    }

    #[tokio::test]
    async fn test_initialize_after_default_pin_reports_false() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"cache_strategy": {"max_age_days": 1, "priority_books": [], "auto_cleanup_threshold_mb": 5}}"#,
        )
        .unwrap();
        let cache = CacheManager::new(MemoryStore::new());
        assert!(cache.get::<i32>("key").is_none());

        assert!(!cache.initialize(&ConfigSource::File(path)).await);
        assert_eq!(cache.config(), &CacheConfig::default());
    }

    #[tokio::test]
    async fn test_state_is_initializing_while_source_loads() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/bible_cache_config.json", listener.local_addr().unwrap());
        let cache = Arc::new(CacheManager::new(MemoryStore::new()));
        assert_eq!(cache.state(), CacheState::Uninitialized);

        let init = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.initialize(&ConfigSource::Url(url)).await })
        };

        // The request is in flight and no response has been sent yet
        let (mut socket, _) = listener.accept().await.unwrap();
        assert_eq!(cache.state(), CacheState::Initializing);

        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await.unwrap();
        let body = r#"{"cache_strategy": {"max_age_days": 2, "priority_books": ["Romanos"], "auto_cleanup_threshold_mb": 5}}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();

        assert!(init.await.unwrap());
        assert_eq!(cache.state(), CacheState::Ready);
        assert_eq!(cache.config().priority_books, vec!["Romanos"]);
    }

    #[test]
    fn test_concurrent_sets_do_not_lose_updates() {
        let cache = Arc::new(CacheManager::with_config(
            MemoryStore::new(),
            CacheConfig::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        assert!(cache.set(&format!("t{}_{}", t, i), &i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Thread should finish");
        }

        assert_eq!(cache.stats().entry_count, 80);
    }
}

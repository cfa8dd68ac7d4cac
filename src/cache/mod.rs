//! Cache module for keeping dataset lookups on local storage
//!
//! This module persists JSON-serializable payloads in a single blob with a
//! time-based expiry and a size threshold. When the threshold is crossed the
//! oldest entries are evicted, except those belonging to priority books.

mod config;
mod manager;
mod store;

pub use config::{
    CacheConfig, ConfigError, ConfigSource, DEFAULT_AUTO_CLEANUP_THRESHOLD_MB,
    DEFAULT_MAX_AGE_DAYS, DEFAULT_PRIORITY_BOOKS,
};
pub use manager::{CacheManager, CacheState, CacheStats, Clock, ConfigOrigin, SystemClock};
pub use store::{estimate_size_bytes, BlobStore, FileStore, MemoryStore, StoreError, STORAGE_SLOT};

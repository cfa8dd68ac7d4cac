//! Raw persistence of the serialized cache blob
//!
//! The whole cache lives in a single named slot. A [`BlobStore`] only moves
//! that string in and out of the slot; it knows nothing about entries,
//! expiry or eviction.

use directories::ProjectDirs;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Name of the slot holding the serialized cache
pub const STORAGE_SLOT: &str = "alvorecer_bible_cache";

/// Errors that can occur while persisting the cache blob
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading, writing or removing the slot failed
    #[error("Cache storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The cache mapping could not be serialized
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Byte-level persistence of one named blob
pub trait BlobStore: Send + Sync {
    /// Returns the raw blob, or `None` if it is absent or unreadable
    fn read_blob(&self) -> Option<String>;

    /// Persists the blob, replacing any previous contents
    fn write_blob(&self, serialized: &str) -> Result<(), StoreError>;

    /// Removes the blob. Removing an absent blob succeeds.
    fn delete_blob(&self) -> Result<(), StoreError>;
}

/// Approximate size of a serialized blob in bytes
///
/// Counts two bytes per UTF-16 code unit. This over-estimates ASCII-heavy
/// blobs on purpose and is only used for threshold comparisons.
pub fn estimate_size_bytes(serialized: &str) -> usize {
    serialized.encode_utf16().count() * 2
}

/// Stores the blob as a JSON file in a cache directory
///
/// Uses `~/.cache/alvorecer/alvorecer_bible_cache.json` on Linux, or the
/// equivalent XDG path on other platforms.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding the slot file
    cache_dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG-compliant cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "alvorecer")?;
        let cache_dir = project_dirs.cache_dir().to_path_buf();
        Some(Self { cache_dir })
    }

    /// Creates a FileStore with a custom cache directory
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Path of the slot file
    pub fn blob_path(&self) -> PathBuf {
        self.cache_dir.join(format!("{}.json", STORAGE_SLOT))
    }
}

impl BlobStore for FileStore {
    fn read_blob(&self) -> Option<String> {
        match fs::read_to_string(self.blob_path()) {
            Ok(content) => Some(content),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.blob_path().display(), error = %e, "Cache blob unreadable, treating as absent");
                None
            }
        }
    }

    fn write_blob(&self, serialized: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.blob_path(), serialized)?;
        Ok(())
    }

    fn delete_blob(&self) -> Result<(), StoreError> {
        match fs::remove_file(self.blob_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the blob in process memory
///
/// Useful for hosts without a writable disk and for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn read_blob(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn write_blob(&self, serialized: &str) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(serialized.to_string());
        Ok(())
    }

    fn delete_blob(&self) -> Result<(), StoreError> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

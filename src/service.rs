//! Bible lookups backed by the local cache
//!
//! `BibleService` answers chapter requests from the cache when it can and
//! falls back to the dataset otherwise, caching what it read.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{BlobStore, CacheManager, FileStore};
use crate::data::{BibleError, Book, Chapter, DatasetReady, Testament, VerseMatch};

/// Cache key for a chapter, following the `"<book>_<chapter>"` convention
pub fn chapter_cache_key(book: &str, chapter: u32) -> String {
    format!("{}_{}", book.to_lowercase(), chapter)
}

/// Combines the dataset with a shared [`CacheManager`]
pub struct BibleService<S: BlobStore = FileStore> {
    cache: Arc<CacheManager<S>>,
    dataset: DatasetReady,
}

impl<S: BlobStore> BibleService<S> {
    /// Creates a service over a shared cache and a dataset that may still be loading
    pub fn new(cache: Arc<CacheManager<S>>, dataset: DatasetReady) -> Self {
        Self { cache, dataset }
    }

    /// The cache this service reads through
    pub fn cache(&self) -> &Arc<CacheManager<S>> {
        &self.cache
    }

    /// Loads a chapter, preferring the cache
    ///
    /// # Returns
    /// * `Ok(Chapter)` from the cache, or from the dataset (then cached)
    /// * `Err(BibleError::ChapterNotFound)` if the dataset has no verses for it
    /// * `Err(BibleError::DatasetUnavailable)` on a cache miss while the dataset failed to load
    pub async fn load_chapter(&self, book: &str, chapter: u32) -> Result<Chapter, BibleError> {
        let key = chapter_cache_key(book, chapter);

        if let Some(cached) = self.cache.get::<Chapter>(&key) {
            debug!(key = %key, "Returning chapter from cache");
            return Ok(cached);
        }

        let data = self.dataset.wait().await?;
        let verses = data
            .get_chapter(book, chapter)
            .filter(|verses| !verses.is_empty())
            .ok_or_else(|| BibleError::ChapterNotFound {
                book: book.to_string(),
                chapter,
            })?;

        let result = Chapter {
            book: book.to_lowercase(),
            name: data.book_name(book).to_string(),
            chapter,
            verses: verses.clone(),
            version: data.version().to_string(),
        };

        if !self.cache.set(&key, &result) {
            warn!(key = %key, "Chapter loaded but not cached");
        }
        Ok(result)
    }

    /// Finds verses containing `term`
    pub async fn search(&self, term: &str) -> Result<Vec<VerseMatch>, BibleError> {
        let data = self.dataset.wait().await?;
        Ok(data.search(term))
    }

    /// Lists books, optionally restricted to one testament
    pub async fn books(&self, testament: Option<Testament>) -> Result<Vec<Book>, BibleError> {
        let data = self.dataset.wait().await?;
        Ok(data.books(testament))
    }

    /// Lists the chapter numbers of a book
    pub async fn chapters(&self, book: &str) -> Result<Vec<u32>, BibleError> {
        let data = self.dataset.wait().await?;
        if data.book(book).is_none() {
            return Err(BibleError::BookNotFound(book.to_string()));
        }
        Ok(data.chapters(book))
    }

    /// Loads every chapter of the priority books into the cache
    ///
    /// A book counts as priority when its identifier or display name matches
    /// the cache's priority list. Returns the number of chapters loaded.
    ///
    /// Chapters are cached under id-based keys (`"joao_3"`), so a book picked
    /// only by display name (`"João"`) is preloaded but not protected from
    /// eviction.
    pub async fn preload_priority_chapters(&self) -> Result<usize, BibleError> {
        let data = self.dataset.wait().await?;

        let mut loaded = 0;
        for book in data.books(None) {
            if !self.cache.is_priority_book(&book.id) && !self.cache.is_priority_book(&book.name) {
                continue;
            }
            for chapter in data.chapters(&book.id) {
                self.load_chapter(&book.id, chapter).await?;
                loaded += 1;
            }
        }

        info!(chapters = loaded, "Preloaded priority chapters");
        Ok(loaded)
    }
}

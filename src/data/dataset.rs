//! Static Bible dataset loaded from a JSON document
//!
//! The document lists books in canonical order, each with its chapters and
//! verses keyed by number:
//!
//! ```json
//! {"version": "...", "books": [{"id": "joao", "name": "João", "testament": "new",
//!   "chapters": {"3": {"16": "Porque Deus amou o mundo..."}}}]}
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::{Book, Testament, VerseMatch};

/// Errors that can occur when loading or querying the dataset
#[derive(Debug, Error)]
pub enum BibleError {
    /// Reading the dataset file failed
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset document is malformed
    #[error("Failed to parse dataset: {0}")]
    Parse(#[from] serde_json::Error),

    /// No book with this identifier
    #[error("Book '{0}' not found")]
    BookNotFound(String),

    /// The book exists but the chapter does not, or has no verses
    #[error("Chapter {chapter} of book '{book}' not found")]
    ChapterNotFound { book: String, chapter: u32 },

    /// The dataset never finished loading
    #[error("Bible dataset is not available")]
    DatasetUnavailable,
}

#[derive(Debug, Clone, Deserialize)]
struct BookData {
    id: String,
    name: String,
    testament: Testament,
    chapters: BTreeMap<u32, BTreeMap<u32, String>>,
}

impl BookData {
    fn to_book(&self) -> Book {
        Book {
            id: self.id.clone(),
            name: self.name.clone(),
            testament: self.testament,
        }
    }
}

/// Read-only access to the books, chapters and verses of one translation
#[derive(Debug, Clone, Deserialize)]
pub struct BibleData {
    version: String,
    books: Vec<BookData>,
}

impl BibleData {
    /// Parses a dataset document
    pub fn from_json(json: &str) -> Result<Self, BibleError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a dataset file
    pub async fn load(path: &Path) -> Result<Self, BibleError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Name of the translation
    pub fn version(&self) -> &str {
        &self.version
    }

    fn find_book(&self, book: &str) -> Option<&BookData> {
        let wanted = book.to_lowercase();
        self.books.iter().find(|b| b.id.to_lowercase() == wanted)
    }

    /// Books in canonical order, optionally restricted to one testament
    pub fn books(&self, testament: Option<Testament>) -> Vec<Book> {
        self.books
            .iter()
            .filter(|b| testament.map_or(true, |t| b.testament == t))
            .map(BookData::to_book)
            .collect()
    }

    /// Looks up a book by identifier (case-insensitive)
    pub fn book(&self, book: &str) -> Option<Book> {
        self.find_book(book).map(BookData::to_book)
    }

    /// Chapter numbers of a book in ascending order; empty for unknown books
    pub fn chapters(&self, book: &str) -> Vec<u32> {
        self.find_book(book)
            .map(|b| b.chapters.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Verses of a chapter, keyed by verse number
    pub fn get_chapter(&self, book: &str, chapter: u32) -> Option<&BTreeMap<u32, String>> {
        self.find_book(book)?.chapters.get(&chapter)
    }

    /// Text of a single verse
    pub fn get_verse(&self, book: &str, chapter: u32, verse: u32) -> Option<&str> {
        self.get_chapter(book, chapter)?
            .get(&verse)
            .map(String::as_str)
    }

    /// Display name of a book, or the identifier itself if the book is unknown
    pub fn book_name<'a>(&'a self, book: &'a str) -> &'a str {
        self.find_book(book).map_or(book, |b| b.name.as_str())
    }

    /// Finds every verse containing `term`, ignoring case
    ///
    /// Results come in book, chapter, verse order. A blank term matches nothing.
    pub fn search(&self, term: &str) -> Vec<VerseMatch> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Vec::new();
        }

        let mut results = Vec::new();
        for book in &self.books {
            for (&chapter, verses) in &book.chapters {
                for (&verse, text) in verses {
                    if text.to_lowercase().contains(&term) {
                        results.push(VerseMatch {
                            book: book.name.clone(),
                            chapter,
                            verse,
                            text: text.clone(),
                        });
                    }
                }
            }
        }
        results
    }
}

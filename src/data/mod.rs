//! Core data models for the Bible dataset
//!
//! This module contains the types handed out by the dataset provider and
//! cached by the service: books, chapters and search matches.

pub mod dataset;
pub mod ready;

pub use dataset::{BibleData, BibleError};
pub use ready::{dataset_channel, spawn_load, DatasetLoader, DatasetReady};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Division of the canon a book belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Testament {
    Old,
    New,
}

impl Testament {
    /// Parses a testament name, accepting English and Portuguese spellings
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "old" | "ot" | "antigo" => Some(Testament::Old),
            "new" | "nt" | "novo" => Some(Testament::New),
            _ => None,
        }
    }
}

/// A book of the dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    /// Lower-case identifier used in lookups and cache keys (e.g., "joao")
    pub id: String,
    /// Display name (e.g., "João")
    pub name: String,
    pub testament: Testament,
}

/// The verses of one chapter, as returned to callers and stored in the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Book identifier
    pub book: String,
    /// Book display name
    pub name: String,
    /// Chapter number
    pub chapter: u32,
    /// Verse number to verse text
    pub verses: BTreeMap<u32, String>,
    /// Translation the text comes from
    pub version: String,
}

/// A verse matching a search term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseMatch {
    /// Book display name
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

//! Command-line interface parsing for the Alvorecer Bible reader
//!
//! This module handles parsing of CLI arguments using clap: where the dataset,
//! the cache policy and the cache directory live, and which lookup to run.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::ConfigSource;
use crate::data::Testament;

/// Default location of the dataset document
pub const DEFAULT_DATA_PATH: &str = "assets/bible.json";

/// Default location of the cache policy document
pub const DEFAULT_CONFIG_SOURCE: &str = "assets/bible_cache_config.json";

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified testament name is not recognized
    #[error("Invalid testament: '{0}'. Valid testaments: old, new")]
    InvalidTestament(String),
}

/// Alvorecer - read and search the Bible offline
#[derive(Parser, Debug)]
#[command(name = "alvorecer")]
#[command(about = "Offline Bible reader with a local chapter cache")]
#[command(version)]
pub struct Cli {
    /// Path to the Bible dataset (JSON)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DATA_PATH)]
    pub data: PathBuf,

    /// Cache policy document, as a file path or an http(s) URL
    #[arg(long, value_name = "PATH|URL", default_value = DEFAULT_CONFIG_SOURCE)]
    pub config: String,

    /// Directory for the cache file (defaults to the XDG cache directory)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Lookups and cache maintenance
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List books
    Books {
        /// Only books of this testament (old, new)
        #[arg(long, value_name = "TESTAMENT")]
        testament: Option<String>,
    },
    /// List the chapters of a book
    Chapters {
        /// Book identifier (e.g., joao)
        book: String,
    },
    /// Print a chapter
    Read {
        /// Book identifier (e.g., joao)
        book: String,
        /// Chapter number
        chapter: u32,
    },
    /// Find verses containing a term
    Search {
        /// Text to look for (case-insensitive)
        term: String,
    },
    /// Inspect or maintain the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Cache maintenance commands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show what the cache holds
    Stats,
    /// Remove every cached entry
    Clear,
    /// Load the chapters of priority books into the cache
    Preload,
}

impl Cli {
    /// Where to read the cache policy from
    pub fn config_source(&self) -> ConfigSource {
        match self.config.parse() {
            Ok(source) => source,
            Err(never) => match never {},
        }
    }
}

/// Parses a testament string argument into a Testament enum.
///
/// # Returns
/// * `Ok(Testament)` if the string matches a valid testament
/// * `Err(CliError::InvalidTestament)` if the string doesn't match
pub fn parse_testament_arg(s: &str) -> Result<Testament, CliError> {
    Testament::from_str(s).ok_or_else(|| CliError::InvalidTestament(s.to_string()))
}

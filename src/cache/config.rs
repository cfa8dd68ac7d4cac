//! Cache policy configuration
//!
//! The policy is read once from a JSON document shaped like
//! `{"cache_strategy": {"max_age_days": 30, "priority_books": [...],
//! "download_on_wifi_only": false, "auto_cleanup_threshold_mb": 50}}`,
//! either from a local file or over HTTP.

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Entries older than this many days are expired by default
pub const DEFAULT_MAX_AGE_DAYS: f64 = 30.0;

/// Books protected from eviction by default
pub const DEFAULT_PRIORITY_BOOKS: [&str; 5] = ["João", "Salmos", "Gênesis", "Romanos", "Mateus"];

/// Estimated cache size (MB) above which an eviction pass runs by default
pub const DEFAULT_AUTO_CLEANUP_THRESHOLD_MB: f64 = 50.0;

/// Milliseconds in one day
pub const MS_PER_DAY: f64 = 86_400_000.0;

/// Timeout for fetching the configuration over HTTP
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when loading the cache configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed
    #[error("Failed to read cache config: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching the configuration over HTTP failed
    #[error("Failed to fetch cache config: {0}")]
    Http(#[from] reqwest::Error),

    /// The document is not valid JSON or misses required fields
    #[error("Failed to parse cache config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the cache cannot work with
    #[error("Invalid cache config: {0}")]
    Invalid(String),
}

/// Cache policy used by the [`CacheManager`](super::CacheManager)
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Entries older than this are expired on read
    pub max_age_days: f64,
    /// Keys containing any of these names (case-insensitive) survive eviction
    pub priority_books: Vec<String>,
    /// Estimated blob size in MB above which an eviction pass runs
    pub auto_cleanup_threshold_mb: f64,
    /// Not consulted by the cache; kept for the network fetch layer
    pub download_on_wifi_only: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_days: DEFAULT_MAX_AGE_DAYS,
            priority_books: DEFAULT_PRIORITY_BOOKS.iter().map(|b| b.to_string()).collect(),
            auto_cleanup_threshold_mb: DEFAULT_AUTO_CLEANUP_THRESHOLD_MB,
            download_on_wifi_only: false,
        }
    }
}

/// On-the-wire shape of the configuration resource
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    cache_strategy: CacheStrategy,
}

#[derive(Debug, Deserialize)]
struct CacheStrategy {
    max_age_days: f64,
    priority_books: Vec<String>,
    #[serde(default)]
    download_on_wifi_only: bool,
    auto_cleanup_threshold_mb: f64,
}

impl CacheConfig {
    /// Parses and validates a configuration document
    ///
    /// # Returns
    /// * `Ok(CacheConfig)` if the document is well-formed and all values are usable
    /// * `Err(ConfigError::Parse)` if the JSON is malformed or a required field is missing
    /// * `Err(ConfigError::Invalid)` if a value is out of range
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: ConfigDocument = serde_json::from_str(json)?;
        let strategy = document.cache_strategy;

        let config = Self {
            max_age_days: strategy.max_age_days,
            priority_books: strategy.priority_books,
            auto_cleanup_threshold_mb: strategy.auto_cleanup_threshold_mb,
            download_on_wifi_only: strategy.download_on_wifi_only,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fetches the document from `source` and parses it
    pub async fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let json = source.fetch().await?;
        Self::from_json(&json)
    }

    /// Checks that every value is usable by the eviction and expiry policy
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_age_days.is_finite() || self.max_age_days < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "max_age_days must be a non-negative number, got {}",
                self.max_age_days
            )));
        }
        if !self.auto_cleanup_threshold_mb.is_finite() || self.auto_cleanup_threshold_mb < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "auto_cleanup_threshold_mb must be a non-negative number, got {}",
                self.auto_cleanup_threshold_mb
            )));
        }
        // An empty name is a substring of every key and would protect the whole cache
        if self.priority_books.iter().any(|b| b.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "priority_books must not contain blank names".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum entry age in milliseconds
    pub fn max_age_ms(&self) -> i64 {
        (self.max_age_days * MS_PER_DAY) as i64
    }
}

/// Where the configuration document is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A JSON file on disk
    File(PathBuf),
    /// A JSON document served over HTTP(S)
    Url(String),
}

impl ConfigSource {
    /// Reads the raw document
    pub async fn fetch(&self) -> Result<String, ConfigError> {
        match self {
            ConfigSource::File(path) => Ok(tokio::fs::read_to_string(path).await?),
            ConfigSource::Url(url) => {
                let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
                let response = client.get(url).send().await?.error_for_status()?;
                Ok(response.text().await?)
            }
        }
    }
}

impl FromStr for ConfigSource {
    type Err = std::convert::Infallible;

    /// `http://` and `https://` locations are URLs, anything else is a file path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("http://") || s.starts_with("https://") {
            Ok(ConfigSource::Url(s.to_string()))
        } else {
            Ok(ConfigSource::File(PathBuf::from(s)))
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Url(url) => write!(f, "{}", url),
        }
    }
}

//! Configuration system for FeedForge.
//!
//! Load operator defaults from TOML or YAML files to tune retries, caching,
//! buffering and mixing without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use feedforge_config::FeedConfig;
//! use std::time::Duration;
//!
//! let config = FeedConfig::from_toml_str(r#"
//!     [filter]
//!     retry_count = 3
//!     overfetch_ratio = 0.5
//!
//!     [cache]
//!     candidate_count = 200
//!     ttl_secs = 600
//! "#).unwrap();
//!
//! assert_eq!(config.filter.retry_count, 3);
//! assert_eq!(config.cache.ttl(), Duration::from_secs(600));
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use feedforge_config::FeedConfig;
//!
//! let config = FeedConfig::load("feed.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main feed configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FeedConfig {
    /// Defaults for filter-with-retry operators.
    #[serde(default)]
    pub filter: FilterConfig,

    /// Defaults for read-through cached streams.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Defaults for buffered re-ranking.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Randomness for proportional mixing.
    #[serde(default)]
    pub mixer: MixerConfig,

    /// Defaults for concatenation.
    #[serde(default)]
    pub concatenate: ConcatenateConfig,

    /// Defaults for chronological mixing.
    #[serde(default)]
    pub chronological: ChronologicalConfig,
}

impl FeedConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist, contains invalid TOML, or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot drive an operator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.filter.overfetch_ratio;
        if !ratio.is_finite() || ratio < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "filter.overfetch_ratio must be a non-negative number, got {ratio}"
            )));
        }
        if self.cache.candidate_count == 0 {
            return Err(ConfigError::Invalid(
                "cache.candidate_count must be positive".to_string(),
            ));
        }
        if self.buffer.buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "buffer.buffer_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the filter retry count.
    pub fn with_retry_count(mut self, retry_count: usize) -> Self {
        self.filter.retry_count = retry_count;
        self
    }

    /// Sets the filter overfetch ratio.
    pub fn with_overfetch_ratio(mut self, ratio: f64) -> Self {
        self.filter.overfetch_ratio = ratio;
        self
    }

    /// Sets the random seed used by proportional mixing.
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.mixer.random_seed = Some(seed);
        self
    }

    /// Sets the cache TTL in seconds.
    pub fn with_cache_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.cache.ttl_secs = ttl_secs;
        self
    }
}

/// Filter-with-retry configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct FilterConfig {
    /// Extra attempts after the first fetch.
    pub retry_count: usize,

    /// Fraction of extra elements fetched per attempt to absorb filtering loss.
    pub overfetch_ratio: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            retry_count: 2,
            overfetch_ratio: 0.0,
        }
    }
}

/// Read-through cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct CacheConfig {
    /// Elements fetched from the inner stream on a miss.
    pub candidate_count: usize,

    /// Lifetime of a cached page.
    pub ttl_secs: u64,

    /// Upper bound on the lifetime of a cached empty page.
    pub empty_ttl_cap_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// TTL for an empty page: the regular TTL, capped.
    pub fn empty_ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.min(self.empty_ttl_cap_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            candidate_count: 100,
            ttl_secs: 300,
            empty_ttl_cap_secs: 30,
        }
    }
}

/// Buffered re-ranking configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct BufferConfig {
    /// Target number of elements held for re-ranking.
    pub buffer_size: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { buffer_size: 50 }
    }
}

/// Proportional mixing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct MixerConfig {
    /// Random seed for reproducible mixes. Entropy-seeded when absent.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

/// Concatenation configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConcatenateConfig {
    /// Bound each next source by the last timestamp of the previous one.
    #[serde(default)]
    pub stateful: bool,
}

/// Chronological mixing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ChronologicalConfig {
    #[serde(default)]
    pub order: ChronologicalOrder,
}

/// Sort direction for chronological operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChronologicalOrder {
    /// Oldest first.
    Ascending,

    /// Newest first.
    #[default]
    Descending,
}

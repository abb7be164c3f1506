//! Run configuration loaded from an optional YAML file.
//!
//! Every field has a default, so a missing file or a partial file both yield a
//! usable [`Config`]. Command-line flags are applied on top by `main`.
//!
//! ```yaml
//! output_path: site/conflict_news.json
//! dedup:
//!   similarity_threshold: 0.55
//! summarizer:
//!   model: gpt-4o-mini
//!   min_interval_ms: 1500
//! rules:
//!   conflict:
//!     - name: military
//!       terms: [airstrike, troops, shelling]
//!   domestic: [city council, state senate]
//! ```

use crate::error::ConfigError;
use crate::filter;
use crate::models::Source;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot file read as prior state and then replaced.
    pub output_path: PathBuf,
    /// Optional run report (counts and final stage).
    pub report_path: Option<PathBuf>,
    /// Prior articles older than this are not carried into the new snapshot.
    pub retention_hours: i64,
    /// Upper bound on the number of published articles.
    pub max_articles: usize,
    /// Whole-provider fetch timeout.
    pub fetch_timeout_secs: u64,
    /// Cap on articles taken from any single provider.
    pub max_per_source: usize,
    /// Download article pages and use their paragraph text as model context.
    pub full_text: bool,
    /// Per-page timeout for full-text downloads.
    pub page_timeout_secs: u64,
    pub feeds: Vec<FeedConfig>,
    pub nyt: NytConfig,
    pub guardian: GuardianConfig,
    pub summarizer: SummarizerConfig,
    pub dedup: DedupConfig,
    pub rules: RulesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("conflict_news.json"),
            report_path: None,
            retention_hours: 48,
            max_articles: 100,
            fetch_timeout_secs: 20,
            max_per_source: 50,
            full_text: false,
            page_timeout_secs: 10,
            feeds: default_feeds(),
            nyt: NytConfig::default(),
            guardian: GuardianConfig::default(),
            summarizer: SummarizerConfig::default(),
            dedup: DedupConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

/// One RSS or Atom feed and the provider it belongs to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FeedConfig {
    pub source: Source,
    pub url: String,
}

fn default_feeds() -> Vec<FeedConfig> {
    [
        (Source::Reuters, "https://openrss.org/www.reuters.com/world"),
        (Source::AP, "https://openrss.org/apnews.com/apf-intl"),
        (Source::BBC, "http://feeds.bbci.co.uk/news/world/rss.xml"),
        (Source::AlJazeera, "https://www.aljazeera.com/xml/rss/all.xml"),
        (Source::France24, "https://www.france24.com/en/rss"),
    ]
    .into_iter()
    .map(|(source, url)| FeedConfig {
        source,
        url: url.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NytConfig {
    pub base_url: String,
    pub section: String,
}

impl Default for NytConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.nytimes.com".to_string(),
            section: "world".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardianConfig {
    pub base_url: String,
    pub section: String,
    pub page_size: u32,
    pub max_pages: u32,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            base_url: "https://content.guardianapis.com".to_string(),
            section: "world".to_string(),
            page_size: 50,
            max_pages: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// OpenAI-compatible API root (the part before `/chat/completions`).
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Retries after the first failed call; at most one is allowed.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Minimum spacing between the start of two model calls.
    pub min_interval_ms: u64,
    pub concurrency: usize,
    /// Length of the description excerpt used when the model is unavailable.
    pub fallback_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
            max_retries: 1,
            retry_base_delay_ms: 1000,
            min_interval_ms: 1000,
            concurrency: 1,
            fallback_chars: 300,
        }
    }
}

impl SummarizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DedupConfig {
    /// Jaccard similarity of normalized titles at or above which two
    /// articles are duplicates.
    pub similarity_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
        }
    }
}

/// A named group of conflict-indicative terms.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    pub terms: Vec<String>,
}

/// Keyword rules for the relevance filter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub conflict: Vec<CategoryRule>,
    pub domestic: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        filter::default_rules()
    }
}

impl Config {
    /// Load configuration from `path`, or defaults when no path is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Io {
                    path: p.display().to_string(),
                    source,
                })?;
                let config = Self::from_yaml(&text)?;
                info!(path = %p.display(), "Loaded configuration");
                config
            }
            None => {
                info!("No config file given; using defaults");
                Config::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Config, ConfigError> {
        // An empty document deserializes to unit, not to a map.
        if text.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.dedup.similarity_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "dedup.similarity_threshold",
                reason: format!("{t} is not in (0, 1]"),
            });
        }
        if self.summarizer.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "summarizer.concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.summarizer.max_retries > 1 {
            return Err(ConfigError::Invalid {
                field: "summarizer.max_retries",
                reason: "at most one retry per article is allowed".to_string(),
            });
        }
        if self.summarizer.timeout_secs == 0
            || self.fetch_timeout_secs == 0
            || self.page_timeout_secs == 0
        {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "timeouts must be non-zero".to_string(),
            });
        }
        if self.summarizer.fallback_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "summarizer.fallback_chars",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rules.conflict.iter().all(|c| c.terms.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "rules.conflict",
                reason: "no conflict terms configured".to_string(),
            });
        }
        Ok(())
    }
}

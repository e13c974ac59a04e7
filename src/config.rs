//! Configuration file parser for `robonews.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as warnings so typos in a
//! cron-driven setup do not go unnoticed.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::enrich::EnrichSettings;
use crate::feed::FetchPolicy;
use crate::pipeline::RunLimits;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed source registry (JSON, category name → sources).
    pub feeds_file: PathBuf,

    /// Archive of enriched items (JSON array, newest first).
    pub archive_file: PathBuf,

    /// Prompt template with `{title}` and `{snippet}` placeholders.
    /// Falls back to the built-in template when the file does not exist.
    pub prompt_file: PathBuf,

    /// Where the transient economy batch is written for the renderer.
    pub economy_output: PathBuf,

    /// Archive size cap applied on every save; oldest items are evicted.
    pub max_archive_items: usize,

    /// Newly archived items allowed per run, across all sources.
    pub max_new_items: usize,

    /// Newly archived items allowed per run from paper sources.
    pub max_paper_items: usize,

    /// Entries older than this many whole days are never archived.
    pub recency_days: i64,

    /// Age limit for the transient economy batch.
    pub economy_recency_days: i64,

    /// Entries taken from each economy source when it sets no `limit`.
    pub economy_items_per_source: usize,

    /// Offset applied when formatting the archive `date` string.
    pub utc_offset_hours: i32,

    /// Re-run the classifier over the whole archive at the start of a run.
    pub reclassify_on_load: bool,

    pub fetch: FetchConfig,

    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds_file: PathBuf::from("feeds.json"),
            archive_file: PathBuf::from("news_archive.json"),
            prompt_file: PathBuf::from("prompt.md"),
            economy_output: PathBuf::from("economy_latest.json"),
            max_archive_items: 2000,
            max_new_items: 200,
            max_paper_items: 8,
            recency_days: 7,
            economy_recency_days: 3,
            economy_items_per_source: 4,
            utc_offset_hours: 9,
            reclassify_on_load: true,
            fetch: FetchConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

/// `[fetch]` section: feed HTTP retrieval.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Retries after a 429, 5xx or truncated body.
    pub max_retries: u32,
    /// First retry delay; doubles on each further retry.
    pub retry_base_ms: u64,
    pub max_feed_bytes: usize,
    /// Some feed hosts (Google News) reject clients without a browser UA.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            retry_base_ms: 1000,
            max_feed_bytes: 10 * 1024 * 1024,
            user_agent: "Mozilla/5.0 (compatible; robonews/0.1)".to_string(),
        }
    }
}

/// `[llm]` section: the translation/summary model.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an Ollama-compatible server.
    pub base_url: String,

    /// Candidate models, most capable first. Later entries are the fallback
    /// when a model is reported missing.
    pub models: Vec<String>,

    /// Bearer token for hosted endpoints (alternative to ROBONEWS_LLM_API_KEY).
    /// Env var takes precedence over config file.
    pub api_key: Option<String>,

    pub timeout_secs: u64,

    /// Attempts per item while the model answers "rate limited".
    pub max_attempts: u32,

    pub rate_limit_backoff_ms: u64,

    /// Pause after every enrichment call, successful or not.
    pub cooldown_ms: u64,

    /// Display width of the raw snippet used when enrichment fails.
    pub fallback_summary_width: usize,

    /// Without a `|||` delimiter, read the first line as the title.
    pub lenient_parse: bool,

    /// Pick the first responsive model once before processing items.
    pub probe_models: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            models: vec!["llama3".to_string(), "llama3.2:3b".to_string()],
            api_key: None,
            timeout_secs: 120,
            max_attempts: 3,
            rate_limit_backoff_ms: 30_000,
            cooldown_ms: 1000,
            fallback_summary_width: 200,
            lenient_parse: false,
            probe_models: true,
        }
    }
}

/// Mask api_key in Debug output so it never reaches the logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("rate_limit_backoff_ms", &self.rate_limit_backoff_ms)
            .field("cooldown_ms", &self.cooldown_ms)
            .field("fallback_summary_width", &self.fallback_summary_width)
            .field("lenient_parse", &self.lenient_parse)
            .field("probe_models", &self.probe_models)
            .finish()
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 14] = [
        "feeds_file",
        "archive_file",
        "prompt_file",
        "economy_output",
        "max_archive_items",
        "max_new_items",
        "max_paper_items",
        "recency_days",
        "economy_recency_days",
        "economy_items_per_source",
        "utc_offset_hours",
        "reclassify_on_load",
        "fetch",
        "llm",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            archive = %config.archive_file.display(),
            models = ?config.llm.models,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            timeout: Duration::from_secs(self.fetch.timeout_secs),
            max_retries: self.fetch.max_retries,
            retry_base: Duration::from_millis(self.fetch.retry_base_ms),
            max_bytes: self.fetch.max_feed_bytes,
        }
    }

    pub fn enrich_settings(&self) -> EnrichSettings {
        EnrichSettings {
            models: self.llm.models.clone(),
            max_attempts: self.llm.max_attempts,
            rate_limit_backoff: Duration::from_millis(self.llm.rate_limit_backoff_ms),
            cooldown: Duration::from_millis(self.llm.cooldown_ms),
            fallback_summary_width: self.llm.fallback_summary_width,
            lenient_parse: self.llm.lenient_parse,
        }
    }

    pub fn run_limits(&self) -> RunLimits {
        RunLimits {
            max_new_items: self.max_new_items,
            max_paper_items: self.max_paper_items,
            recency_days: self.recency_days,
            economy_recency_days: self.economy_recency_days,
            economy_items_per_source: self.economy_items_per_source,
            utc_offset_hours: self.utc_offset_hours,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

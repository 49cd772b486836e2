//! Configuration management for Paperstack
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values
//!
//! Credentials usually arrive through CLI flags or their env fallbacks and are
//! merged in by the binary before `validate` runs.

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Structured store (Notion) configuration
    #[serde(default)]
    pub notion: NotionConfig,

    /// Paper index (arXiv) configuration
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Recommendation service (Semantic Scholar) configuration
    #[serde(default)]
    pub scholar: ScholarConfig,

    /// Text generation (OpenAI) configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Retry policy for outbound calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Pipeline behaviour
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotionConfig {
    /// Integration token
    pub token: Option<String>,

    /// Target database (collection) id
    pub database_id: Option<String>,

    /// API base URL
    #[serde(default = "default_notion_base")]
    pub api_base: String,

    /// Notion-Version header value
    #[serde(default = "default_notion_version")]
    pub api_version: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Writes per batch
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,

    /// Pause between write batches in milliseconds
    #[serde(default = "default_batch_pause")]
    pub batch_pause_ms: u64,

    /// Pause between individual writes in milliseconds
    #[serde(default = "default_write_pause")]
    pub write_pause_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArxivConfig {
    /// Export API base URL
    #[serde(default = "default_arxiv_base")]
    pub api_base: String,

    /// Query used for new-paper discovery
    #[serde(default = "default_search_query")]
    pub search_query: String,

    /// Maximum results for new-paper discovery
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScholarConfig {
    /// Recommendations API base URL
    #[serde(default = "default_scholar_base")]
    pub api_base: String,

    /// Optional API key (raises rate limits)
    pub api_key: Option<String>,

    /// Maximum recommended papers kept per run
    #[serde(default = "default_recommend_max")]
    pub max_results: usize,

    /// Oldest publication year accepted
    #[serde(default = "default_min_year")]
    pub min_year: i32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// API key
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_llm_base")]
    pub api_base: String,

    /// Model used for abstract summaries
    #[serde(default = "default_summary_model")]
    pub summary_model: String,

    /// Model used for label classification
    #[serde(default = "default_label_model")]
    pub label_model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum attempts per call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Records published before this instant are marked explored on load
    #[serde(default = "default_explore_cutoff")]
    pub explore_cutoff: Option<DateTime<Utc>>,

    /// Authors kept for display
    #[serde(default = "default_author_cap")]
    pub author_cap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,
}

// Default value functions
fn default_notion_base() -> String { "https://api.notion.com/v1".to_string() }
fn default_notion_version() -> String { "2022-06-28".to_string() }
fn default_timeout() -> u64 { 30 }
fn default_write_batch_size() -> usize { 10 }
fn default_batch_pause() -> u64 { 1000 }
fn default_write_pause() -> u64 { 350 }
fn default_arxiv_base() -> String { "https://export.arxiv.org/api/query".to_string() }
fn default_search_max_results() -> usize { 500 }
fn default_scholar_base() -> String { "https://api.semanticscholar.org/recommendations/v1".to_string() }
fn default_recommend_max() -> usize { 10 }
fn default_min_year() -> i32 { 2018 }
fn default_llm_base() -> String { "https://api.openai.com/v1".to_string() }
fn default_summary_model() -> String { "gpt-4o-mini".to_string() }
fn default_label_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_max_attempts() -> u32 { 5 }
fn default_base_delay() -> u64 { 1000 }
fn default_author_cap() -> usize { 5 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }

fn default_search_query() -> String {
    "\"adversarial attacks\" OR \"language model attacks\" OR \"LLM vulnerabilities\" OR \
     \"AI security\" OR \"machine learning security\" OR \"jailbreak\" OR \"bypassing AI\""
        .to_string()
}

fn default_explore_cutoff() -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339("2024-07-01T00:00:00Z")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            api_base: default_notion_base(),
            api_version: default_notion_version(),
            timeout_secs: default_timeout(),
            write_batch_size: default_write_batch_size(),
            batch_pause_ms: default_batch_pause(),
            write_pause_ms: default_write_pause(),
        }
    }
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            api_base: default_arxiv_base(),
            search_query: default_search_query(),
            max_results: default_search_max_results(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api_base: default_scholar_base(),
            api_key: None,
            max_results: default_recommend_max(),
            min_year: default_min_year(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_llm_base(),
            summary_model: default_summary_model(),
            label_model: default_label_model(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            explore_cutoff: default_explore_cutoff(),
            author_cap: default_author_cap(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notion: NotionConfig::default(),
            arxiv: ArxivConfig::default(),
            scholar: ScholarConfig::default(),
            llm: LlmConfig::default(),
            retry: RetryConfig::default(),
            pipeline: PipelineConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__NOTION__WRITE_BATCH_SIZE=5
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file
    pub fn from_file(path: &str) -> std::result::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Fail fast on missing credentials, before any external call is made
    pub fn validate(&self) -> Result<()> {
        require("notion.token", self.notion.token.as_deref())?;
        require("notion.database_id", self.notion.database_id.as_deref())?;
        require("llm.api_key", self.llm.api_key.as_deref())?;

        if self.retry.max_attempts == 0 {
            return Err(AppError::Configuration {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.notion.write_batch_size == 0 {
            return Err(AppError::Configuration {
                message: "notion.write_batch_size must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Target collection id; only meaningful after `validate`
    pub fn database_id(&self) -> &str {
        self.notion.database_id.as_deref().unwrap_or_default()
    }
}

fn require(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(AppError::Configuration {
            message: format!("missing required setting `{}`", field),
        }),
    }
}

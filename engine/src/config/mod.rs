//! Configuration management
//!
//! This module handles loading, validation, and management of the TiaBridge
//! configuration. Configuration is stored in TOML format at
//! ~/.tiabridge/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, data directory
//! - **llm**: LLM provider settings and preferences
//! - **local_api**: Base URL of the local analytics API
//! - **upstream**: Base URL and limits of the upstream Cosmos REST API
//! - **query**: Pagination caps, step concurrency, step timeouts
//! - **server**: Web chat bind address
//!
//! API keys are never stored in the config file; they are read from the
//! `GEMINI_API_KEY` and `GROK_API_KEY` environment variables.
//!
//! # Examples
//!
//! ```no_run
//! use tiabridge_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! println!("Default provider: {}", config.llm.default_provider);
//! println!("Page cap: {}", config.query.page_cap);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// Represents the complete TiaBridge configuration loaded from
/// ~/.tiabridge/config.toml. Every section has sensible defaults so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Local analytics API settings
    #[serde(default)]
    pub local_api: LocalApiConfig,

    /// Upstream Cosmos REST API settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Query execution settings
    #[serde(default)]
    pub query: QueryConfig,

    /// Web chat server settings
    #[serde(default)]
    pub server: ServerConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default LLM provider (gemini, grok)
    #[serde(default = "default_llm_provider")]
    pub default_provider: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Gemini provider settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Grok provider settings
    #[serde(default)]
    pub grok: GrokConfig,
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL for the Generative Language API
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,
    // Note: API key read from GEMINI_API_KEY, not from config
}

/// Grok provider configuration (OpenAI-compatible API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrokConfig {
    /// Base URL for the xAI API
    #[serde(default = "default_grok_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_grok_model")]
    pub model: String,
    // Note: API key read from GROK_API_KEY, not from config
}

/// Local analytics API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalApiConfig {
    /// Base URL of the local analytics API
    #[serde(default = "default_local_api_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Default page size (the API's `limit` parameter)
    #[serde(default = "default_local_page_size")]
    pub page_size: u64,
}

/// Upstream Cosmos REST API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the Cosmos REST API
    #[serde(default = "default_upstream_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,

    /// Default page size (`pagination.limit`)
    #[serde(default = "default_upstream_page_size")]
    pub page_size: u64,
}

/// Query execution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Maximum number of page calls in one pagination walk.
    /// Reaching the cap stops the walk and marks the result truncated.
    #[serde(default = "default_page_cap")]
    pub page_cap: u32,

    /// Maximum rows retained by the `collect` and `top_n` reducers
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,

    /// Maximum concurrently running plan steps
    #[serde(default = "default_max_concurrent_steps")]
    pub max_concurrent_steps: usize,

    /// Per-step deadline in seconds
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    /// Retries per page on transient failures
    #[serde(default = "default_page_retries")]
    pub page_retries: u32,

    /// Base backoff delay between page retries, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Web chat server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the web chat transport
    #[serde(default = "default_bind_addr")]
    pub bind: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.tiabridge")
}

fn default_llm_provider() -> String {
    "gemini".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_grok_base_url() -> String {
    "https://api.x.ai/v1".to_string()
}

fn default_grok_model() -> String {
    "grok-3-mini".to_string()
}

fn default_local_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_upstream_url() -> String {
    "https://api-celestia-mainnet.validexis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    20
}

fn default_local_page_size() -> u64 {
    100
}

fn default_upstream_page_size() -> u64 {
    100
}

fn default_page_cap() -> u32 {
    50
}

fn default_result_cap() -> usize {
    1000
}

fn default_max_concurrent_steps() -> usize {
    4
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_page_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_provider: default_llm_provider(),
            call_timeout_secs: default_llm_timeout_secs(),
            gemini: GeminiConfig::default(),
            grok: GrokConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
        }
    }
}

impl Default for GrokConfig {
    fn default() -> Self {
        Self {
            base_url: default_grok_base_url(),
            model: default_grok_model(),
        }
    }
}

impl Default for LocalApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_local_api_url(),
            timeout_secs: default_request_timeout_secs(),
            page_size: default_local_page_size(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_url(),
            timeout_secs: default_request_timeout_secs(),
            page_size: default_upstream_page_size(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_cap: default_page_cap(),
            result_cap: default_result_cap(),
            max_concurrent_steps: default_max_concurrent_steps(),
            step_timeout_secs: default_step_timeout_secs(),
            page_retries: default_page_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_addr(),
        }
    }
}

impl Config {
    /// Default config file path: ~/.tiabridge/config.toml
    pub fn default_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".into()))?;
        Ok(home.join(".tiabridge").join("config.toml"))
    }

    /// Load configuration from the default location, creating a default
    /// config file if none exists.
    pub fn load_or_create() -> Result<Self, EngineError> {
        let path = Self::default_path()?;
        if !path.exists() {
            let config = Config::default();
            config.save(&path)?;
            tracing::info!("Created default configuration at {:?}", path);
            return Ok(config);
        }
        Self::load_from_path(&path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let mut config: Config = toml::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("Failed to parse {:?}: {}", path, e)))?;
        config.core.data_dir = expand_tilde(&config.core.data_dir);
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration as TOML to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::Config(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, raw)
            .map_err(|e| EngineError::Config(format!("Failed to write {:?}: {}", path, e)))
    }

    /// Validate configuration invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !matches!(self.llm.default_provider.as_str(), "gemini" | "grok") {
            return Err(EngineError::Config(format!(
                "Unknown llm.default_provider '{}' (expected 'gemini' or 'grok')",
                self.llm.default_provider
            )));
        }
        if self.query.page_cap == 0 {
            return Err(EngineError::Config("query.page_cap must be at least 1".into()));
        }
        if self.query.max_concurrent_steps == 0 {
            return Err(EngineError::Config(
                "query.max_concurrent_steps must be at least 1".into(),
            ));
        }
        for (name, url) in [
            ("local_api.base_url", &self.local_api.base_url),
            ("upstream.base_url", &self.upstream.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(EngineError::Config(format!(
                    "{} must start with http:// or https://",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.default_provider, "gemini");
        assert_eq!(config.query.page_cap, 50);
        assert_eq!(config.query.max_concurrent_steps, 4);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.upstream.page_size, 100);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let raw = r#"
            [llm]
            default_provider = "grok"

            [query]
            page_cap = 5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.llm.default_provider, "grok");
        assert_eq!(config.query.page_cap, 5);
        // Untouched sections keep defaults
        assert_eq!(config.query.max_concurrent_steps, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let raw = r#"
            [llm]
            default_provider = "no_such_provider"
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_page_cap_rejected() {
        let raw = "[query]\npage_cap = 0\n";
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_base_url_rejected() {
        let raw = "[upstream]\nbase_url = \"ftp://example.com\"\n";
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.query.page_cap = 7;
        config.save(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.query.page_cap, 7);
    }
}

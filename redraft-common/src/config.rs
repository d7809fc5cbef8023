//! Configuration loading and root folder resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap**: root folder, port, logging, upstream endpoints, pipeline tuning
//! 2. **Database runtime**: `settings` table (highest priority for secrets such as API keys)
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "redraft.db";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "REDRAFT_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; missing values fall back to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port (optional, CLI/env take precedence)
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub fetcher: FetcherConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level / filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Streaming generation backend (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,

    /// API key (lowest priority source; database and environment win)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Whole-request timeout, including the streamed body
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,

    /// Upstream rate limit shared by all item jobs
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_generation_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

/// Content-detail fetch service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_fetcher_base_url")]
    pub base_url: String,

    #[serde(default = "default_fetcher_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: default_fetcher_base_url(),
            timeout_secs: default_fetcher_timeout_secs(),
        }
    }
}

/// When an item counts as completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSuccessPolicy {
    /// At least one variant completed
    #[default]
    AnyVariant,
    /// Every pre-created variant completed
    AllVariants,
}

/// Regeneration pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Variants pre-created and requested per item
    #[serde(default = "default_variants_per_item")]
    pub variants_per_item: usize,

    /// Worker pool width shared by all running tasks
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Upper bound of the randomized start delay per item job
    #[serde(default = "default_jitter_max_ms")]
    pub jitter_max_ms: u64,

    /// Credits charged per item at submission
    #[serde(default = "default_unit_cost")]
    pub unit_cost: i64,

    /// Domains an item reference must link to
    #[serde(default = "default_allowed_domains")]
    pub allowed_domains: Vec<String>,

    #[serde(default)]
    pub item_success_policy: ItemSuccessPolicy,

    /// Resume tasks interrupted by a restart (false: fail and refund them)
    #[serde(default = "default_true")]
    pub resume_interrupted: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            variants_per_item: default_variants_per_item(),
            max_concurrent_items: default_max_concurrent_items(),
            jitter_max_ms: default_jitter_max_ms(),
            unit_cost: default_unit_cost(),
            allowed_domains: default_allowed_domains(),
            item_success_policy: ItemSuccessPolicy::default(),
            resume_interrupted: true,
        }
    }
}

/// Database tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Max connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// SQLite busy timeout per statement
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Total retry budget for writes that hit lock contention
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_generation_timeout_secs() -> u64 {
    180
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_fetcher_base_url() -> String {
    "http://127.0.0.1:5800".to_string()
}

fn default_fetcher_timeout_secs() -> u64 {
    20
}

fn default_variants_per_item() -> usize {
    2
}

fn default_max_concurrent_items() -> usize {
    4
}

fn default_jitter_max_ms() -> u64 {
    2000
}

fn default_unit_cost() -> i64 {
    1
}

fn default_allowed_domains() -> Vec<String> {
    vec!["xiaohongshu.com".to_string(), "xhslink.com".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_connections() -> u32 {
    20
}

fn default_busy_timeout_ms() -> u64 {
    250
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

/// Load TOML bootstrap config
///
/// A missing file is not an error: a warning is logged and defaults are used.
/// A file that exists but does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Default TOML path: `<config dir>/redraft/redraft.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("redraft").join("redraft.toml"))
        .unwrap_or_else(|| PathBuf::from("redraft.toml"))
}

/// Resolve the root folder following CLI → env → TOML → OS default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("redraft"))
        .unwrap_or_else(|| PathBuf::from("./redraft_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

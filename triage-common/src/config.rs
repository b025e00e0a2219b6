//! Bootstrap configuration
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: the caller logs a warning and
//! continues with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "TRIAGE_CONFIG";

/// Environment variables checked for the generative-language API key, in order
pub const API_KEY_ENV_VARS: [&str; 2] = ["TRIAGE_GEMINI_API_KEY", "GEMINI_API_KEY"];

/// Bootstrap configuration loaded from TOML
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the review file or database
    pub data_dir: PathBuf,
    pub bind_address: String,
    /// Port for the customer submission surface
    pub customer_port: u16,
    /// Port for the admin dashboard surface
    pub admin_port: u16,
    /// Bearer token for admin routes; empty or absent disables auth
    pub admin_token: Option<String>,
    pub store: StoreConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            bind_address: "127.0.0.1".to_string(),
            customer_port: 8501,
            admin_port: 8502,
            admin_token: None,
            store: StoreConfig::default(),
            ai: AiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which backing store holds the reviews
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Csv,
    Sqlite,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(StoreBackend::Csv),
            "sqlite" => Ok(StoreBackend::Sqlite),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(Error::Config(format!(
                "Unknown store backend '{}' (expected csv, sqlite or memory)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Explicit file path; defaults to `<data_dir>/reviews.csv` or `reviews.db`
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self, data_dir: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => match self.backend {
                StoreBackend::Sqlite => data_dir.join("reviews.db"),
                StoreBackend::Csv | StoreBackend::Memory => data_dir.join("reviews.csv"),
            },
        }
    }
}

/// Generative-language API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
    /// Pause between rows during a batch
    pub batch_delay_ms: u64,
    /// Enrich each submission immediately and show the reply to the customer
    pub enrich_on_submit: bool,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 30,
            batch_delay_ms: 500,
            enrich_on_submit: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log file path (logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Default config file location for the platform
///
/// `~/.config/review-triage/config.toml` on Linux, the platform config
/// directory elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("review-triage").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Locate and load the TOML config
///
/// An explicitly named file (argument or [`CONFIG_ENV_VAR`]) must exist. The
/// platform default location is optional: when absent, defaults are used.
pub fn resolve_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from));

    if let Some(path) = explicit {
        let config = load_toml_config(&path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!("No config file at {}; using built-in defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory; using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Serialize a config back to TOML text
pub fn to_toml_string(config: &TomlConfig) -> Result<String> {
    toml::to_string_pretty(config).map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the generative-language API key
///
/// **Priority:** ENV → TOML. Returns `None` when no valid key is configured,
/// which disables AI enrichment.
pub fn resolve_api_key(ai: &AiConfig) -> Option<String> {
    let env_key = API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| (*name, v)))
        .find(|(_, v)| is_valid_key(v));
    let toml_key = ai.api_key.as_ref().filter(|k| is_valid_key(k));

    if env_key.is_some() && toml_key.is_some() {
        warn!("API key found in both environment and TOML config. Using environment.");
    }

    if let Some((name, key)) = env_key {
        info!("API key loaded from environment variable {}", name);
        return Some(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Some(key.trim().to_string());
    }

    None
}

/// Admin token with empty values treated as unset
pub fn effective_admin_token(config: &TomlConfig) -> Option<String> {
    config
        .admin_token
        .as_ref()
        .filter(|t| is_valid_key(t))
        .map(|t| t.trim().to_string())
}

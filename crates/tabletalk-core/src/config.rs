//! Configuration system for tabletalk.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $TABLETALK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/tabletalk/config.toml
//!   3. ~/.config/tabletalk/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TabletalkConfig {
    pub dataset: DatasetConfig,
    pub model: ModelConfig,
    pub pool: PoolConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// CSV file loaded into the queryable table at startup.
    pub csv_path: PathBuf,
    /// SQL table name the dataset is exposed under.
    pub table_name: String,
    /// SQLite database file. Empty = alongside the CSV.
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent with every completion request.
    pub id: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request timeout in seconds. 0 = no timeout.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent workers. Work is I/O-bound on the completion
    /// API, so this is independent of CPU count.
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// HTTP listen port.
    pub port: u16,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for TabletalkConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            model: ModelConfig::default(),
            pool: PoolConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            csv_path: data_dir().join("dataset.csv"),
            table_name: "dataset".to_string(),
            db_path: PathBuf::new(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            id: "gpt-4o".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { port: 9210 }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("tabletalk")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("tabletalk")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {1}", .0.display())]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {}: {1}", .0.display())]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {}: {1}", .0.display())]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl TabletalkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            TabletalkConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("TABLETALK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&TabletalkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply TABLETALK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TABLETALK_DATASET__CSV_PATH") {
            self.dataset.csv_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TABLETALK_DATASET__TABLE_NAME") {
            self.dataset.table_name = v;
        }
        if let Ok(v) = std::env::var("TABLETALK_MODEL__ID") {
            self.model.id = v;
        }
        if let Ok(v) = std::env::var("TABLETALK_MODEL__API_BASE") {
            self.model.api_base = v;
        }
        if let Ok(v) = std::env::var("TABLETALK_POOL__WORKERS") {
            if let Ok(n) = v.parse() {
                self.pool.workers = n;
            }
        }
        if let Ok(v) = std::env::var("TABLETALK_API__PORT") {
            if let Ok(p) = v.parse() {
                self.api.port = p;
            }
        }
    }
}

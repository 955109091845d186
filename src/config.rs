//! Configuration loading for mini-index.
//!
//! Every field has a default, so an absent or partial TOML file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capabilities::Capabilities;
use crate::error::ConfigError;

const APP_DIR: &str = "mini-index";
const DATA_DIR_ENV: &str = "MINI_INDEX_DATA_DIR";

/// Size of 1 MiB in bytes
const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub indexing: IndexingConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding both storage tiers
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Serialized indexes at or above this size skip the bounded tier
    #[serde(default = "default_bounded_threshold")]
    pub bounded_threshold_bytes: usize,

    /// Capacity of the bounded tier
    #[serde(default = "default_bounded_quota")]
    pub bounded_quota_bytes: usize,
}

fn default_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

fn default_bounded_threshold() -> usize {
    5 * MIB
}

fn default_bounded_quota() -> usize {
    5 * MIB
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bounded_threshold_bytes: default_bounded_threshold(),
            bounded_quota_bytes: default_bounded_quota(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Persist finished indexes. Unset means: persist in release builds or
    /// when running as an installed binary.
    #[serde(default)]
    pub persist: Option<bool>,

    /// How long the finished progress stays visible (ms)
    #[serde(default = "default_progress_clear_delay_ms")]
    pub progress_clear_delay_ms: u64,
}

fn default_progress_clear_delay_ms() -> u64 {
    1000
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            persist: None,
            progress_clear_delay_ms: default_progress_clear_delay_ms(),
        }
    }
}

impl IndexingConfig {
    pub fn should_persist(&self, capabilities: &Capabilities) -> bool {
        self.persist
            .unwrap_or(!cfg!(debug_assertions) || capabilities.standalone)
    }

    pub fn progress_clear_delay(&self) -> Duration {
        Duration::from_millis(self.progress_clear_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Scale factor for the first-page PDF thumbnail
    #[serde(default = "default_pdf_scale")]
    pub pdf_scale: f32,

    /// Explicit pdfium library; the system library is tried otherwise
    #[serde(default)]
    pub pdfium_library: Option<PathBuf>,
}

fn default_pdf_scale() -> f32 {
    0.5
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            pdf_scale: default_pdf_scale(),
            pdfium_library: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads the config from `path`, or from the default location when it
    /// exists, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

// csvcombine configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from CSVCOMBINE_CONFIG env var (or --config)
// 3. Config file contents from CSVCOMBINE_CONFIG_CONTENT env var
// 4. Default config file location (./csvcombine.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::combine::{CombineOptions, EmptyFilePolicy, COMBINED_FILE_NAME};

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, CONNECTION_STRING_ENV, ENV_PREFIX};

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub combine: CombineConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub azblob: Option<AzblobConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Azblob,
            azblob: Some(AzblobConfig::default()),
            fs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Azblob,
    Fs,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Azblob => write!(f, "azblob"),
            StorageBackend::Fs => write!(f, "fs"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "azblob" | "azure" => Ok(StorageBackend::Azblob),
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: azblob, fs", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzblobConfig {
    /// Storage account connection string. Usually supplied through the
    /// environment rather than a file.
    #[serde(default, skip_serializing)]
    pub connection_string: String,
    #[serde(default = "default_container")]
    pub container: String,
}

fn default_container() -> String {
    "miz-container".to_string()
}

impl Default for AzblobConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            container: default_container(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

/// How each directory is merged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub output_name: String,
    pub exclude_output: bool,
    pub empty_file_policy: EmptyFilePolicy,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            output_name: COMBINED_FILE_NAME.to_string(),
            exclude_output: false,
            empty_file_policy: EmptyFilePolicy::Abort,
        }
    }
}

impl CombineConfig {
    pub fn options(&self) -> CombineOptions {
        CombineOptions {
            output_name: self.output_name.clone(),
            exclude_output: self.exclude_output,
            empty_file_policy: self.empty_file_policy,
        }
    }
}

/// When the scheduled mode fires
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Time of day as `HH:MM` or `HH:MM:SS`
    pub at: String,
    pub run_on_startup: bool,
    pub timezone: Timezone,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            at: "11:00".to_string(),
            run_on_startup: true,
            timezone: Timezone::Utc,
        }
    }
}

impl ScheduleConfig {
    pub fn time_of_day(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.at, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&self.at, "%H:%M"))
            .with_context(|| format!("schedule.at must be HH:MM or HH:MM:SS, got '{}'", self.at))
    }
}

/// Clock used both for the daily fire time and for picking the run's date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timezone {
    Utc,
    Local,
}

impl std::str::FromStr for Timezone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "utc" => Ok(Timezone::Utc),
            "local" => Ok(Timezone::Local),
            _ => anyhow::bail!("Unsupported timezone: {}. Supported: utc, local", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Parse TOML content on top of the defaults, then apply env overrides.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = match inline_config {
            Some(inline) => toml::from_str(inline).context("Failed to parse config content")?,
            None => RuntimeConfig::default(),
        };

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

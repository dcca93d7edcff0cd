use super::{
    AzblobConfig, FsConfig, LogFormat, RuntimeConfig, StorageBackend, Timezone,
};
use crate::combine::EmptyFilePolicy;
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "CSVCOMBINE_";

/// Connection string variable used by Azure hosting environments.
pub const CONNECTION_STRING_ENV: &str = "AzureWebJobsStorage";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    /// Get a variable WITH the CSVCOMBINE_ prefix applied
    fn get(&self, key: &str) -> Option<String>;

    /// Get a variable WITHOUT the CSVCOMBINE_ prefix
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Storage backend
    if let Some(backend) = env.get("STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid CSVCOMBINE_STORAGE_BACKEND value")?;
    }

    // Azure Blob: the hosting variable first, the prefixed one wins if both are set
    if let Some(conn) = env.get_raw(CONNECTION_STRING_ENV) {
        ensure_azblob(config).connection_string = conn;
    }
    if let Some(conn) = env.get("AZBLOB_CONNECTION_STRING") {
        ensure_azblob(config).connection_string = conn;
    }
    if let Some(container) = env.get("AZBLOB_CONTAINER") {
        ensure_azblob(config).container = container;
    }

    // Filesystem storage
    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // Combine behaviour
    if let Some(name) = env.get("OUTPUT_NAME") {
        config.combine.output_name = name;
    }
    if let Some(val) = get_env_bool(env, "EXCLUDE_OUTPUT")? {
        config.combine.exclude_output = val;
    }
    if let Some(policy) = env.get("EMPTY_FILE_POLICY") {
        config.combine.empty_file_policy = policy
            .parse::<EmptyFilePolicy>()
            .context("Invalid CSVCOMBINE_EMPTY_FILE_POLICY value")?;
    }

    // Schedule
    if let Some(at) = env.get("SCHEDULE_AT") {
        config.schedule.at = at;
    }
    if let Some(val) = get_env_bool(env, "RUN_ON_STARTUP")? {
        config.schedule.run_on_startup = val;
    }
    if let Some(tz) = env.get("TIMEZONE") {
        config.schedule.timezone = tz
            .parse::<Timezone>()
            .context("Invalid CSVCOMBINE_TIMEZONE value")?;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn ensure_azblob(config: &mut RuntimeConfig) -> &mut AzblobConfig {
    config
        .storage
        .azblob
        .get_or_insert_with(AzblobConfig::default)
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

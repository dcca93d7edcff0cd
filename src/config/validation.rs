// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_storage_config(&config.storage)?;
    validate_combine_config(&config.combine)?;
    config.schedule.time_of_day()?;
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Azblob => {
            let azblob = config.azblob.as_ref().ok_or_else(|| {
                anyhow::anyhow!("azblob storage backend requires 'azblob' configuration")
            })?;

            if azblob.connection_string.is_empty() {
                bail!(
                    "Azure Blob connection string is required\n\n\
                    How to fix:\n\
                      • Environment: export {}=<connection-string>\n\
                      • Environment: export {}AZBLOB_CONNECTION_STRING=<connection-string>\n",
                    CONNECTION_STRING_ENV,
                    ENV_PREFIX
                );
            }

            if azblob.container.is_empty() {
                bail!(
                    "Azure Blob container name is required\n\n\
                    How to fix:\n\
                      • Environment: export {}AZBLOB_CONTAINER=my-container\n\
                      • TOML: [storage.azblob]\n              container = \"my-container\"\n",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export {}STORAGE_PATH=/data/blobs\n\
                      • TOML: [storage.fs]\n              path = \"/data/blobs\"\n",
                    ENV_PREFIX
                );
            }
        }
    }

    Ok(())
}

fn validate_combine_config(config: &CombineConfig) -> Result<()> {
    if config.output_name.is_empty() || config.output_name.contains('/') {
        bail!(
            "combine.output_name must be a plain file name, got '{}'",
            config.output_name
        );
    }

    if !config.output_name.ends_with(crate::combine::CSV_SUFFIX) {
        bail!(
            "combine.output_name must end with '.csv', got '{}'",
            config.output_name
        );
    }

    Ok(())
}

// Startup wiring
//
// Storage backend and logging/tracing setup

use crate::config::{LogConfig, LogFormat, StorageBackend, StorageConfig};
use crate::storage::{BlobStore, OpenDalStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Build the blob store for the configured backend
pub fn init_storage(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    info!("Initializing storage with backend: {}", config.backend);

    match config.backend {
        StorageBackend::Azblob => {
            if let Some(azblob) = config.azblob.as_ref() {
                info!("Using Azure Blob storage: container={}", azblob.container);
            }
        }
        StorageBackend::Fs => {
            if let Some(fs) = config.fs.as_ref() {
                info!("Using filesystem storage at: {}", fs.path);
            }
        }
    }

    let store = OpenDalStore::from_config(config).context("Failed to initialize storage")?;
    Ok(Arc::new(store))
}

/// Initialize tracing/logging. `RUST_LOG` wins over `log.level` when set.
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Ignore the error if a subscriber is already set
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}

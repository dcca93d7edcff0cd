//! Blob storage handle.
//!
//! The job never reaches for a global client: a `BlobStore` is built once at
//! startup and passed into discovery and combination. `OpenDalStore` backs it
//! with an OpenDAL operator (Azure Blob in production, filesystem for local
//! runs, memory in tests).

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::StorageError;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Minimal object-store surface the job needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// All blob names under `prefix` (recursive), in lexicographic order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Full content of one blob.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a blob.
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct OpenDalStore {
    operator: Operator,
}

impl OpenDalStore {
    pub fn new(operator: Operator) -> Self {
        Self { operator }
    }

    /// Build the operator for the configured backend.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let init_error = |source: opendal::Error| StorageError::Init {
            backend: config.backend.to_string(),
            source,
        };

        let operator = match config.backend {
            StorageBackend::Azblob => {
                let azblob = config.azblob.clone().unwrap_or_default();
                let builder = opendal::services::Azblob::from_connection_string(
                    &azblob.connection_string,
                )
                .map_err(init_error)?
                .container(&azblob.container);

                Operator::new(builder).map_err(init_error)?.finish()
            }
            StorageBackend::Fs => {
                let fs = config.fs.clone().unwrap_or_default();
                let builder = opendal::services::Fs::default().root(&fs.path);
                Operator::new(builder).map_err(init_error)?.finish()
            }
        };

        tracing::debug!("Storage operator initialized for {}", config.backend);
        Ok(Self::new(operator))
    }
}

#[async_trait]
impl BlobStore for OpenDalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = match self.operator.list_with(prefix).recursive(true).await {
            Ok(entries) => entries,
            // A partition nobody has uploaded to yet is simply empty.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::operation("list", prefix, e)),
        };

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().mode().is_file())
            .map(|entry| entry.path().trim_start_matches('/').to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let buffer = self
            .operator
            .read(path)
            .await
            .map_err(|e| StorageError::operation("read", path, e))?;
        Ok(buffer.to_vec())
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.operator
            .write(path, data)
            .await
            .map_err(|e| StorageError::operation("write", path, e))?;
        Ok(())
    }
}

// Failure injection for BlobStore consumers

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage::{BlobStore, Result};

/// Wraps a store and fails selected calls with an opendal `Unexpected` error.
pub(crate) struct FailingStore<S> {
    inner: S,
    fail_list: bool,
    fail_read_suffix: Option<String>,
    fail_write: bool,
}

impl<S: BlobStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_list: false,
            fail_read_suffix: None,
            fail_write: false,
        }
    }

    pub fn fail_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn fail_read(mut self, suffix: &str) -> Self {
        self.fail_read_suffix = Some(suffix.to_string());
        self
    }

    pub fn fail_write(mut self) -> Self {
        self.fail_write = true;
        self
    }
}

fn injected(operation: &'static str, path: &str) -> StorageError {
    StorageError::operation(
        operation,
        path,
        opendal::Error::new(opendal::ErrorKind::Unexpected, "injected failure"),
    )
}

#[async_trait]
impl<S: BlobStore> BlobStore for FailingStore<S> {
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_list {
            return Err(injected("list", prefix));
        }
        self.inner.list(prefix).await
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        if let Some(suffix) = &self.fail_read_suffix {
            if path.ends_with(suffix.as_str()) {
                return Err(injected("read", path));
            }
        }
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        if self.fail_write {
            return Err(injected("write", path));
        }
        self.inner.write(path, data).await
    }
}

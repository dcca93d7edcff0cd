//! Error types for discovery, combination, and storage access.

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E101: Listing blobs failed
    E101ListingFailed,
    /// E102: Downloading a blob failed
    E102ReadFailed,
    /// E103: Blob content is not valid UTF-8
    E103DecodeFailed,
    /// E104: The CSV reader rejected a blob (reader failure only; see `CombineError::Parse`)
    E104ParseFailed,
    /// E105: A CSV blob has no rows at all
    E105EmptyFile,
    /// E106: Writing rows to the output buffer failed
    E106EncodeFailed,
    /// E107: Uploading the combined blob failed
    E107UploadFailed,
    /// E108: Storage backend could not be constructed
    E108StorageInit,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E101ListingFailed => "E101",
            Self::E102ReadFailed => "E102",
            Self::E103DecodeFailed => "E103",
            Self::E104ParseFailed => "E104",
            Self::E105EmptyFile => "E105",
            Self::E106EncodeFailed => "E106",
            Self::E107UploadFailed => "E107",
            Self::E108StorageInit => "E108",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single call against the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("[E108] Failed to create {backend} storage operator: {source}")]
    Init {
        backend: String,
        #[source]
        source: opendal::Error,
    },

    #[error("{operation} '{path}' failed: {source}")]
    Operation {
        operation: &'static str,
        path: String,
        #[source]
        source: opendal::Error,
    },
}

impl StorageError {
    pub(crate) fn operation(operation: &'static str, path: &str, source: opendal::Error) -> Self {
        Self::Operation {
            operation,
            path: path.to_string(),
            source,
        }
    }

    /// The underlying opendal error kind, for callers that branch on NotFound etc.
    pub fn kind(&self) -> opendal::ErrorKind {
        match self {
            Self::Init { source, .. } | Self::Operation { source, .. } => source.kind(),
        }
    }
}

/// Errors from enumerating the subdirectories of a date partition
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("[E101] Failed to list blobs under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StorageError,
    },
}

impl DiscoverError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Listing { .. } => ErrorCode::E101ListingFailed,
        }
    }
}

/// Errors from combining the CSV files of one directory.
///
/// Every variant is raised before the upload except `Upload`, so the previous
/// combined blob is left untouched whenever any other variant is returned.
#[derive(Debug, Error)]
pub enum CombineError {
    #[error("[E101] Failed to list blobs under '{directory}': {source}")]
    Listing {
        directory: String,
        #[source]
        source: StorageError,
    },

    #[error("[E102] Failed to download '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("[E103] '{path}' is not valid UTF-8: {source}")]
    Decode {
        path: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Reader error from the csv crate. Sources are decoded to UTF-8 before
    /// parsing and the reader is flexible, so this only guards the reader
    /// itself; no well-formed input reaches it.
    #[error("[E104] '{path}' is not valid CSV: {source}")]
    Parse {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("[E105] '{path}' has no header row")]
    EmptyFile { path: String },

    #[error("[E106] Failed to encode combined CSV: {source}")]
    Encode {
        #[source]
        source: std::io::Error,
    },

    #[error("[E107] Failed to upload '{path}': {source}")]
    Upload {
        path: String,
        #[source]
        source: StorageError,
    },
}

impl CombineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Listing { .. } => ErrorCode::E101ListingFailed,
            Self::Read { .. } => ErrorCode::E102ReadFailed,
            Self::Decode { .. } => ErrorCode::E103DecodeFailed,
            Self::Parse { .. } => ErrorCode::E104ParseFailed,
            Self::EmptyFile { .. } => ErrorCode::E105EmptyFile,
            Self::Encode { .. } => ErrorCode::E106EncodeFailed,
            Self::Upload { .. } => ErrorCode::E107UploadFailed,
        }
    }
}

//! Error types for archive access.

use std::io;

use thiserror::Error;
use zip::result::ZipError;

/// Errors raised while reading archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Invalid virtual path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed archive {archive}: {message}")]
    Malformed { archive: String, message: String },

    #[error("Unsupported archive {archive}: {message}")]
    Unsupported { archive: String, message: String },

    #[error("Range {offset}+{len} is outside {archive} ({size} bytes)")]
    OutOfRange {
        archive: String,
        offset: u64,
        len: u64,
        size: u64,
    },
}

impl ArchiveError {
    /// Create an InvalidPath error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a Malformed error.
    pub fn malformed(archive: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Classify a reqwest failure, separating timeouts.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(url.to_string())
        } else {
            Self::Http {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Classify a failure from the zip reader.
    pub fn from_zip(archive: &str, err: ZipError) -> Self {
        match err {
            ZipError::Io(e) => Self::from_io(archive, e),
            ZipError::InvalidArchive(message) => Self::malformed(archive, message),
            ZipError::UnsupportedArchive(message) => Self::Unsupported {
                archive: archive.to_string(),
                message: message.to_string(),
            },
            other => Self::malformed(archive, other.to_string()),
        }
    }

    /// Unwrap range-source errors carried through `std::io`; corrupt data
    /// (including CRC mismatches) becomes Malformed.
    pub fn from_io(archive: &str, err: io::Error) -> Self {
        if err.get_ref().is_some_and(|inner| inner.is::<ArchiveError>()) {
            if let Some(Ok(inner)) = err.into_inner().map(|e| e.downcast::<ArchiveError>()) {
                return *inner;
            }
            return Self::malformed(archive, "unreadable archive");
        }
        if err.kind() == io::ErrorKind::InvalidData {
            return Self::malformed(archive, err.to_string());
        }
        Self::Io(err)
    }

    /// Whether this error came from a timed-out request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ArchiveError>;

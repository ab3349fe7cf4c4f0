//! Error types for blob operations.

use std::io;
use thiserror::Error;

/// Result type for blob operations.
pub type Result<T> = std::result::Result<T, BlobError>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("blob writer for {0} is already finished")]
    Finished(String),

    #[error("I/O error on blob {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl BlobError {
    pub(crate) fn io(name: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            return BlobError::NotFound(name.to_string());
        }
        BlobError::Io {
            name: name.to_string(),
            source,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}

//! Unified error types for linkpeek.
//!
//! Only `InvalidUrl` and `NoMetadataFound` are expected to reach a caller;
//! fetch and cache failures are absorbed by the extraction pipeline.

use tokio_rusqlite::rusqlite;

/// Unified error types for the linkpeek service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The requested URL failed validation.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Neither extraction stage produced any metadata.
    #[error("NO_METADATA_FOUND: {0}")]
    NoMetadataFound(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A stored cache row could not be decoded.
    #[error("CACHE_ERROR: invalid record: {0}")]
    InvalidRecord(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),
}

impl Error {
    /// Whether this error belongs to the cache layer.
    pub fn is_cache_error(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_) | Error::InvalidRecord(_))
    }

    /// Whether this error is an ordinary fetch failure (timeout, oversize body, bad status).
    pub fn is_transient_fetch(&self) -> bool {
        matches!(self, Error::FetchTimeout(_) | Error::FetchTooLarge(_) | Error::HttpError(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

//! Storage error types shared by every snapshot-side store.

use meteolog_core::error::{AppError, DatabaseError, RusqliteErrorExt};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database failure.
    #[error("Storage error: {0}")]
    Database(#[from] DatabaseError),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.into_database_error())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Other(anyhow::anyhow!("storage task failed: {}", err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            StoreError::NotFound(what) => AppError::Other(anyhow::anyhow!("not found: {}", what)),
            StoreError::Other(e) => AppError::Other(e),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

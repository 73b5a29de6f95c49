use thiserror::Error;
use weathernav_core::{AppError, RusqliteErrorExt};

/// Persistence failures. Callers log these and carry on with in-memory state.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Database(e) => e.into_app_error(),
            other => AppError::Storage(other.to_string()),
        }
    }
}

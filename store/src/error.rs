//! Error types for the pattern repository

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Storage unavailable or a statement failed; fatal for the batch.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored record for {identity} is malformed: {detail}")]
    MalformedRecord { identity: String, detail: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

//! Error types for the ingest pipeline.

use crate::validate::Rejection;

/// Errors surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A SQLite statement failed.
    #[error("store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No connection could be checked out of the pool.
    #[error("store connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The table name is not a plain SQL identifier.
    #[error("invalid table name: {0:?}")]
    InvalidTable(String),

    /// The aggregate query produced no result row.
    #[error("count query returned no rows")]
    NoRows,

    /// The aggregate query produced a result of the wrong shape or type.
    #[error("unexpected count query result: {0}")]
    UnexpectedValue(String),

    /// The backend refused the call outright.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by [`Ingestor::ingest`](crate::Ingestor::ingest).
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The batch failed validation; nothing was written.
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Writing the batch failed part way; chunks before the failing one
    /// remain persisted.
    #[error("failed to persist announcements: {0}")]
    Persist(#[from] StoreError),
}

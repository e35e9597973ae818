//! Error types for the fusekv engine.
//!
//! Transient conditions (`ShuttingDown`) are returned to the caller and never
//! crash the process. Configuration and dimension errors indicate setup
//! mistakes and should stop startup. A corrupt WAL tail is deliberately *not*
//! represented here: replay absorbs it silently (see `storage::wal`).

use thiserror::Error;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Primary error type for store and index operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// WAL or snapshot I/O failure. Fatal at startup; at runtime the failing
    /// operation is aborted and the error surfaced to the caller.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// The shutdown signal has been raised; the operation was not attempted.
    #[error("store is shutting down")]
    ShuttingDown,

    /// Vector length does not match the index dimension.
    #[error("vector dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Invalid index construction parameters (zero or mismatched centroids).
    #[error("invalid index configuration: {0}")]
    InvalidConfiguration(String),
}

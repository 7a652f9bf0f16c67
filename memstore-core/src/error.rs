//! Crate-wide error taxonomy.
//!
//! Variants are named for the behavior they trigger in a caller, not for the
//! underlying type they wrap — `HealthProbeFailed` from the connection pool
//! never reaches here, it is handled internally as a transparent retry.

/// Top-level error type for the memory store.
#[derive(Debug, thiserror::Error)]
pub enum MemStoreError {
    #[error("memory store used before initialize()")]
    NotInitialized,

    #[error("pool is shutting down")]
    PoolShuttingDown,

    #[error("checkout timed out after {0:?}")]
    CheckoutTimeout(std::time::Duration),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("migration v{version:03} failed: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the store.
pub type MemStoreResult<T> = Result<T, MemStoreError>;

//! # Errors
//!
//! One error type for the whole adapter. Engine failures are passed through
//! untouched; everything else is either a bad input or a lifecycle misuse.

use thiserror::Error;

/// Errors raised by the adapter, its sessions and its configuration
#[derive(Debug, Error)]
pub enum AnnError {
    /// Metric outside `angular` / `euclidean`
    #[error("unknown metric {0}")]
    UnsupportedMetric(String),

    /// A numeric parameter is out of range
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Table or relation name that cannot be rendered safely
    #[error("invalid identifier '{0}': expected [A-Za-z_][A-Za-z0-9_]*, at most 63 bytes")]
    InvalidIdentifier(String),

    /// `fit` was handed no vectors
    #[error("dataset is empty")]
    EmptyDataset,

    /// Vector length differs from the stored dimensionality
    #[error("dimensionality mismatch: expected {expected}, got {got}")]
    DimensionalityMismatch { expected: usize, got: usize },

    /// Operation needs a fitted adapter
    #[error("adapter has not been fitted")]
    NotFitted,

    /// `fit` may only run once per adapter
    #[error("adapter has already been fitted")]
    AlreadyFitted,

    /// Operation after `done`
    #[error("adapter is done")]
    Done,

    /// Display name needs `set_query_arguments` first
    #[error("query arguments have not been set")]
    QueryArgumentsUnset,

    /// Bad configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// PostgreSQL statement or connection failure
    #[error("postgres error: {0}")]
    Postgres(#[from] postgres::Error),

    /// Failure reported by a non-PostgreSQL session
    #[error("engine error: {0}")]
    Engine(String),

    /// Writing to the COPY stream failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration JSON could not be parsed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for adapter operations
pub type AnnResult<T> = Result<T, AnnError>;

//! Structured error types for the chemdex workspace.

use thiserror::Error;

/// Unified error type for all chemdex operations.
#[derive(Debug, Error)]
pub enum ChemdexError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed SMILES, MOL block, SD record or query string)
    #[error("parse error: {0}")]
    Parse(String),

    /// Sanitization failure (valence, ring or aromaticity perception rejected
    /// the molecule)
    #[error("sanitization error: {0}")]
    Sanitize(String),

    /// Internal chemistry toolkit failure
    #[error("toolkit error: {0}")]
    Toolkit(String),

    /// Index storage or lifecycle failure
    #[error("index error: {0}")]
    Index(String),

    /// The index directory has never been committed to
    #[error("the index does not exist yet")]
    NoIndexYet,

    /// The facade or store has been shut down and cannot be reopened
    #[error("index has been shut down")]
    Shutdown,

    /// The per-ingest consecutive error budget was exhausted
    #[error("too many errors in a row, giving up: {0}")]
    TooManyErrors(String),

    /// Invalid input (bad arguments, out-of-range values, unknown options)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the chemdex workspace.
pub type Result<T> = std::result::Result<T, ChemdexError>;

//! Error types for bourse-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid share count: {0}")]
    InvalidShares(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Duplicate instrument: {0}")]
    DuplicateInstrument(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

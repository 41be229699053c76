//! Oracle error types.

use bourse_core::Ticker;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Unknown ticker: {0}")]
    UnknownTicker(Ticker),

    #[error("Provider request timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("No price available for {0}")]
    NoPriceAvailable(Ticker),
}

pub type OracleResult<T> = Result<T, OracleError>;

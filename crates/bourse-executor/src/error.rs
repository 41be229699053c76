//! Executor error types.

use bourse_core::{AccountId, InstrumentId, Shares};
use bourse_ledger::LedgerError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Invalid trade request: {0}")]
    Validation(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    #[error("No holding of {instrument} for {account}")]
    NoHolding {
        account: AccountId,
        instrument: InstrumentId,
    },

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("Insufficient shares: owned {owned}, requested {requested}")]
    InsufficientShares { owned: Shares, requested: Shares },

    #[error("No price available: {0}")]
    PriceUnavailable(String),

    #[error("Concurrent modification of {0}, gave up after retries")]
    Contention(AccountId),

    #[error("Ledger write failed: {0}")]
    Persistence(#[from] LedgerError),
}

impl ExecutionError {
    /// Stable machine-readable code, used for metrics labels and API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::AccountNotFound(_) => "account_not_found",
            Self::InstrumentNotFound(_) => "instrument_not_found",
            Self::NoHolding { .. } => "no_holding",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientShares { .. } => "insufficient_shares",
            Self::PriceUnavailable(_) => "price_unavailable",
            Self::Contention(_) => "contention",
            Self::Persistence(_) => "persistence",
        }
    }
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

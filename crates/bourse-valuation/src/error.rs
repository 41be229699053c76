//! Valuation error types.

use bourse_core::{AccountId, InstrumentId, Ticker};
use bourse_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Instrument not in table: {0}")]
    UnknownInstrument(InstrumentId),

    #[error("No price for {ticker}: {reason}")]
    PriceUnavailable { ticker: Ticker, reason: String },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type ValuationResult<T> = Result<T, ValuationError>;

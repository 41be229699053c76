//! Ledger error types.

use bourse_core::{AccountId, InstrumentId};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Instrument not found: {0}")]
    InstrumentNotFound(InstrumentId),

    #[error("Version conflict on {account}: expected {expected}, found {actual}")]
    VersionConflict {
        account: AccountId,
        expected: u64,
        actual: u64,
    },

    #[error("Transaction chain broken on {account}: last balance_after {last_after}, new balance_before {new_before}")]
    ChainBroken {
        account: AccountId,
        last_after: Decimal,
        new_before: Decimal,
    },

    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    /// True if the write may succeed after re-reading current state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

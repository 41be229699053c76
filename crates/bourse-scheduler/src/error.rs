//! Scheduler error types.

use bourse_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("A trading round is already in progress")]
    RoundInProgress,

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

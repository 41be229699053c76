//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] bourse_core::CoreError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] bourse_oracle::OracleError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] bourse_ledger::LedgerError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] bourse_strategy::StrategyError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] bourse_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;

//! bourse - portfolio ledger and automated trading engine for a stock game.
//!
//! Main application that orchestrates all components:
//! - Ledger store seeded with instruments and agent accounts
//! - Price oracle over the configured market data provider
//! - Trade executor for human and agent trades
//! - Strategy engine and trading scheduler for agent rounds
//! - Valuation, leaderboard and reconciliation
//! - HTTP API and background maintenance loops

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, Secrets};
pub use error::{AppError, AppResult};

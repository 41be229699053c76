//! bourse-api - HTTP surface for the bourse trading engine.
//!
//! Exposes trading, ranking and scheduler-trigger routes over axum:
//!
//! ```text
//! POST /api/trade/buy           session bearer   buy shares
//! POST /api/trade/sell          session bearer   sell shares
//! GET  /api/leaderboard         optional session live ranking
//! GET  /api/reconciliation      cron bearer      display vs canonical audit
//! POST /api/cron/trading-round  cron bearer      run one scheduler round
//! GET  /health                  none             liveness
//! GET  /metrics                 none             Prometheus text format
//! ```
//!
//! # Key Components
//!
//! - [`AppState`]: handles to the executor, valuation, reconciliation and
//!   scheduler services
//! - [`SessionVerifier`]: pluggable session check; [`StaticSessions`] maps
//!   configured tokens to accounts
//! - [`ApiError`]: maps domain errors to status codes and
//!   `{"error", "message", ...}` bodies
//!
//! # Usage
//!
//! ```ignore
//! let state = AppState::new(store, executor, valuation, checker, scheduler,
//!     sessions, cron, clock, starting_cash);
//! tokio::spawn(run_server(state, config.api.clone(), shutdown.cancelled_owned()));
//! ```

mod auth;
mod config;
mod error;
mod server;
mod state;
mod types;

pub use auth::{bearer_token, CronAuth, Session, SessionVerifier, StaticSessions};
pub use config::{ApiConfig, StaticSession};
pub use error::{ApiError, ApiResult};
pub use server::{create_router, run_server};
pub use state::AppState;
pub use types::{BuyResponse, RoundResponse, RoundResultView, SellResponse, TradeRequest};

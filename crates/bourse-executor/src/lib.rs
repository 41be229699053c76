//! Trade execution for bourse.
//!
//! Executes a single buy or sell for one account: resolve the price through
//! the oracle, plan every record change with the pure [`plan_buy`] /
//! [`plan_sell`] functions, then commit them in one
//! [`LedgerStore::apply_trade`](bourse_ledger::LedgerStore::apply_trade)
//! call under the account lock.
//!
//! # Key Components
//!
//! - [`TradeExecutor`]: buy/sell entry points with bounded conflict retry
//! - [`plan_buy`], [`plan_sell`]: pure trade arithmetic
//! - [`TradeReceipt`]: what the caller gets back
//! - [`LedgerPriceLookup`]: stored-price fallback for the oracle
//!
//! # Failure Semantics
//!
//! Every rejection (validation, insufficient funds/shares, missing records,
//! store failure) happens before or inside the atomic commit, so a failed
//! trade leaves the ledger unchanged.

pub mod error;
pub mod executor;
pub mod plan;
pub mod price_provider;

pub use error::{ExecutionError, ExecutionResult};
pub use executor::{ExecutorConfig, TradeExecutor};
pub use plan::{plan_buy, plan_sell, TradePlan, TradeReceipt};
pub use price_provider::LedgerPriceLookup;

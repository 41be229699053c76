//! Core domain types for the bourse trading game.
//!
//! This crate provides the types shared by every component:
//! - `Price`, `Shares`: precision-safe numeric types
//! - `AccountId`, `InstrumentId`, `Ticker`: identifiers
//! - `Account`, `Holding`, `Transaction`, `Instrument`: ledger records
//! - `InstrumentTable`: the single source of instrument metadata
//! - `Clock`: injectable time source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod ids;
pub mod instrument;
pub mod ledger;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use decimal::{Price, Shares, SHARE_SCALE};
pub use error::{CoreError, Result};
pub use ids::{AccountId, InstrumentId, Ticker};
pub use instrument::{Instrument, InstrumentMeta, InstrumentTable};
pub use ledger::{
    Account, AccountKind, AgentStatus, Holding, TradeSide, Transaction, DEFAULT_STARTING_CASH,
};

//! Ledger store for bourse.
//!
//! Accounts, holdings, transactions and instrument records live behind the
//! [`LedgerStore`] trait. A trade is written through a single
//! [`LedgerStore::apply_trade`] call carrying every record it touches, so a
//! store either commits all of them or none.
//!
//! # Key Components
//!
//! - [`LedgerStore`]: async store contract
//! - [`TradeCommit`]: the multi-record write of one trade
//! - [`InMemoryLedgerStore`]: reference store with fault injection
//! - [`AccountLocks`]: per-account mutation serialization

pub mod error;
pub mod locks;
pub mod memory;
pub mod store;

pub use error::{LedgerError, LedgerResult};
pub use locks::AccountLocks;
pub use memory::{InMemoryLedgerStore, LedgerSnapshot};
pub use store::{DisplayCache, HoldingChange, InstrumentDelta, LedgerStore, TradeCommit};

//! Ledger store contract.

use async_trait::async_trait;
use bourse_core::{
    Account, AccountId, AgentStatus, Holding, Instrument, InstrumentId, Price, Shares, TradeSide,
    Transaction,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

// ============================================================================
// Trade commit
// ============================================================================

/// New state of the traded holding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingChange {
    /// Create or replace the holding. `shares_owned` must be positive.
    Upsert(Holding),
    /// The position was fully sold.
    Delete {
        account_id: AccountId,
        instrument_id: InstrumentId,
    },
}

impl HoldingChange {
    pub fn instrument_id(&self) -> &InstrumentId {
        match self {
            Self::Upsert(holding) => &holding.instrument_id,
            Self::Delete { instrument_id, .. } => instrument_id,
        }
    }
}

/// Aggregate counter update for the traded instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentDelta {
    pub instrument_id: InstrumentId,
    pub side: TradeSide,
    pub shares: Shares,
    /// The account had no position before this trade.
    pub opened_position: bool,
    /// The account has no position after this trade.
    pub closed_position: bool,
    /// Execution price, stored as the instrument's latest price.
    pub price: Price,
}

/// Every record written by one trade.
///
/// `account` carries the post-trade cash and invested figures; the store
/// bumps its version. The commit is rejected without any write if the stored
/// account version differs from `expected_version` or if
/// `transaction.balance_before` does not continue the account's chain.
#[derive(Debug, Clone)]
pub struct TradeCommit {
    pub expected_version: u64,
    pub account: Account,
    pub holding: HoldingChange,
    pub transaction: Transaction,
    pub instrument: InstrumentDelta,
}

/// Display figures written back by the valuation refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayCache {
    pub portfolio_value: Decimal,
    pub all_time_gain_loss: Decimal,
    pub tier: Option<String>,
    /// Cached `current_value` per holding.
    pub holding_values: Vec<(InstrumentId, Decimal)>,
}

// ============================================================================
// LedgerStore
// ============================================================================

/// Persistence contract for ledger records.
///
/// Implementations must make [`LedgerStore::apply_trade`] all-or-nothing.
/// Display-cache writes never touch `cash_available`, `total_invested`,
/// holdings' share counts or the version.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // === Accounts ===

    async fn get_account(&self, id: &AccountId) -> LedgerResult<Option<Account>>;

    /// All accounts ordered by id.
    async fn list_accounts(&self) -> LedgerResult<Vec<Account>>;

    /// Provision an account. Returns the stored account unchanged if the id
    /// already exists.
    async fn open_account(&self, account: Account) -> LedgerResult<Account>;

    /// Pause or resume an agent.
    async fn set_agent_status(&self, id: &AccountId, status: AgentStatus) -> LedgerResult<()>;

    /// Overwrite cached display figures for an account and its holdings.
    async fn update_display_cache(
        &self,
        id: &AccountId,
        cache: DisplayCache,
        at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    // === Holdings and transactions ===

    async fn get_holding(
        &self,
        account: &AccountId,
        instrument: &InstrumentId,
    ) -> LedgerResult<Option<Holding>>;

    /// Holdings of one account ordered by instrument id.
    async fn list_holdings(&self, account: &AccountId) -> LedgerResult<Vec<Holding>>;

    /// Transactions of one account in commit order.
    async fn list_transactions(&self, account: &AccountId) -> LedgerResult<Vec<Transaction>>;

    async fn last_transaction(&self, account: &AccountId) -> LedgerResult<Option<Transaction>>;

    // === Instruments ===

    async fn get_instrument(&self, id: &InstrumentId) -> LedgerResult<Option<Instrument>>;

    async fn list_instruments(&self) -> LedgerResult<Vec<Instrument>>;

    /// List an instrument if absent. Existing records keep their counters.
    async fn upsert_instrument(&self, instrument: Instrument) -> LedgerResult<()>;

    /// Store the latest observed price for an instrument.
    async fn update_instrument_price(
        &self,
        id: &InstrumentId,
        price: Price,
        at: DateTime<Utc>,
    ) -> LedgerResult<()>;

    // === Trades ===

    /// Atomically commit one trade. Returns the account as stored.
    async fn apply_trade(&self, commit: TradeCommit) -> LedgerResult<Account>;
}

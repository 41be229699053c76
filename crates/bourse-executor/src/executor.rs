//! Trade executor.
//!
//! # Execution Steps (in `TradeExecutor::execute`)
//!
//! 1. Validate share count and resolve the instrument -> Validation / InstrumentNotFound
//! 2. Resolve price via oracle -> PriceUnavailable
//! 3. Take the account lock
//! 4. Read account and holding -> AccountNotFound
//! 5. Plan the trade -> InsufficientFunds / InsufficientShares / NoHolding
//! 6. Atomic commit; on version conflict re-read and re-plan (bounded)

use std::sync::Arc;

use bourse_core::{
    AccountId, InstrumentId, InstrumentTable, Price, SharedClock, Shares, Ticker, TradeSide,
};
use bourse_ledger::{AccountLocks, LedgerError, LedgerStore};
use bourse_oracle::PriceOracle;
use bourse_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ExecutionError, ExecutionResult};
use crate::plan::{plan_buy, plan_sell, TradeReceipt};

// ============================================================================
// ExecutorConfig
// ============================================================================

/// Configuration for the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Commit attempts before giving up on a contended account.
    #[serde(default = "default_max_commit_attempts")]
    pub max_commit_attempts: u32,
}

fn default_max_commit_attempts() -> u32 {
    3
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}

// ============================================================================
// TradeExecutor
// ============================================================================

/// Executes buys and sells against the ledger.
pub struct TradeExecutor {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<PriceOracle>,
    instruments: Arc<InstrumentTable>,
    locks: AccountLocks,
    clock: SharedClock,
    config: ExecutorConfig,
}

impl TradeExecutor {
    /// Create a new executor.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<PriceOracle>,
        instruments: Arc<InstrumentTable>,
        clock: SharedClock,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            instruments,
            locks: AccountLocks::new(),
            clock,
            config,
        }
    }

    /// Share an existing lock table (e.g. with another executor instance).
    #[must_use]
    pub fn with_locks(mut self, locks: AccountLocks) -> Self {
        self.locks = locks;
        self
    }

    /// Buy `shares` of `instrument` for `account`.
    pub async fn buy(
        &self,
        account: &AccountId,
        instrument: &InstrumentId,
        shares: Shares,
    ) -> ExecutionResult<TradeReceipt> {
        self.execute(TradeSide::Buy, account, instrument, shares).await
    }

    /// Sell `shares` of `instrument` from `account`.
    pub async fn sell(
        &self,
        account: &AccountId,
        instrument: &InstrumentId,
        shares: Shares,
    ) -> ExecutionResult<TradeReceipt> {
        self.execute(TradeSide::Sell, account, instrument, shares).await
    }

    /// Execute one trade. Rejections leave the ledger unchanged.
    pub async fn execute(
        &self,
        side: TradeSide,
        account: &AccountId,
        instrument: &InstrumentId,
        shares: Shares,
    ) -> ExecutionResult<TradeReceipt> {
        let result = self.execute_inner(side, account, instrument, shares).await;
        let side_label = match side {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        };
        match &result {
            Ok(receipt) => {
                Metrics::trade_executed(side_label);
                info!(
                    account = %account,
                    instrument = %instrument,
                    side = %side,
                    shares = %receipt.shares,
                    price = %receipt.price,
                    total = %receipt.total_amount,
                    new_balance = %receipt.new_balance,
                    "Trade executed"
                );
            }
            Err(e) => {
                Metrics::trade_rejected(side_label, e.code());
                debug!(
                    account = %account,
                    instrument = %instrument,
                    side = %side,
                    shares = %shares,
                    reason = e.code(),
                    error = %e,
                    "Trade rejected"
                );
            }
        }
        result
    }

    async fn execute_inner(
        &self,
        side: TradeSide,
        account_id: &AccountId,
        instrument_id: &InstrumentId,
        shares: Shares,
    ) -> ExecutionResult<TradeReceipt> {
        if !shares.is_positive() {
            return Err(ExecutionError::Validation(format!(
                "shares must be positive, got {shares}"
            )));
        }
        let ticker = self
            .instruments
            .ticker_of(instrument_id)
            .ok_or_else(|| ExecutionError::InstrumentNotFound(instrument_id.clone()))?;

        let price = self.resolve_price(ticker).await?;

        let _guard = self.locks.lock(account_id).await;

        let attempts = self.config.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let account = self
                .store
                .get_account(account_id)
                .await?
                .ok_or_else(|| ExecutionError::AccountNotFound(account_id.clone()))?;
            let holding = self.store.get_holding(account_id, instrument_id).await?;

            let now = self.clock.now();
            let plan = match side {
                TradeSide::Buy => plan_buy(
                    &account,
                    holding.as_ref(),
                    instrument_id,
                    shares,
                    price,
                    Uuid::new_v4(),
                    now,
                )?,
                TradeSide::Sell => plan_sell(
                    &account,
                    holding.as_ref(),
                    instrument_id,
                    shares,
                    price,
                    Uuid::new_v4(),
                    now,
                )?,
            };

            match self.store.apply_trade(plan.commit).await {
                Ok(_) => return Ok(plan.receipt),
                Err(e) if e.is_retryable() => {
                    Metrics::version_conflict();
                    warn!(
                        account = %account_id,
                        attempt,
                        error = %e,
                        "Ledger version conflict, retrying"
                    );
                }
                Err(LedgerError::InstrumentNotFound(id)) => {
                    return Err(ExecutionError::InstrumentNotFound(id));
                }
                Err(LedgerError::AccountNotFound(id)) => {
                    return Err(ExecutionError::AccountNotFound(id));
                }
                Err(e) => return Err(ExecutionError::Persistence(e)),
            }
        }

        Err(ExecutionError::Contention(account_id.clone()))
    }

    async fn resolve_price(&self, ticker: &Ticker) -> ExecutionResult<Price> {
        self.oracle
            .get_price(ticker)
            .await
            .map_err(|e| ExecutionError::PriceUnavailable(e.to_string()))
    }

    pub fn instruments(&self) -> &Arc<InstrumentTable> {
        &self.instruments
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn oracle(&self) -> &Arc<PriceOracle> {
        &self.oracle
    }
}

//! In-memory ledger store.
//!
//! All state sits behind one `RwLock`; `apply_trade` validates the whole
//! commit first and only then writes, so a rejected commit leaves nothing
//! behind. `set_fail_writes` makes every mutating call fail with
//! [`LedgerError::Backend`] before touching state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bourse_core::{
    Account, AccountId, AgentStatus, Holding, Instrument, InstrumentId, Price, Shares, TradeSide,
    Transaction,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::store::{DisplayCache, HoldingChange, LedgerStore, TradeCommit};

/// Full copy of store contents, for before/after comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub accounts: BTreeMap<AccountId, Account>,
    pub holdings: BTreeMap<(AccountId, InstrumentId), Holding>,
    pub transactions: BTreeMap<AccountId, Vec<Transaction>>,
    pub instruments: BTreeMap<InstrumentId, Instrument>,
}

/// Reference [`LedgerStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerSnapshot>,
    fail_writes: AtomicBool,
}

impl InMemoryLedgerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().clone()
    }

    /// Overwrite an account record without any checks.
    ///
    /// Used to simulate drift of cached fields in audits.
    pub fn overwrite_account(&self, account: Account) {
        self.state.write().accounts.insert(account.id.clone(), account);
    }

    fn check_writable(&self) -> LedgerResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn validate_commit(state: &LedgerSnapshot, commit: &TradeCommit) -> LedgerResult<()> {
    let account_id = &commit.account.id;
    let stored = state
        .accounts
        .get(account_id)
        .ok_or_else(|| LedgerError::AccountNotFound(account_id.clone()))?;

    if stored.version != commit.expected_version {
        return Err(LedgerError::VersionConflict {
            account: account_id.clone(),
            expected: commit.expected_version,
            actual: stored.version,
        });
    }

    let txn = &commit.transaction;
    let last_after = state
        .transactions
        .get(account_id)
        .and_then(|txns| txns.last())
        .map(|t| t.balance_after)
        .unwrap_or(stored.cash_available);
    if txn.balance_before != last_after {
        return Err(LedgerError::ChainBroken {
            account: account_id.clone(),
            last_after,
            new_before: txn.balance_before,
        });
    }

    if txn.account_id != *account_id || txn.instrument_id != commit.instrument.instrument_id {
        return Err(LedgerError::InvariantViolation(
            "transaction does not match commit".to_string(),
        ));
    }
    if !txn.shares.is_positive() {
        return Err(LedgerError::InvariantViolation(
            "transaction shares must be positive".to_string(),
        ));
    }
    if commit.account.cash_available.is_sign_negative() {
        return Err(LedgerError::InvariantViolation(format!(
            "cash_available would be negative: {}",
            commit.account.cash_available
        )));
    }
    if commit.account.cash_available != txn.balance_after {
        return Err(LedgerError::InvariantViolation(
            "account cash does not match transaction balance_after".to_string(),
        ));
    }
    if let HoldingChange::Upsert(holding) = &commit.holding {
        if !holding.shares_owned.is_positive() {
            return Err(LedgerError::InvariantViolation(
                "holding with zero shares must be deleted".to_string(),
            ));
        }
    }
    if !state
        .instruments
        .contains_key(&commit.instrument.instrument_id)
    {
        return Err(LedgerError::InstrumentNotFound(
            commit.instrument.instrument_id.clone(),
        ));
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_account(&self, id: &AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.state.read().accounts.get(id).cloned())
    }

    async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        Ok(self.state.read().accounts.values().cloned().collect())
    }

    async fn open_account(&self, account: Account) -> LedgerResult<Account> {
        self.check_writable()?;
        let mut state = self.state.write();
        if let Some(existing) = state.accounts.get(&account.id) {
            return Ok(existing.clone());
        }
        debug!(account = %account.id, kind = ?account.kind, "Account opened");
        state.accounts.insert(account.id.clone(), account.clone());
        Ok(account)
    }

    async fn set_agent_status(&self, id: &AccountId, status: AgentStatus) -> LedgerResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();
        let account = state
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))?;
        account.status = Some(status);
        Ok(())
    }

    async fn update_display_cache(
        &self,
        id: &AccountId,
        cache: DisplayCache,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();
        let account = state
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::AccountNotFound(id.clone()))?;
        account.portfolio_value = cache.portfolio_value;
        account.all_time_gain_loss = cache.all_time_gain_loss;
        account.tier = cache.tier;
        account.updated_at = at;

        for (instrument_id, value) in cache.holding_values {
            if let Some(holding) = state.holdings.get_mut(&(id.clone(), instrument_id)) {
                holding.current_value = value;
            }
        }
        Ok(())
    }

    async fn get_holding(
        &self,
        account: &AccountId,
        instrument: &InstrumentId,
    ) -> LedgerResult<Option<Holding>> {
        Ok(self
            .state
            .read()
            .holdings
            .get(&(account.clone(), instrument.clone()))
            .cloned())
    }

    async fn list_holdings(&self, account: &AccountId) -> LedgerResult<Vec<Holding>> {
        Ok(self
            .state
            .read()
            .holdings
            .values()
            .filter(|h| &h.account_id == account)
            .cloned()
            .collect())
    }

    async fn list_transactions(&self, account: &AccountId) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .state
            .read()
            .transactions
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn last_transaction(&self, account: &AccountId) -> LedgerResult<Option<Transaction>> {
        Ok(self
            .state
            .read()
            .transactions
            .get(account)
            .and_then(|txns| txns.last().cloned()))
    }

    async fn get_instrument(&self, id: &InstrumentId) -> LedgerResult<Option<Instrument>> {
        Ok(self.state.read().instruments.get(id).cloned())
    }

    async fn list_instruments(&self) -> LedgerResult<Vec<Instrument>> {
        Ok(self.state.read().instruments.values().cloned().collect())
    }

    async fn upsert_instrument(&self, instrument: Instrument) -> LedgerResult<()> {
        self.check_writable()?;
        self.state
            .write()
            .instruments
            .entry(instrument.id.clone())
            .or_insert(instrument);
        Ok(())
    }

    async fn update_instrument_price(
        &self,
        id: &InstrumentId,
        price: Price,
        at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        self.check_writable()?;
        let mut state = self.state.write();
        let instrument = state
            .instruments
            .get_mut(id)
            .ok_or_else(|| LedgerError::InstrumentNotFound(id.clone()))?;
        instrument.current_price = price;
        instrument.updated_at = at;
        Ok(())
    }

    async fn apply_trade(&self, commit: TradeCommit) -> LedgerResult<Account> {
        self.check_writable()?;
        let mut state = self.state.write();

        if let Err(e) = validate_commit(&state, &commit) {
            warn!(account = %commit.account.id, error = %e, "Trade commit rejected");
            return Err(e);
        }

        let TradeCommit {
            expected_version,
            mut account,
            holding,
            transaction,
            instrument: delta,
        } = commit;
        let account_id = account.id.clone();
        let at = transaction.timestamp;

        match holding {
            HoldingChange::Upsert(holding) => {
                state
                    .holdings
                    .insert((account_id.clone(), holding.instrument_id.clone()), holding);
            }
            HoldingChange::Delete { instrument_id, .. } => {
                state.holdings.remove(&(account_id.clone(), instrument_id));
            }
        }

        state
            .transactions
            .entry(account_id.clone())
            .or_default()
            .push(transaction);

        if let Some(instrument) = state.instruments.get_mut(&delta.instrument_id) {
            instrument.volume_traded = instrument.volume_traded + delta.shares;
            instrument.shares_held = match delta.side {
                TradeSide::Buy => instrument.shares_held + delta.shares,
                TradeSide::Sell => {
                    Shares::new((instrument.shares_held - delta.shares).inner().max(Decimal::ZERO))
                }
            };
            if delta.opened_position {
                instrument.unique_holders += 1;
            }
            if delta.closed_position {
                instrument.unique_holders = instrument.unique_holders.saturating_sub(1);
            }
            instrument.current_price = delta.price;
            instrument.updated_at = at;
        }

        account.version = expected_version + 1;
        account.updated_at = at;
        state.accounts.insert(account_id, account.clone());

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{AccountKind, InstrumentMeta, Ticker};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap()
    }

    async fn seeded() -> InMemoryLedgerStore {
        let store = InMemoryLedgerStore::new();
        let meta = InstrumentMeta {
            id: InstrumentId::new("acme"),
            ticker: Ticker::new("ACME"),
            name: "Acme".to_string(),
            sector: None,
            initial_price: Price::new(dec!(100)),
        };
        store
            .upsert_instrument(Instrument::from_meta(&meta, now()))
            .await
            .unwrap();
        store
            .open_account(Account::new(
                AccountId::new("alice"),
                "Alice",
                AccountKind::Human,
                dec!(1000),
                now(),
            ))
            .await
            .unwrap();
        store
    }

    fn buy_commit(account: &Account, shares: Decimal, price: Decimal) -> TradeCommit {
        let cost = shares * price;
        let mut next = account.clone();
        next.cash_available -= cost;
        next.total_invested += cost;
        TradeCommit {
            expected_version: account.version,
            holding: HoldingChange::Upsert(Holding {
                account_id: account.id.clone(),
                instrument_id: InstrumentId::new("acme"),
                shares_owned: Shares::new(shares),
                total_invested: cost,
                avg_purchase_price: Price::new(price),
                current_value: cost,
                updated_at: now(),
            }),
            transaction: Transaction {
                id: Uuid::new_v4(),
                account_id: account.id.clone(),
                instrument_id: InstrumentId::new("acme"),
                side: TradeSide::Buy,
                shares: Shares::new(shares),
                price_per_share: Price::new(price),
                total_amount: cost,
                balance_before: account.cash_available,
                balance_after: next.cash_available,
                timestamp: now(),
            },
            instrument: crate::store::InstrumentDelta {
                instrument_id: InstrumentId::new("acme"),
                side: TradeSide::Buy,
                shares: Shares::new(shares),
                opened_position: true,
                closed_position: false,
                price: Price::new(price),
            },
            account: next,
        }
    }

    #[tokio::test]
    async fn test_open_account_is_idempotent() {
        let store = seeded().await;
        let again = store
            .open_account(Account::new(
                AccountId::new("alice"),
                "Someone Else",
                AccountKind::Human,
                dec!(5),
                now(),
            ))
            .await
            .unwrap();
        assert_eq!(again.display_name, "Alice");
        assert_eq!(again.cash_available, dec!(1000));
    }

    #[tokio::test]
    async fn test_apply_trade_writes_all_records() {
        let store = seeded().await;
        let alice = store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();

        let stored = store.apply_trade(buy_commit(&alice, dec!(2), dec!(100))).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.cash_available, dec!(800));

        let holding = store
            .get_holding(&alice.id, &InstrumentId::new("acme"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(holding.shares_owned, Shares::new(dec!(2)));
        assert_eq!(store.list_transactions(&alice.id).await.unwrap().len(), 1);

        let instrument = store
            .get_instrument(&InstrumentId::new("acme"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(instrument.unique_holders, 1);
        assert_eq!(instrument.volume_traded, Shares::new(dec!(2)));
    }

    #[tokio::test]
    async fn test_stale_version_rejected_without_writes() {
        let store = seeded().await;
        let alice = store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
        store.apply_trade(buy_commit(&alice, dec!(1), dec!(100))).await.unwrap();

        let before = store.snapshot();
        let result = store.apply_trade(buy_commit(&alice, dec!(1), dec!(100))).await;
        assert!(matches!(
            result,
            Err(LedgerError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_broken_chain_rejected() {
        let store = seeded().await;
        let alice = store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
        let mut commit = buy_commit(&alice, dec!(1), dec!(100));
        commit.transaction.balance_before = dec!(999);

        assert!(matches!(
            store.apply_trade(commit).await,
            Err(LedgerError::ChainBroken { .. })
        ));
    }

    #[tokio::test]
    async fn test_negative_cash_rejected() {
        let store = seeded().await;
        let alice = store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
        let result = store.apply_trade(buy_commit(&alice, dec!(11), dec!(100))).await;
        assert!(matches!(result, Err(LedgerError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let store = seeded().await;
        let alice = store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
        store.set_fail_writes(true);

        let before = store.snapshot();
        assert!(matches!(
            store.apply_trade(buy_commit(&alice, dec!(1), dec!(100))).await,
            Err(LedgerError::Backend(_))
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_display_cache_leaves_balances_alone() {
        let store = seeded().await;
        let id = AccountId::new("alice");
        store
            .update_display_cache(
                &id,
                DisplayCache {
                    portfolio_value: dec!(1234),
                    all_time_gain_loss: dec!(234),
                    tier: Some("Champion".to_string()),
                    holding_values: Vec::new(),
                },
                now(),
            )
            .await
            .unwrap();

        let account = store.get_account(&id).await.unwrap().unwrap();
        assert_eq!(account.portfolio_value, dec!(1234));
        assert_eq!(account.cash_available, dec!(1000));
        assert_eq!(account.version, 0);
    }
}

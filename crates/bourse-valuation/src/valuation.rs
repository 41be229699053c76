//! Live portfolio valuation.
//!
//! Holding values are always recomputed from oracle prices; cached
//! `current_value` and `portfolio_value` fields are outputs of this module,
//! never inputs.

use std::collections::HashMap;
use std::sync::Arc;

use bourse_core::{Account, AccountId, Holding, InstrumentId, InstrumentTable, Price, SharedClock, Shares};
use bourse_ledger::{DisplayCache, LedgerStore};
use bourse_oracle::PriceOracle;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ValuationError, ValuationResult};
use crate::leaderboard::{rank, Leaderboard};

/// One position at a live price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingValuation {
    pub instrument_id: InstrumentId,
    pub shares: Shares,
    pub price: Price,
    pub value: Decimal,
}

/// Live value of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountValuation {
    pub account_id: AccountId,
    pub display_name: String,
    pub is_agent: bool,
    pub cash: Decimal,
    pub holdings_value: Decimal,
    /// `cash + holdings_value`.
    pub portfolio_value: Decimal,
    /// `portfolio_value - starting_cash`.
    pub all_time_gain_loss: Decimal,
    pub holdings: Vec<HoldingValuation>,
}

/// Per-call price memo so each instrument is priced once per pass.
#[derive(Default)]
pub(crate) struct PriceBook {
    prices: HashMap<InstrumentId, Price>,
}

impl PriceBook {
    pub(crate) async fn price(
        &mut self,
        oracle: &PriceOracle,
        instruments: &InstrumentTable,
        id: &InstrumentId,
    ) -> ValuationResult<Price> {
        if let Some(price) = self.prices.get(id) {
            return Ok(*price);
        }
        let ticker = instruments
            .ticker_of(id)
            .ok_or_else(|| ValuationError::UnknownInstrument(id.clone()))?;
        let price = oracle
            .get_price(ticker)
            .await
            .map_err(|e| ValuationError::PriceUnavailable {
                ticker: ticker.clone(),
                reason: e.to_string(),
            })?;
        self.prices.insert(id.clone(), price);
        Ok(price)
    }
}

/// Values accounts at live prices and maintains their display cache.
pub struct ValuationService {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<PriceOracle>,
    instruments: Arc<InstrumentTable>,
    clock: SharedClock,
}

impl ValuationService {
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<PriceOracle>,
        instruments: Arc<InstrumentTable>,
        clock: SharedClock,
    ) -> Self {
        Self {
            store,
            oracle,
            instruments,
            clock,
        }
    }

    pub(crate) fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub(crate) fn instruments(&self) -> &InstrumentTable {
        &self.instruments
    }

    pub(crate) fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Value one account.
    pub async fn value_account(&self, id: &AccountId) -> ValuationResult<AccountValuation> {
        let account = self
            .store
            .get_account(id)
            .await?
            .ok_or_else(|| ValuationError::AccountNotFound(id.clone()))?;
        let holdings = self.store.list_holdings(id).await?;
        let mut book = PriceBook::default();
        self.value_with(&account, &holdings, &mut book).await
    }

    /// Value every account.
    pub async fn value_all(&self) -> ValuationResult<Vec<AccountValuation>> {
        let accounts = self.store.list_accounts().await?;
        let mut book = PriceBook::default();
        let mut valuations = Vec::with_capacity(accounts.len());
        for account in &accounts {
            let holdings = self.store.list_holdings(&account.id).await?;
            valuations.push(self.value_with(account, &holdings, &mut book).await?);
        }
        Ok(valuations)
    }

    pub(crate) async fn value_with(
        &self,
        account: &Account,
        holdings: &[Holding],
        book: &mut PriceBook,
    ) -> ValuationResult<AccountValuation> {
        let mut valued = Vec::with_capacity(holdings.len());
        for holding in holdings {
            let price = book
                .price(&self.oracle, &self.instruments, &holding.instrument_id)
                .await?;
            valued.push(HoldingValuation {
                instrument_id: holding.instrument_id.clone(),
                shares: holding.shares_owned,
                price,
                value: holding.shares_owned.value_at(price),
            });
        }

        let holdings_value: Decimal = valued.iter().map(|h| h.value).sum();
        let portfolio_value = account.cash_available + holdings_value;
        Ok(AccountValuation {
            account_id: account.id.clone(),
            display_name: account.display_name.clone(),
            is_agent: account.is_agent(),
            cash: account.cash_available,
            holdings_value,
            portfolio_value,
            all_time_gain_loss: portfolio_value - account.starting_cash,
            holdings: valued,
        })
    }

    /// Leaderboard at live prices.
    pub async fn leaderboard(&self, me: Option<&AccountId>, top_agents: usize) -> ValuationResult<Leaderboard> {
        let valuations = self.value_all().await?;
        Ok(Leaderboard::build(&valuations, me, top_agents, self.clock.now()))
    }

    /// Write live value, gain/loss, tier and holding values back to every
    /// account's display fields. Returns the number of accounts updated.
    pub async fn refresh_display_cache(&self) -> ValuationResult<usize> {
        let valuations = self.value_all().await?;
        let entries = rank(&valuations);
        let now = self.clock.now();

        let mut updated = 0;
        for valuation in &valuations {
            let tier = entries
                .iter()
                .find(|e| e.account_id == valuation.account_id)
                .map(|e| e.tier.as_str().to_string());
            let cache = DisplayCache {
                portfolio_value: valuation.portfolio_value,
                all_time_gain_loss: valuation.all_time_gain_loss,
                tier,
                holding_values: valuation
                    .holdings
                    .iter()
                    .map(|h| (h.instrument_id.clone(), h.value))
                    .collect(),
            };
            match self
                .store
                .update_display_cache(&valuation.account_id, cache, now)
                .await
            {
                Ok(()) => updated += 1,
                Err(e) => {
                    warn!(account = %valuation.account_id, error = %e, "Display cache write failed");
                }
            }
        }

        info!(accounts = updated, "Display cache refreshed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{AccountKind, Clock, Instrument, InstrumentMeta, ManualClock, Ticker};
    use bourse_executor::{ExecutorConfig, TradeExecutor};
    use bourse_ledger::InMemoryLedgerStore;
    use bourse_oracle::{OracleConfig, StaticQuoteProvider};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<InMemoryLedgerStore>,
        provider: Arc<StaticQuoteProvider>,
        oracle: Arc<PriceOracle>,
        executor: TradeExecutor,
        service: ValuationService,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let metas: Vec<InstrumentMeta> = ["acme", "gbx"]
            .iter()
            .map(|id| InstrumentMeta {
                id: InstrumentId::new(*id),
                ticker: Ticker::new(id.to_uppercase()),
                name: id.to_string(),
                sector: None,
                initial_price: Price::new(dec!(100)),
            })
            .collect();
        let table = Arc::new(InstrumentTable::new(metas.clone()).unwrap());
        let store = Arc::new(InMemoryLedgerStore::new());
        for meta in &metas {
            store
                .upsert_instrument(Instrument::from_meta(meta, clock.now()))
                .await
                .unwrap();
        }
        for id in ["alice", "bob"] {
            store
                .open_account(Account::new(
                    AccountId::new(id),
                    id,
                    AccountKind::Human,
                    dec!(1000000),
                    clock.now(),
                ))
                .await
                .unwrap();
        }

        let provider = Arc::new(StaticQuoteProvider::new());
        provider.set_price(&Ticker::new("ACME"), Price::new(dec!(100)));
        provider.set_price(&Ticker::new("GBX"), Price::new(dec!(20)));
        let oracle = Arc::new(PriceOracle::new(
            provider.clone(),
            clock.clone(),
            OracleConfig::default(),
        ));
        let executor = TradeExecutor::new(
            store.clone(),
            oracle.clone(),
            table.clone(),
            clock.clone(),
            ExecutorConfig::default(),
        );
        let service = ValuationService::new(store.clone(), oracle.clone(), table, clock);
        Fixture {
            store,
            provider,
            oracle,
            executor,
            service,
        }
    }

    #[tokio::test]
    async fn test_conservation_after_trades() {
        let f = fixture().await;
        let alice = AccountId::new("alice");
        f.executor
            .buy(&alice, &InstrumentId::new("acme"), Shares::new(dec!(100)))
            .await
            .unwrap();
        f.executor
            .buy(&alice, &InstrumentId::new("gbx"), Shares::new(dec!(12.5)))
            .await
            .unwrap();

        f.provider.set_price(&Ticker::new("ACME"), Price::new(dec!(150)));
        f.oracle.invalidate(&Ticker::new("ACME"));
        f.executor
            .sell(&alice, &InstrumentId::new("acme"), Shares::new(dec!(40)))
            .await
            .unwrap();

        let valuation = f.service.value_account(&alice).await.unwrap();
        let account = f.store.get_account(&alice).await.unwrap().unwrap();
        let manual: Decimal = f
            .store
            .list_holdings(&alice)
            .await
            .unwrap()
            .iter()
            .map(|h| {
                let price = if h.instrument_id.as_str() == "acme" { dec!(150) } else { dec!(20) };
                h.shares_owned.inner() * price
            })
            .sum();

        assert_eq!(valuation.portfolio_value, account.cash_available + manual);
        // 1,000,000 - 10,000 - 250 + 6,000 cash; 60 ACME @150 + 12.5 GBX @20.
        assert_eq!(valuation.cash, dec!(995750));
        assert_eq!(valuation.holdings_value, dec!(9250));
        assert_eq!(valuation.all_time_gain_loss, dec!(5000));
    }

    #[tokio::test]
    async fn test_refresh_display_cache_writes_tier() {
        let f = fixture().await;
        let bob = AccountId::new("bob");
        f.executor
            .buy(&bob, &InstrumentId::new("acme"), Shares::new(dec!(10)))
            .await
            .unwrap();
        f.provider.set_price(&Ticker::new("ACME"), Price::new(dec!(200)));
        f.oracle.invalidate(&Ticker::new("ACME"));

        assert_eq!(f.service.refresh_display_cache().await.unwrap(), 2);

        let bob_account = f.store.get_account(&bob).await.unwrap().unwrap();
        assert_eq!(bob_account.portfolio_value, dec!(1001000));
        assert_eq!(bob_account.tier.as_deref(), Some("Champion"));
        let holding = f
            .store
            .get_holding(&bob, &InstrumentId::new("acme"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(holding.current_value, dec!(2000));

        let alice = f.store.get_account(&AccountId::new("alice")).await.unwrap().unwrap();
        assert_eq!(alice.tier.as_deref(), Some("Runner-up"));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let f = fixture().await;
        assert!(matches!(
            f.service.value_account(&AccountId::new("nobody")).await,
            Err(ValuationError::AccountNotFound(_))
        ));
    }
}

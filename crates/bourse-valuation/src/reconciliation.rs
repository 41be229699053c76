//! Display-vs-canonical reconciliation.
//!
//! Canonical figures are rebuilt from raw records: cash from the
//! transaction chain, positions from replaying every BUY and SELL, values
//! from live prices. Display figures are the cached account and holding
//! fields. Discrepancies are reported, never repaired.

use std::collections::BTreeMap;
use std::sync::Arc;

use bourse_core::{Account, AccountId, Holding, InstrumentId, Shares, TradeSide, Transaction};
use bourse_telemetry::Metrics;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ValuationError, ValuationResult};
use crate::valuation::{PriceBook, ValuationService};

/// Largest absolute difference treated as equal.
pub const RECONCILIATION_TOLERANCE: Decimal = dec!(0.01);

fn differs(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() > RECONCILIATION_TOLERANCE
}

/// The four audited figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Figures {
    pub cash: Decimal,
    pub holdings_value: Decimal,
    pub total_value: Decimal,
    pub holdings_count: usize,
}

/// Per-field discrepancy flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscrepancyFlags {
    pub cash: bool,
    pub holdings_value: bool,
    pub total_value: bool,
    pub holdings_count: bool,
    /// Some `balance_before` does not continue the previous `balance_after`.
    pub chain_broken: bool,
    /// Last `balance_after` differs from `cash_available`.
    pub last_balance: bool,
    /// Account `total_invested` differs from Σ holding cost basis.
    pub total_invested: bool,
    /// Replayed share counts differ from holding records.
    pub share_counts: bool,
}

impl DiscrepancyFlags {
    pub fn any(&self) -> bool {
        self.cash
            || self.holdings_value
            || self.total_value
            || self.holdings_count
            || self.chain_broken
            || self.last_balance
            || self.total_invested
            || self.share_counts
    }
}

/// Reconciliation result for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountReconciliation {
    pub account_id: AccountId,
    pub display: Figures,
    pub canonical: Figures,
    pub flags: DiscrepancyFlags,
    pub has_discrepancy: bool,
}

/// Reconciliation result for every account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub accounts: Vec<AccountReconciliation>,
    pub discrepancies: usize,
    pub generated_at: DateTime<Utc>,
}

/// Audits cached figures against canonical recomputation.
pub struct ReconciliationChecker {
    valuation: Arc<ValuationService>,
}

impl ReconciliationChecker {
    #[must_use]
    pub fn new(valuation: Arc<ValuationService>) -> Self {
        Self { valuation }
    }

    pub async fn check_account(&self, id: &AccountId) -> ValuationResult<AccountReconciliation> {
        let mut book = PriceBook::default();
        self.check_with(id, &mut book).await
    }

    pub async fn check_all(&self, generated_at: DateTime<Utc>) -> ValuationResult<ReconciliationReport> {
        let accounts = self.valuation.store().list_accounts().await?;
        let mut book = PriceBook::default();
        let mut results = Vec::with_capacity(accounts.len());
        for account in &accounts {
            results.push(self.check_with(&account.id, &mut book).await?);
        }

        let discrepancies = results.iter().filter(|r| r.has_discrepancy).count();
        Metrics::reconciliation(results.len(), discrepancies);
        for r in results.iter().filter(|r| r.has_discrepancy) {
            warn!(account = %r.account_id, flags = ?r.flags, "Reconciliation discrepancy");
        }
        info!(accounts = results.len(), discrepancies, "Reconciliation finished");

        Ok(ReconciliationReport {
            accounts: results,
            discrepancies,
            generated_at,
        })
    }

    async fn check_with(&self, id: &AccountId, book: &mut PriceBook) -> ValuationResult<AccountReconciliation> {
        let store = self.valuation.store();
        let account = store
            .get_account(id)
            .await?
            .ok_or_else(|| ValuationError::AccountNotFound(id.clone()))?;
        let holdings = store.list_holdings(id).await?;
        let transactions = store.list_transactions(id).await?;

        let mut canonical_value = Decimal::ZERO;
        for holding in &holdings {
            let price = book
                .price(
                    self.valuation.oracle(),
                    self.valuation.instruments(),
                    &holding.instrument_id,
                )
                .await?;
            canonical_value += holding.shares_owned.value_at(price);
        }

        Ok(reconcile(&account, &holdings, &transactions, canonical_value))
    }
}

/// Compare one account's records. `live_holdings_value` is Σ shares × live
/// price over `holdings`.
pub fn reconcile(
    account: &Account,
    holdings: &[Holding],
    transactions: &[Transaction],
    live_holdings_value: Decimal,
) -> AccountReconciliation {
    let mut flags = DiscrepancyFlags::default();

    // Replay the chain.
    let mut balance = account.starting_cash;
    let mut replayed: BTreeMap<&InstrumentId, Decimal> = BTreeMap::new();
    for txn in transactions {
        if txn.balance_before != balance {
            flags.chain_broken = true;
        }
        balance = txn.balance_after;
        let entry = replayed.entry(&txn.instrument_id).or_default();
        match txn.side {
            TradeSide::Buy => *entry += txn.shares.inner(),
            TradeSide::Sell => *entry -= txn.shares.inner(),
        }
    }
    let canonical_cash = balance;
    flags.last_balance = transactions
        .last()
        .is_some_and(|t| t.balance_after != account.cash_available);

    let replayed_positions = replayed.values().filter(|s| **s > Decimal::ZERO).count();
    flags.share_counts = replayed_positions != holdings.len()
        || holdings.iter().any(|h| {
            replayed.get(&h.instrument_id).copied().unwrap_or_default() != h.shares_owned.inner()
        });

    let invested: Decimal = holdings.iter().map(|h| h.total_invested).sum();
    flags.total_invested = differs(invested, account.total_invested);

    let canonical = Figures {
        cash: canonical_cash,
        holdings_value: live_holdings_value,
        total_value: canonical_cash + live_holdings_value,
        holdings_count: replayed_positions,
    };
    let display = Figures {
        cash: account.cash_available,
        holdings_value: holdings.iter().map(|h| h.current_value).sum(),
        total_value: account.portfolio_value,
        holdings_count: holdings.iter().filter(|h| h.shares_owned > Shares::ZERO).count(),
    };

    flags.cash = differs(display.cash, canonical.cash);
    flags.holdings_value = differs(display.holdings_value, canonical.holdings_value);
    flags.total_value = differs(display.total_value, canonical.total_value);
    flags.holdings_count = display.holdings_count != canonical.holdings_count;

    AccountReconciliation {
        account_id: account.id.clone(),
        has_discrepancy: flags.any(),
        display,
        canonical,
        flags,
    }
}

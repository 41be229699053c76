//! Ledger records: accounts, holdings and transactions.
//!
//! # Invariants
//!
//! 1. `shares_owned >= 0`; a holding with zero shares does not exist.
//! 2. `cash_available >= 0` after any committed trade.
//! 3. `total_invested` changes only by the cost-basis portion of shares traded.
//! 4. `avg_purchase_price == total_invested / shares_owned` while shares remain.
//! 5. Per account, `transaction[i + 1].balance_before == transaction[i].balance_after`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{AccountId, InstrumentId, Price, Shares};

/// Cash every new account is seeded with.
pub const DEFAULT_STARTING_CASH: Decimal = dec!(1000000);

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Who drives an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Human,
    Agent,
}

/// Lifecycle status of an automated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Active,
    Paused,
}

/// A player or agent account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    pub kind: AccountKind,
    /// Spendable cash. Never negative after a committed trade.
    pub cash_available: Decimal,
    /// Aggregate cost basis across all holdings.
    pub total_invested: Decimal,
    /// Cash the account was seeded with; basis for all-time gain/loss.
    pub starting_cash: Decimal,
    /// Cached display value. May drift; never used for ranking.
    pub portfolio_value: Decimal,
    /// Cached display gain/loss. May drift.
    pub all_time_gain_loss: Decimal,
    /// Cached leaderboard tier label.
    pub tier: Option<String>,
    /// Persona strategy tag (agents only).
    pub strategy: Option<String>,
    /// Agent status (agents only).
    pub status: Option<AgentStatus>,
    /// Optimistic concurrency version, bumped on every committed trade.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a freshly provisioned account seeded with `starting_cash`.
    #[must_use]
    pub fn new(
        id: AccountId,
        display_name: impl Into<String>,
        kind: AccountKind,
        starting_cash: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            kind,
            cash_available: starting_cash,
            total_invested: Decimal::ZERO,
            starting_cash,
            portfolio_value: starting_cash,
            all_time_gain_loss: Decimal::ZERO,
            tier: None,
            strategy: None,
            status: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach agent persona fields.
    #[must_use]
    pub fn with_agent_persona(mut self, strategy: impl Into<String>, status: AgentStatus) -> Self {
        self.strategy = Some(strategy.into());
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn is_agent(&self) -> bool {
        self.kind == AccountKind::Agent
    }

    /// True for agents that should be driven by the scheduler.
    #[must_use]
    pub fn is_active_agent(&self) -> bool {
        self.is_agent() && self.status == Some(AgentStatus::Active)
    }
}

/// A non-negative share position in one instrument for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub shares_owned: Shares,
    /// Cost basis of the shares currently held.
    pub total_invested: Decimal,
    pub avg_purchase_price: Price,
    /// Cached market value at the last trade or display refresh.
    pub current_value: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// Average purchase price for a position, `None` for an empty position.
    #[must_use]
    pub fn average_price(total_invested: Decimal, shares: Shares) -> Option<Price> {
        if shares.is_zero() {
            return None;
        }
        Some(Price::new(total_invested / shares.inner()))
    }

    /// Cost basis attributable to `shares` under proportional allocation.
    ///
    /// Returns `None` if `shares` exceeds the position.
    #[must_use]
    pub fn cost_basis_for(&self, shares: Shares) -> Option<Decimal> {
        if shares > self.shares_owned {
            return None;
        }
        let fraction = shares.fraction_of(self.shares_owned)?;
        Some(self.total_invested * fraction)
    }
}

/// Immutable, append-only record of an executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: TradeSide,
    pub shares: Shares,
    pub price_per_share: Price,
    /// Cost for a buy, proceeds for a sell.
    pub total_amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_new_account_is_seeded() {
        let account = Account::new(
            AccountId::new("alice"),
            "Alice",
            AccountKind::Human,
            DEFAULT_STARTING_CASH,
            now(),
        );
        assert_eq!(account.cash_available, dec!(1000000));
        assert_eq!(account.total_invested, Decimal::ZERO);
        assert_eq!(account.version, 0);
        assert!(!account.is_agent());
    }

    #[test]
    fn test_agent_persona_fields() {
        let account = Account::new(
            AccountId::new("bot-1"),
            "Momentum Max",
            AccountKind::Agent,
            DEFAULT_STARTING_CASH,
            now(),
        )
        .with_agent_persona("momentum", AgentStatus::Active);
        assert!(account.is_active_agent());
        assert_eq!(account.strategy.as_deref(), Some("momentum"));
    }

    #[test]
    fn test_cost_basis_is_proportional() {
        let holding = Holding {
            account_id: AccountId::new("alice"),
            instrument_id: InstrumentId::new("acme"),
            shares_owned: Shares::new(dec!(100)),
            total_invested: dec!(10000),
            avg_purchase_price: Price::new(dec!(100)),
            current_value: dec!(15000),
            updated_at: now(),
        };

        assert_eq!(holding.cost_basis_for(Shares::new(dec!(40))), Some(dec!(4000)));
        assert_eq!(holding.cost_basis_for(Shares::new(dec!(101))), None);
    }

    #[test]
    fn test_average_price() {
        assert_eq!(
            Holding::average_price(dec!(6000), Shares::new(dec!(60))),
            Some(Price::new(dec!(100)))
        );
        assert_eq!(Holding::average_price(dec!(6000), Shares::ZERO), None);
    }

    #[test]
    fn test_trade_side_serde() {
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"BUY\"");
    }
}

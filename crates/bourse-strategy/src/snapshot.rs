//! Market snapshot seen by one agent.

use bourse_core::{AccountId, InstrumentId, Price, Shares, Ticker};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Live quote for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentQuote {
    pub instrument_id: InstrumentId,
    pub ticker: Ticker,
    pub name: String,
    pub sector: Option<String>,
    pub price: Price,
    pub change_24h_pct: Option<Decimal>,
}

/// One held position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub instrument_id: InstrumentId,
    pub shares: Shares,
    pub total_invested: Decimal,
    pub avg_purchase_price: Price,
}

/// Cash, positions and quotes for one agent at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub account_id: AccountId,
    pub cash_available: Decimal,
    pub instruments: Vec<InstrumentQuote>,
    pub positions: Vec<PositionView>,
    pub taken_at: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn quote(&self, id: &InstrumentId) -> Option<&InstrumentQuote> {
        self.instruments.iter().find(|q| &q.instrument_id == id)
    }

    pub fn position(&self, id: &InstrumentId) -> Option<&PositionView> {
        self.positions.iter().find(|p| &p.instrument_id == id)
    }

    /// Market value of a position at the snapshot price. A held position
    /// with no quote counts at its cost basis; zero if not held.
    pub fn position_value(&self, id: &InstrumentId) -> Decimal {
        match (self.position(id), self.quote(id)) {
            (Some(position), Some(quote)) => position.shares.value_at(quote.price),
            (Some(position), None) => position.total_invested,
            _ => Decimal::ZERO,
        }
    }

    /// Σ position values.
    pub fn holdings_value(&self) -> Decimal {
        self.positions
            .iter()
            .map(|p| self.position_value(&p.instrument_id))
            .sum()
    }

    /// Cash plus holdings value.
    pub fn total_value(&self) -> Decimal {
        self.cash_available + self.holdings_value()
    }

    /// Cash as percent of total value (zero for an empty account).
    pub fn cash_pct(&self) -> Decimal {
        let total = self.total_value();
        if total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.cash_available / total * Decimal::ONE_HUNDRED
    }

    /// Position value as percent of total value.
    pub fn allocation_pct(&self, id: &InstrumentId) -> Decimal {
        let total = self.total_value();
        if total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.position_value(id) / total * Decimal::ONE_HUNDRED
    }

    /// Unrealized gain/loss of a position in percent of its average price.
    pub fn unrealized_pct(&self, id: &InstrumentId) -> Option<Decimal> {
        let position = self.position(id)?;
        let quote = self.quote(id)?;
        quote.price.pct_from(position.avg_purchase_price)
    }
}

//! Tradable instruments and the instrument metadata table.
//!
//! `InstrumentTable` is the one place that maps instrument ids to tickers,
//! names and sectors. It is built once from configuration and shared by
//! every component that needs instrument metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};
use crate::{InstrumentId, Price, Shares, Ticker};

/// Static metadata for one instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentMeta {
    pub id: InstrumentId,
    pub ticker: Ticker,
    pub name: String,
    #[serde(default)]
    pub sector: Option<String>,
    /// Price stored on the instrument before any quote has been observed.
    pub initial_price: Price,
}

/// Persisted instrument record with cached price and aggregate counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub ticker: Ticker,
    /// Last price stored from the oracle. Fallback when the provider is down.
    pub current_price: Price,
    /// Cumulative shares traded (buys and sells).
    pub volume_traded: Shares,
    /// Shares currently held across all accounts.
    pub shares_held: Shares,
    /// Number of accounts holding a non-zero position.
    pub unique_holders: u32,
    pub updated_at: DateTime<Utc>,
}

impl Instrument {
    /// Create the persisted record for a newly listed instrument.
    #[must_use]
    pub fn from_meta(meta: &InstrumentMeta, now: DateTime<Utc>) -> Self {
        Self {
            id: meta.id.clone(),
            ticker: meta.ticker.clone(),
            current_price: meta.initial_price,
            volume_traded: Shares::ZERO,
            shares_held: Shares::ZERO,
            unique_holders: 0,
            updated_at: now,
        }
    }
}

/// Single source of truth for instrument metadata.
#[derive(Debug, Clone, Default)]
pub struct InstrumentTable {
    entries: Vec<InstrumentMeta>,
    by_id: HashMap<InstrumentId, usize>,
    by_ticker: HashMap<Ticker, usize>,
}

impl InstrumentTable {
    /// Build the table, rejecting duplicate ids or tickers.
    pub fn new(entries: Vec<InstrumentMeta>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(entries.len());
        let mut by_ticker = HashMap::with_capacity(entries.len());

        for (idx, meta) in entries.iter().enumerate() {
            if !meta.initial_price.is_positive() {
                return Err(CoreError::InvalidPrice(format!(
                    "{}: initial price must be positive",
                    meta.id
                )));
            }
            if by_id.insert(meta.id.clone(), idx).is_some() {
                return Err(CoreError::DuplicateInstrument(meta.id.to_string()));
            }
            if by_ticker.insert(meta.ticker.clone(), idx).is_some() {
                return Err(CoreError::DuplicateInstrument(meta.ticker.to_string()));
            }
        }

        Ok(Self {
            entries,
            by_id,
            by_ticker,
        })
    }

    /// Look up metadata by instrument id.
    pub fn get(&self, id: &InstrumentId) -> Option<&InstrumentMeta> {
        self.by_id.get(id).map(|&idx| &self.entries[idx])
    }

    /// Look up metadata by ticker.
    pub fn by_ticker(&self, ticker: &Ticker) -> Option<&InstrumentMeta> {
        self.by_ticker.get(ticker).map(|&idx| &self.entries[idx])
    }

    /// Ticker for an instrument id.
    pub fn ticker_of(&self, id: &InstrumentId) -> Option<&Ticker> {
        self.get(id).map(|meta| &meta.ticker)
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Iterate instruments in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &InstrumentMeta> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Stored-price fallback for the oracle.
//!
//! Adapts the ledger's instrument records to the oracle's
//! `StoredPriceLookup` so the last stored price is served when neither the
//! provider nor the cache can answer.

use std::sync::Arc;

use async_trait::async_trait;
use bourse_core::{InstrumentTable, Price, Ticker};
use bourse_ledger::LedgerStore;
use bourse_oracle::StoredPriceLookup;
use tracing::warn;

/// Looks up an instrument's stored `current_price` by ticker.
pub struct LedgerPriceLookup {
    store: Arc<dyn LedgerStore>,
    instruments: Arc<InstrumentTable>,
}

impl LedgerPriceLookup {
    /// Create a new `LedgerPriceLookup`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, instruments: Arc<InstrumentTable>) -> Self {
        Self { store, instruments }
    }
}

#[async_trait]
impl StoredPriceLookup for LedgerPriceLookup {
    async fn stored_price(&self, ticker: &Ticker) -> Option<Price> {
        let meta = self.instruments.by_ticker(ticker)?;
        match self.store.get_instrument(&meta.id).await {
            Ok(Some(instrument)) if instrument.current_price.is_positive() => {
                Some(instrument.current_price)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(ticker = %ticker, error = %e, "Stored price lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{Instrument, InstrumentId, InstrumentMeta};
    use bourse_ledger::InMemoryLedgerStore;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn meta() -> InstrumentMeta {
        InstrumentMeta {
            id: InstrumentId::new("acme"),
            ticker: Ticker::new("ACME"),
            name: "Acme".to_string(),
            sector: None,
            initial_price: Price::new(dec!(50)),
        }
    }

    #[tokio::test]
    async fn test_returns_stored_price() {
        let store = Arc::new(InMemoryLedgerStore::new());
        store
            .upsert_instrument(Instrument::from_meta(&meta(), Utc::now()))
            .await
            .unwrap();
        store
            .update_instrument_price(&InstrumentId::new("acme"), Price::new(dec!(55)), Utc::now())
            .await
            .unwrap();
        let table = Arc::new(InstrumentTable::new(vec![meta()]).unwrap());

        let lookup = LedgerPriceLookup::new(store, table);
        assert_eq!(
            lookup.stored_price(&Ticker::new("ACME")).await,
            Some(Price::new(dec!(55)))
        );
    }

    #[tokio::test]
    async fn test_none_for_unknown() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let table = Arc::new(InstrumentTable::new(vec![meta()]).unwrap());
        let lookup = LedgerPriceLookup::new(store, table);

        // Listed in the table but never stored.
        assert!(lookup.stored_price(&Ticker::new("ACME")).await.is_none());
        assert!(lookup.stored_price(&Ticker::new("ZZZ")).await.is_none());
    }
}

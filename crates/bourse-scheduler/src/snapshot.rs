//! Market snapshot assembly for one agent.

use bourse_core::{Account, InstrumentTable, SharedClock};
use bourse_ledger::LedgerStore;
use bourse_oracle::PriceOracle;
use bourse_strategy::{InstrumentQuote, MarketSnapshot, PositionView};
use tracing::warn;

use crate::error::SchedulerResult;

/// Quote every instrument in the table. Instruments without any price are
/// left out rather than failing the caller.
pub async fn quote_instruments(
    oracle: &PriceOracle,
    instruments: &InstrumentTable,
) -> Vec<InstrumentQuote> {
    let mut quotes = Vec::with_capacity(instruments.len());
    for meta in instruments.iter() {
        match oracle.get_quote(&meta.ticker).await {
            Ok(reading) => quotes.push(InstrumentQuote {
                instrument_id: meta.id.clone(),
                ticker: meta.ticker.clone(),
                name: meta.name.clone(),
                sector: meta.sector.clone(),
                price: reading.price,
                change_24h_pct: reading.change_24h_pct,
            }),
            Err(e) => {
                warn!(ticker = %meta.ticker, error = %e, "No price for instrument, leaving it out");
            }
        }
    }
    quotes
}

/// Cash, positions and the given quotes for `account`.
pub async fn build_snapshot(
    store: &dyn LedgerStore,
    account: &Account,
    quotes: Vec<InstrumentQuote>,
    clock: &SharedClock,
) -> SchedulerResult<MarketSnapshot> {
    let positions = store
        .list_holdings(&account.id)
        .await?
        .into_iter()
        .map(|h| PositionView {
            instrument_id: h.instrument_id,
            shares: h.shares_owned,
            total_invested: h.total_invested,
            avg_purchase_price: h.avg_purchase_price,
        })
        .collect();

    Ok(MarketSnapshot {
        account_id: account.id.clone(),
        cash_available: account.cash_available,
        instruments: quotes,
        positions,
        taken_at: clock.now(),
    })
}

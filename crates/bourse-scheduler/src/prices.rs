//! Instrument stored-price refresh.

use bourse_core::{InstrumentTable, SharedClock};
use bourse_ledger::LedgerStore;
use bourse_oracle::{PriceOracle, PriceSource};
use tracing::{debug, info, warn};

/// Counts from one refresh pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub updated: usize,
    /// Oracle served a fallback; the stored price was left alone.
    pub skipped: usize,
    pub failed: usize,
}

/// Store a fresh quote as every instrument's last known price.
///
/// Readings that came from a fallback tier are not written back, so a
/// provider outage cannot overwrite stored prices with older ones.
pub async fn refresh_instrument_prices(
    oracle: &PriceOracle,
    store: &dyn LedgerStore,
    instruments: &InstrumentTable,
    clock: &SharedClock,
) -> RefreshSummary {
    let mut summary = RefreshSummary::default();

    for meta in instruments.iter() {
        let reading = match oracle.get_quote(&meta.ticker).await {
            Ok(reading) => reading,
            Err(e) => {
                warn!(ticker = %meta.ticker, error = %e, "Price refresh failed");
                summary.failed += 1;
                continue;
            }
        };

        if matches!(reading.source, PriceSource::StaleCache | PriceSource::Stored) {
            debug!(ticker = %meta.ticker, source = reading.source.as_str(), "Skipping fallback price");
            summary.skipped += 1;
            continue;
        }

        match store
            .update_instrument_price(&meta.id, reading.price, clock.now())
            .await
        {
            Ok(()) => summary.updated += 1,
            Err(e) => {
                warn!(instrument = %meta.id, error = %e, "Failed to store instrument price");
                summary.failed += 1;
            }
        }
    }

    info!(
        updated = summary.updated,
        skipped = summary.skipped,
        failed = summary.failed,
        "Instrument prices refreshed"
    );
    summary
}

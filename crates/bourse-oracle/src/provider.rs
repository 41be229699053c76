//! Upstream market data provider abstraction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bourse_core::{Price, Ticker};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{OracleError, OracleResult};

/// A single quote returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub ticker: Ticker,
    pub price: Price,
    /// Percent change over the last trading day, if the provider reports it.
    pub change_24h_pct: Option<Decimal>,
}

/// Upstream source of current prices.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Fetch the current quote for a ticker.
    async fn fetch_quote(&self, ticker: &Ticker) -> OracleResult<Quote>;
}

/// In-process provider with settable quotes.
///
/// Used for paper runs without an API key and as a test double.
/// Counts upstream calls so cache behaviour can be asserted.
#[derive(Debug, Default)]
pub struct StaticQuoteProvider {
    quotes: Mutex<HashMap<Ticker, Quote>>,
    calls: AtomicU64,
    failing: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl StaticQuoteProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price (and optional 24h change) returned for a ticker.
    pub fn set_quote(&self, ticker: &Ticker, price: Price, change_24h_pct: Option<Decimal>) {
        self.quotes.lock().insert(
            ticker.clone(),
            Quote {
                ticker: ticker.clone(),
                price,
                change_24h_pct,
            },
        );
    }

    /// Set only the price, keeping any existing 24h change.
    pub fn set_price(&self, ticker: &Ticker, price: Price) {
        let change = self
            .quotes
            .lock()
            .get(ticker)
            .and_then(|q| q.change_24h_pct);
        self.set_quote(ticker, price, change);
    }

    /// Make every subsequent fetch fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Add artificial latency to every fetch.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Number of upstream fetches attempted so far.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataProvider for StaticQuoteProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_quote(&self, ticker: &Ticker) -> OracleResult<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(OracleError::Provider("static provider set to fail".to_string()));
        }

        self.quotes
            .lock()
            .get(ticker)
            .cloned()
            .ok_or_else(|| OracleError::UnknownTicker(ticker.clone()))
    }
}

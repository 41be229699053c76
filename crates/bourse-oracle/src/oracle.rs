//! Price oracle with TTL cache, single-flight refresh and fallbacks.
//!
//! # Concurrency
//!
//! The cache is a `DashMap` keyed by ticker. Refreshes for a stale ticker
//! are serialized by a per-ticker async lock: the first caller fetches,
//! later callers wait on the lock and then find a fresh entry (or a recent
//! failure) and return without calling upstream. DashMap guards are never
//! held across an `.await`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bourse_core::{Price, SharedClock, Ticker};
use bourse_telemetry::Metrics;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::{OracleError, OracleResult};
use crate::provider::{MarketDataProvider, Quote};
use crate::rate_limiter::RateLimiter;

/// Last-resort price source, typically the instrument's stored price.
#[async_trait]
pub trait StoredPriceLookup: Send + Sync {
    async fn stored_price(&self, ticker: &Ticker) -> Option<Price>;
}

/// Oracle tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum age of a cached quote served without refreshing (ms).
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Upper bound on one upstream fetch, including rate-limit wait (ms).
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// After a failed fetch, serve fallbacks for this long before retrying (ms).
    #[serde(default = "default_failure_backoff_ms")]
    pub failure_backoff_ms: u64,
}

fn default_ttl_ms() -> u64 {
    60_000
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_failure_backoff_ms() -> u64 {
    5_000
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            failure_backoff_ms: default_failure_backoff_ms(),
        }
    }
}

/// Where a price reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Fresh cache hit.
    Cache,
    /// Fetched upstream during this call (or by a concurrent caller).
    Provider,
    /// Provider unavailable; last cached quote past its TTL.
    StaleCache,
    /// Provider unavailable and nothing cached; instrument's stored price.
    Stored,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Provider => "provider",
            Self::StaleCache => "stale_cache",
            Self::Stored => "stored",
        }
    }
}

/// A resolved price with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceReading {
    pub ticker: Ticker,
    pub price: Price,
    pub change_24h_pct: Option<Decimal>,
    pub source: PriceSource,
    /// When the underlying quote was fetched (`None` for stored prices).
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Cache entry for one ticker.
#[derive(Debug, Clone, Default)]
struct CacheEntry {
    quote: Option<Quote>,
    fetched_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// TTL-bounded, single-flight price cache in front of a provider.
pub struct PriceOracle {
    provider: Arc<dyn MarketDataProvider>,
    fallback: Option<Arc<dyn StoredPriceLookup>>,
    limiter: Option<Arc<RateLimiter>>,
    cache: DashMap<Ticker, CacheEntry>,
    flights: DashMap<Ticker, Arc<AsyncMutex<()>>>,
    clock: SharedClock,
    config: OracleConfig,
}

impl PriceOracle {
    /// Create a new oracle.
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        clock: SharedClock,
        config: OracleConfig,
    ) -> Self {
        Self {
            provider,
            fallback: None,
            limiter: None,
            cache: DashMap::new(),
            flights: DashMap::new(),
            clock,
            config,
        }
    }

    /// Use `fallback` when neither provider nor cache can answer.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn StoredPriceLookup>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Put a rate limiter in front of the provider.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Late-bind the stored-price fallback.
    pub fn set_fallback(&mut self, fallback: Arc<dyn StoredPriceLookup>) {
        self.fallback = Some(fallback);
    }

    /// Resolve a ticker to a price.
    pub async fn get_price(&self, ticker: &Ticker) -> OracleResult<Price> {
        self.get_quote(ticker).await.map(|reading| reading.price)
    }

    /// Resolve a ticker to a price reading with provenance and 24h change.
    pub async fn get_quote(&self, ticker: &Ticker) -> OracleResult<PriceReading> {
        if let Some(reading) = self.fresh_reading(ticker) {
            Metrics::price_lookup(reading.source.as_str());
            return Ok(reading);
        }

        let flight = self
            .flights
            .entry(ticker.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = flight.lock().await;

        // Another caller may have refreshed (or failed) while we waited.
        if let Some(reading) = self.fresh_reading(ticker) {
            Metrics::price_lookup(reading.source.as_str());
            return Ok(reading);
        }
        if self.in_failure_backoff(ticker) {
            debug!(ticker = %ticker, "Provider in failure backoff, serving fallback");
            return self.fallback_reading(ticker).await;
        }

        match self.fetch_upstream(ticker).await {
            Ok(quote) => {
                let now = self.clock.now();
                let reading = PriceReading {
                    ticker: ticker.clone(),
                    price: quote.price,
                    change_24h_pct: quote.change_24h_pct,
                    source: PriceSource::Provider,
                    fetched_at: Some(now),
                };
                self.cache.insert(
                    ticker.clone(),
                    CacheEntry {
                        quote: Some(quote),
                        fetched_at: Some(now),
                        last_failure_at: None,
                    },
                );
                Metrics::price_lookup(PriceSource::Provider.as_str());
                Ok(reading)
            }
            Err(e) => {
                warn!(
                    ticker = %ticker,
                    provider = self.provider.name(),
                    error = %e,
                    "Price fetch failed, degrading to fallback"
                );
                Metrics::provider_error(self.provider.name());
                let now = self.clock.now();
                self.cache
                    .entry(ticker.clone())
                    .or_default()
                    .last_failure_at = Some(now);
                self.fallback_reading(ticker).await
            }
        }
    }

    /// Cached reading without any upstream call, regardless of age.
    pub fn peek(&self, ticker: &Ticker) -> Option<PriceReading> {
        let entry = self.cache.get(ticker)?;
        let quote = entry.quote.as_ref()?;
        let source = if self.is_fresh(entry.fetched_at) {
            PriceSource::Cache
        } else {
            PriceSource::StaleCache
        };
        Some(PriceReading {
            ticker: ticker.clone(),
            price: quote.price,
            change_24h_pct: quote.change_24h_pct,
            source,
            fetched_at: entry.fetched_at,
        })
    }

    /// Seed the cache with a quote observed elsewhere.
    pub fn prime(&self, quote: Quote) {
        let now = self.clock.now();
        self.cache.insert(
            quote.ticker.clone(),
            CacheEntry {
                quote: Some(quote),
                fetched_at: Some(now),
                last_failure_at: None,
            },
        );
    }

    /// Drop freshness for a ticker so the next lookup goes upstream.
    /// The quote itself is kept as a stale fallback.
    pub fn invalidate(&self, ticker: &Ticker) {
        if let Some(mut entry) = self.cache.get_mut(ticker) {
            entry.fetched_at = None;
            entry.last_failure_at = None;
        }
    }

    /// Number of tickers with a cached quote.
    pub fn cached_count(&self) -> usize {
        self.cache.iter().filter(|e| e.quote.is_some()).count()
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn fresh_reading(&self, ticker: &Ticker) -> Option<PriceReading> {
        let reading = self.peek(ticker)?;
        (reading.source == PriceSource::Cache).then_some(reading)
    }

    fn is_fresh(&self, fetched_at: Option<DateTime<Utc>>) -> bool {
        let Some(fetched_at) = fetched_at else {
            return false;
        };
        let age_ms = (self.clock.now() - fetched_at).num_milliseconds();
        age_ms >= 0 && (age_ms as u64) < self.config.ttl_ms
    }

    fn in_failure_backoff(&self, ticker: &Ticker) -> bool {
        let Some(failed_at) = self.cache.get(ticker).and_then(|e| e.last_failure_at) else {
            return false;
        };
        let since_ms = (self.clock.now() - failed_at).num_milliseconds();
        since_ms >= 0 && (since_ms as u64) < self.config.failure_backoff_ms
    }

    async fn fetch_upstream(&self, ticker: &Ticker) -> OracleResult<Quote> {
        let timeout_ms = self.config.fetch_timeout_ms;
        let started = std::time::Instant::now();

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }
            self.provider.fetch_quote(ticker).await
        })
        .await
        .map_err(|_| OracleError::Timeout(timeout_ms))?;

        Metrics::provider_latency(self.provider.name(), started.elapsed());
        result
    }

    async fn fallback_reading(&self, ticker: &Ticker) -> OracleResult<PriceReading> {
        if let Some(mut reading) = self.peek(ticker) {
            reading.source = PriceSource::StaleCache;
            Metrics::price_lookup(PriceSource::StaleCache.as_str());
            return Ok(reading);
        }

        if let Some(fallback) = &self.fallback {
            if let Some(price) = fallback.stored_price(ticker).await {
                Metrics::price_lookup(PriceSource::Stored.as_str());
                return Ok(PriceReading {
                    ticker: ticker.clone(),
                    price,
                    change_24h_pct: None,
                    source: PriceSource::Stored,
                    fetched_at: None,
                });
            }
        }

        Err(OracleError::NoPriceAvailable(ticker.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticQuoteProvider;
    use bourse_core::ManualClock;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    struct FixedStore(Option<Price>);

    #[async_trait]
    impl StoredPriceLookup for FixedStore {
        async fn stored_price(&self, _ticker: &Ticker) -> Option<Price> {
            self.0
        }
    }

    fn setup() -> (Arc<StaticQuoteProvider>, Arc<ManualClock>, PriceOracle) {
        let provider = Arc::new(StaticQuoteProvider::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        ));
        let oracle = PriceOracle::new(provider.clone(), clock.clone(), OracleConfig::default());
        (provider, clock, oracle)
    }

    fn acme() -> Ticker {
        Ticker::new("ACME")
    }

    #[tokio::test]
    async fn test_cache_hit_within_ttl() {
        let (provider, clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), Some(dec!(1.5)));

        let first = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(first.source, PriceSource::Provider);
        assert_eq!(first.change_24h_pct, Some(dec!(1.5)));

        provider.set_price(&acme(), Price::new(dec!(120)));
        clock.advance(chrono::Duration::seconds(30));

        let second = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(second.source, PriceSource::Cache);
        assert_eq!(second.price, Price::new(dec!(100)));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refetch_after_ttl() {
        let (provider, clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        oracle.get_price(&acme()).await.unwrap();

        provider.set_price(&acme(), Price::new(dec!(150)));
        clock.advance(chrono::Duration::seconds(61));

        assert_eq!(oracle.get_price(&acme()).await.unwrap(), Price::new(dec!(150)));
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_stale_cache() {
        let (provider, clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        oracle.get_price(&acme()).await.unwrap();

        provider.set_failing(true);
        clock.advance(chrono::Duration::minutes(5));

        let reading = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(reading.source, PriceSource::StaleCache);
        assert_eq!(reading.price, Price::new(dec!(100)));
    }

    #[tokio::test]
    async fn test_falls_back_to_stored_price() {
        let (provider, _clock, oracle) = setup();
        provider.set_failing(true);
        let oracle = oracle.with_fallback(Arc::new(FixedStore(Some(Price::new(dec!(42))))));

        let reading = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(reading.source, PriceSource::Stored);
        assert_eq!(reading.price, Price::new(dec!(42)));
    }

    #[tokio::test]
    async fn test_no_price_ever_observed() {
        let (provider, _clock, oracle) = setup();
        provider.set_failing(true);
        let oracle = oracle.with_fallback(Arc::new(FixedStore(None)));

        assert!(matches!(
            oracle.get_price(&acme()).await,
            Err(OracleError::NoPriceAvailable(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_backoff_skips_upstream() {
        let (provider, clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        oracle.get_price(&acme()).await.unwrap();

        provider.set_failing(true);
        clock.advance(chrono::Duration::minutes(2));
        oracle.get_price(&acme()).await.unwrap();
        assert_eq!(provider.call_count(), 2);

        // Within the backoff window the provider is not called again.
        clock.advance(chrono::Duration::seconds(1));
        oracle.get_price(&acme()).await.unwrap();
        assert_eq!(provider.call_count(), 2);

        // After the backoff the provider is retried.
        clock.advance(chrono::Duration::seconds(10));
        provider.set_failing(false);
        let reading = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(reading.source, PriceSource::Provider);
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_single_flight_collapses_concurrent_lookups() {
        let (provider, _clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        provider.set_latency(Some(Duration::from_millis(50)));
        let oracle = Arc::new(oracle);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let oracle = oracle.clone();
            handles.push(tokio::spawn(async move { oracle.get_price(&acme()).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Price::new(dec!(100)));
        }

        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_fallback() {
        let provider = Arc::new(StaticQuoteProvider::new());
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        provider.set_latency(Some(Duration::from_millis(200)));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = OracleConfig {
            fetch_timeout_ms: 20,
            ..OracleConfig::default()
        };
        let oracle = PriceOracle::new(provider, clock, config)
            .with_fallback(Arc::new(FixedStore(Some(Price::new(dec!(99))))));

        let reading = oracle.get_quote(&acme()).await.unwrap();
        assert_eq!(reading.source, PriceSource::Stored);
        assert_eq!(reading.price, Price::new(dec!(99)));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (provider, _clock, oracle) = setup();
        provider.set_quote(&acme(), Price::new(dec!(100)), None);
        oracle.get_price(&acme()).await.unwrap();

        provider.set_price(&acme(), Price::new(dec!(101)));
        oracle.invalidate(&acme());

        assert_eq!(oracle.get_price(&acme()).await.unwrap(), Price::new(dec!(101)));
        assert_eq!(provider.call_count(), 2);
    }

    #[test]
    fn test_prime_and_peek() {
        let (_provider, _clock, oracle) = setup();
        assert!(oracle.peek(&acme()).is_none());

        oracle.prime(Quote {
            ticker: acme(),
            price: Price::new(dec!(7)),
            change_24h_pct: None,
        });
        let reading = oracle.peek(&acme()).unwrap();
        assert_eq!(reading.source, PriceSource::Cache);
        assert_eq!(oracle.cached_count(), 1);
    }
}

//! Cached market price oracle.
//!
//! Resolves a ticker to a price with bounded staleness:
//!
//! 1. Fresh cache entry (age < TTL)
//! 2. Upstream provider (single-flight per ticker, rate limited, timed out)
//! 3. Last cached quote of any age
//! 4. Instrument's last stored price
//! 5. `OracleError::NoPriceAvailable`
//!
//! # Key Components
//!
//! - [`PriceOracle`]: TTL cache with single-flight refresh and fallbacks
//! - [`MarketDataProvider`]: Upstream quote source trait
//! - [`FinnhubProvider`]: HTTP provider for the Finnhub `/quote` endpoint
//! - [`StaticQuoteProvider`]: In-process provider for paper runs and tests
//! - [`RateLimiter`]: Sliding-window limiter in front of the provider

pub mod error;
pub mod finnhub;
pub mod oracle;
pub mod provider;
pub mod rate_limiter;

pub use error::{OracleError, OracleResult};
pub use finnhub::{FinnhubConfig, FinnhubProvider};
pub use oracle::{OracleConfig, PriceOracle, PriceReading, PriceSource, StoredPriceLookup};
pub use provider::{MarketDataProvider, Quote, StaticQuoteProvider};
pub use rate_limiter::RateLimiter;

//! Finnhub market data provider.
//!
//! Calls `GET {base_url}/quote?symbol={ticker}&token={api_key}` and reads
//! `c` (current price) and `dp` (percent change). Finnhub answers unknown
//! symbols with an all-zero quote, so a zero price is treated as unknown.

use std::time::Duration;

use async_trait::async_trait;
use bourse_core::{Price, Ticker};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{OracleError, OracleResult};
use crate::provider::{MarketDataProvider, Quote};

/// Default Finnhub REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Response from /quote endpoint.
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price.
    c: Option<Decimal>,
    /// Percent change from previous close.
    dp: Option<Decimal>,
}

/// Finnhub connection settings.
#[derive(Clone)]
pub struct FinnhubConfig {
    pub base_url: String,
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

impl FinnhubConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: Zeroizing::new(api_key.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for FinnhubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinnhubConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Finnhub quote provider.
pub struct FinnhubProvider {
    client: Client,
    config: FinnhubConfig,
}

impl FinnhubProvider {
    /// Create a new provider.
    pub fn new(config: FinnhubConfig) -> OracleResult<Self> {
        if !config.is_configured() {
            return Err(OracleError::HttpClient(
                "Finnhub API key not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    async fn fetch_quote(&self, ticker: &Ticker) -> OracleResult<Quote> {
        let url = format!("{}/quote", self.config.base_url.trim_end_matches('/'));
        debug!(ticker = %ticker, "Fetching quote from Finnhub");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", ticker.as_str()),
                ("token", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    OracleError::Provider(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(ticker = %ticker, %status, "Finnhub returned error status");
            return Err(OracleError::Provider(format!("HTTP {status}: {body}")));
        }

        let body: QuoteResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Provider(format!("Failed to parse quote: {e}")))?;

        parse_quote(ticker, body)
    }
}

fn parse_quote(ticker: &Ticker, body: QuoteResponse) -> OracleResult<Quote> {
    let price = body.c.map(Price::new).unwrap_or(Price::ZERO);
    if !price.is_positive() {
        return Err(OracleError::UnknownTicker(ticker.clone()));
    }

    Ok(Quote {
        ticker: ticker.clone(),
        price,
        change_24h_pct: body.dp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_quote() {
        let body: QuoteResponse =
            serde_json::from_str(r#"{"c": 187.5, "d": 2.1, "dp": 1.13, "h": 190, "l": 185}"#)
                .unwrap();
        let quote = parse_quote(&Ticker::new("AAPL"), body).unwrap();

        assert_eq!(quote.price, Price::new(dec!(187.5)));
        assert_eq!(quote.change_24h_pct, Some(dec!(1.13)));
    }

    #[test]
    fn test_zero_quote_is_unknown_ticker() {
        let body: QuoteResponse = serde_json::from_str(r#"{"c": 0, "dp": null}"#).unwrap();
        assert!(matches!(
            parse_quote(&Ticker::new("ZZZZ"), body),
            Err(OracleError::UnknownTicker(_))
        ));
    }

    #[test]
    fn test_missing_key_rejected() {
        assert!(FinnhubProvider::new(FinnhubConfig::new("")).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = FinnhubConfig::new("secret-key");
        assert!(!format!("{config:?}").contains("secret-key"));
    }
}

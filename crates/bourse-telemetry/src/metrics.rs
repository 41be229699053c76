//! Prometheus metrics for bourse.
//!
//! Covers:
//! - Trade execution and rejections
//! - Price oracle lookups and provider health
//! - Scheduler rounds and per-agent outcomes
//! - Reconciliation audits
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use std::time::Duration;

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec,
    register_int_counter, CounterVec, Encoder, Gauge, Histogram, HistogramVec, IntCounter,
    TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

// =============================================================================
// Trades
// =============================================================================

/// Executed trades.
/// Labels: side (buy/sell)
pub static TRADES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("bourse_trades_total", "Total executed trades", &["side"]).unwrap()
});

/// Rejected trades.
/// Labels: side, reason (insufficient_funds/insufficient_shares/not_found/...)
pub static TRADE_REJECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bourse_trade_rejections_total",
        "Total rejected trade attempts",
        &["side", "reason"]
    )
    .unwrap()
});

/// Optimistic version conflicts retried by the executor.
pub static VERSION_CONFLICTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "bourse_version_conflicts_total",
        "Ledger commits retried after an account version conflict"
    )
    .unwrap()
});

// =============================================================================
// Price oracle
// =============================================================================

/// Price lookups by resolution source.
/// Labels: source (cache/provider/stale_cache/stored)
pub static PRICE_LOOKUPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bourse_price_lookups_total",
        "Price lookups by resolution source",
        &["source"]
    )
    .unwrap()
});

/// Upstream provider latency in milliseconds.
pub static PROVIDER_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bourse_provider_latency_ms",
        "Market data provider latency in milliseconds",
        &["provider"],
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Upstream provider failures (including timeouts).
pub static PROVIDER_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bourse_provider_errors_total",
        "Market data provider failures",
        &["provider"]
    )
    .unwrap()
});

// =============================================================================
// Scheduler
// =============================================================================

/// Agent outcomes per round.
/// Labels: outcome (cooldown/held/executed/failed)
pub static AGENT_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bourse_agent_outcomes_total",
        "Per-agent outcomes of trading rounds",
        &["outcome"]
    )
    .unwrap()
});

/// Round wall-clock duration in seconds.
pub static ROUND_DURATION_SECS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "bourse_round_duration_seconds",
        "Trading round duration in seconds",
        vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .unwrap()
});

/// Round triggers refused because a round was already running.
pub static ROUNDS_SKIPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "bourse_rounds_skipped_total",
        "Trading round triggers skipped while a round was in progress"
    )
    .unwrap()
});

/// Reasoning service fallbacks.
/// Labels: reason (timeout/error/malformed)
pub static REASONING_FALLBACKS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bourse_reasoning_fallbacks_total",
        "Decisions where the reasoning service output was not used",
        &["reason"]
    )
    .unwrap()
});

// =============================================================================
// Reconciliation
// =============================================================================

/// Accounts with at least one discrepancy in the latest audit.
pub static RECONCILIATION_DISCREPANCIES: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "bourse_reconciliation_discrepancies",
        "Accounts flagged in the latest reconciliation audit"
    )
    .unwrap()
});

/// Accounts checked in the latest audit.
pub static RECONCILIATION_ACCOUNTS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "bourse_reconciliation_accounts",
        "Accounts checked in the latest reconciliation audit"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record an executed trade.
    pub fn trade_executed(side: &str) {
        TRADES_TOTAL.with_label_values(&[side]).inc();
    }

    /// Record a rejected trade.
    pub fn trade_rejected(side: &str, reason: &str) {
        TRADE_REJECTIONS_TOTAL
            .with_label_values(&[side, reason])
            .inc();
    }

    /// Record a retried version conflict.
    pub fn version_conflict() {
        VERSION_CONFLICTS_TOTAL.inc();
    }

    /// Record a price lookup resolved from `source`.
    pub fn price_lookup(source: &str) {
        PRICE_LOOKUPS_TOTAL.with_label_values(&[source]).inc();
    }

    /// Record upstream provider latency.
    pub fn provider_latency(provider: &str, elapsed: Duration) {
        PROVIDER_LATENCY_MS
            .with_label_values(&[provider])
            .observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Record an upstream provider failure.
    pub fn provider_error(provider: &str) {
        PROVIDER_ERRORS_TOTAL.with_label_values(&[provider]).inc();
    }

    /// Record one agent's outcome in a round.
    pub fn agent_outcome(outcome: &str) {
        AGENT_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record a completed round.
    pub fn round_completed(elapsed: Duration) {
        ROUND_DURATION_SECS.observe(elapsed.as_secs_f64());
    }

    /// Record a round trigger skipped due to overlap.
    pub fn round_skipped() {
        ROUNDS_SKIPPED_TOTAL.inc();
    }

    /// Record a reasoning fallback.
    pub fn reasoning_fallback(reason: &str) {
        REASONING_FALLBACKS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record the result of a reconciliation audit.
    pub fn reconciliation(accounts: usize, discrepancies: usize) {
        RECONCILIATION_ACCOUNTS.set(accounts as f64);
        RECONCILIATION_DISCREPANCIES.set(discrepancies as f64);
    }
}

/// Encode every registered metric in the Prometheus text format.
pub fn gather_text() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}

//! Valuation, ranking and reconciliation for bourse.
//!
//! Portfolio value is always `cash + Σ shares × live oracle price`. Cached
//! display figures are written by [`ValuationService::refresh_display_cache`]
//! and audited by [`ReconciliationChecker`].
//!
//! # Key Components
//!
//! - [`ValuationService`]: `value_account`, `value_all`, `leaderboard`,
//!   `refresh_display_cache`
//! - [`leaderboard::rank`]: value-descending order, percentile and [`Tier`]
//! - [`ReconciliationChecker`]: per-field display-vs-canonical flags

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod reconciliation;
pub mod valuation;

pub use config::ValuationConfig;
pub use error::{ValuationError, ValuationResult};
pub use leaderboard::{percentile, rank, Leaderboard, LeaderboardEntry, Tier};
pub use reconciliation::{
    reconcile, AccountReconciliation, DiscrepancyFlags, Figures, ReconciliationChecker,
    ReconciliationReport, RECONCILIATION_TOLERANCE,
};
pub use valuation::{AccountValuation, HoldingValuation, ValuationService};

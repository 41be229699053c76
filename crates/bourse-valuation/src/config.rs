//! Valuation configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    /// Automated agents listed separately on the leaderboard.
    #[serde(default = "default_top_agents")]
    pub top_agents: usize,
    /// Display-cache refresh interval; 0 disables (seconds).
    #[serde(default = "default_display_refresh_interval_secs")]
    pub display_refresh_interval_secs: u64,
    /// Reconciliation audit interval; 0 disables (seconds).
    #[serde(default = "default_reconciliation_interval_secs")]
    pub reconciliation_interval_secs: u64,
}

fn default_top_agents() -> usize {
    5
}

fn default_display_refresh_interval_secs() -> u64 {
    300
}

fn default_reconciliation_interval_secs() -> u64 {
    900
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            top_agents: default_top_agents(),
            display_refresh_interval_secs: default_display_refresh_interval_secs(),
            reconciliation_interval_secs: default_reconciliation_interval_secs(),
        }
    }
}

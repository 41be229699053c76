//! Scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Round pacing, cooldown and background intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum time between two trades by one agent (seconds).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Delay inserted after each agent that reached the strategy engine (ms).
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
    /// Upper bound on one agent's decision and trade (ms).
    #[serde(default = "default_agent_timeout_ms")]
    pub agent_timeout_ms: u64,
    /// Internal round interval; 0 relies on the external trigger (seconds).
    #[serde(default)]
    pub round_interval_secs: u64,
    /// Instrument stored-price refresh interval; 0 disables (seconds).
    #[serde(default = "default_price_refresh_interval_secs")]
    pub price_refresh_interval_secs: u64,
}

fn default_cooldown_secs() -> u64 {
    3_600
}

fn default_pacing_delay_ms() -> u64 {
    2_000
}

fn default_agent_timeout_ms() -> u64 {
    30_000
}

fn default_price_refresh_interval_secs() -> u64 {
    300
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            pacing_delay_ms: default_pacing_delay_ms(),
            agent_timeout_ms: default_agent_timeout_ms(),
            round_interval_secs: 0,
            price_refresh_interval_secs: default_price_refresh_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}

//! Ranking by live portfolio value.

use bourse_core::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::valuation::AccountValuation;

/// Tier labels by rank, then by percentile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Champion,
    #[serde(rename = "Runner-up")]
    RunnerUp,
    #[serde(rename = "Third Place")]
    ThirdPlace,
    Elite,
    Advanced,
    Intermediate,
    Rookie,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Champion => "Champion",
            Self::RunnerUp => "Runner-up",
            Self::ThirdPlace => "Third Place",
            Self::Elite => "Elite",
            Self::Advanced => "Advanced",
            Self::Intermediate => "Intermediate",
            Self::Rookie => "Rookie",
        }
    }

    pub fn for_position(rank: usize, percentile: Decimal) -> Self {
        match rank {
            1 => Self::Champion,
            2 => Self::RunnerUp,
            3 => Self::ThirdPlace,
            _ if percentile >= Decimal::from(90) => Self::Elite,
            _ if percentile >= Decimal::from(75) => Self::Advanced,
            _ if percentile >= Decimal::from(50) => Self::Intermediate,
            _ => Self::Rookie,
        }
    }
}

/// One ranked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account_id: AccountId,
    pub display_name: String,
    pub is_agent: bool,
    pub portfolio_value: Decimal,
    pub all_time_gain_loss: Decimal,
    pub holdings_count: usize,
    /// `(total - rank + 1) / total * 100`, one decimal place.
    pub percentile: Decimal,
    pub tier: Tier,
}

/// `(total - rank + 1) / total * 100` rounded to one decimal place.
pub fn percentile(rank: usize, total: usize) -> Decimal {
    if total == 0 || rank == 0 || rank > total {
        return Decimal::ZERO;
    }
    let above = Decimal::from(total - rank + 1);
    (above / Decimal::from(total) * Decimal::ONE_HUNDRED).round_dp(1)
}

/// Sort by portfolio value descending, account id ascending on ties.
pub fn rank(valuations: &[AccountValuation]) -> Vec<LeaderboardEntry> {
    let mut sorted: Vec<&AccountValuation> = valuations.iter().collect();
    sorted.sort_by(|a, b| {
        b.portfolio_value
            .cmp(&a.portfolio_value)
            .then_with(|| a.account_id.cmp(&b.account_id))
    });

    let total = sorted.len();
    sorted
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            let rank = i + 1;
            let percentile = percentile(rank, total);
            LeaderboardEntry {
                rank,
                account_id: v.account_id.clone(),
                display_name: v.display_name.clone(),
                is_agent: v.is_agent,
                portfolio_value: v.portfolio_value,
                all_time_gain_loss: v.all_time_gain_loss,
                holdings_count: v.holdings.len(),
                percentile,
                tier: Tier::for_position(rank, percentile),
            }
        })
        .collect()
}

/// Leaderboard read model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    /// The requesting account's entry, if it is ranked.
    pub me: Option<LeaderboardEntry>,
    /// Best-ranked automated agents.
    pub top_agents: Vec<LeaderboardEntry>,
    pub generated_at: DateTime<Utc>,
}

impl Leaderboard {
    pub fn build(
        valuations: &[AccountValuation],
        me: Option<&AccountId>,
        top_agents: usize,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let entries = rank(valuations);
        let me = me.and_then(|id| entries.iter().find(|e| &e.account_id == id).cloned());
        let top_agents = entries
            .iter()
            .filter(|e| e.is_agent)
            .take(top_agents)
            .cloned()
            .collect();
        Self {
            entries,
            me,
            top_agents,
            generated_at,
        }
    }
}

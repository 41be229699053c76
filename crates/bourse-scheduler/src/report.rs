//! Round results.

use bourse_core::AccountId;
use bourse_executor::TradeReceipt;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What happened to one agent in one round.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// Traded too recently; the strategy engine was not consulted.
    Cooldown { until: DateTime<Utc> },
    /// The engine decided (or fell back) to hold.
    Held { reason: String },
    Executed { receipt: TradeReceipt, reason: String },
    /// Snapshot, decision or execution failed for this agent only.
    Failed { error: String },
}

impl AgentOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cooldown { .. } => "cooldown",
            Self::Held { .. } => "held",
            Self::Executed { .. } => "executed",
            Self::Failed { .. } => "failed",
        }
    }

    /// Human-readable detail for API responses.
    pub fn detail(&self) -> String {
        match self {
            Self::Cooldown { until } => format!("cooldown until {}", until.to_rfc3339()),
            Self::Held { reason } => reason.clone(),
            Self::Executed { receipt, .. } => format!(
                "{} {} of {} at {}",
                receipt.side, receipt.shares, receipt.instrument_id, receipt.price
            ),
            Self::Failed { error } => error.clone(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One agent's row in a round report.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResult {
    pub account_id: AccountId,
    pub persona_name: String,
    #[serde(flatten)]
    pub outcome: AgentOutcome,
}

/// Every agent's outcome for one round.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<AgentResult>,
}

impl RoundReport {
    pub fn count(&self, label: &str) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.label() == label)
            .count()
    }

    pub fn result_for(&self, account: &AccountId) -> Option<&AgentResult> {
        self.results.iter().find(|r| &r.account_id == account)
    }
}

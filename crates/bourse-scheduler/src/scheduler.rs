//! Trading rounds.
//!
//! # Round Flow (per agent, sequential)
//!
//! 1. Load the account; paused agents hold
//! 2. Cooldown gate; cooling agents hold without consulting the engine
//! 3. Snapshot → `StrategyEngine::decide` → `TradeExecutor::execute`
//! 4. Audit record, then the pacing delay before the next agent
//!
//! Steps 1–3 run under a per-agent timeout. Any error is captured as that
//! agent's `Failed` outcome; the round always reports every agent.

use std::sync::Arc;
use std::time::Instant;

use bourse_core::{AccountId, InstrumentTable, SharedClock};
use bourse_executor::TradeExecutor;
use bourse_ledger::LedgerStore;
use bourse_oracle::PriceOracle;
use bourse_persistence::{AuditSink, DecisionRecord};
use bourse_strategy::{Decision, DecisionOutcome, MarketSnapshot, Persona, StrategyEngine};
use bourse_telemetry::Metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::cooldown::{CooldownGate, CooldownStatus};
use crate::error::{SchedulerError, SchedulerResult};
use crate::report::{AgentOutcome, AgentResult, RoundReport};
use crate::snapshot::{build_snapshot, quote_instruments};

/// An automated account and the persona that drives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub account_id: AccountId,
    pub display_name: String,
    pub persona: Persona,
}

/// Everything one agent's turn produced, for the report and the audit log.
struct AgentTurn {
    outcome: AgentOutcome,
    snapshot: Option<MarketSnapshot>,
    decision: Option<DecisionOutcome>,
}

impl AgentTurn {
    fn bare(outcome: AgentOutcome) -> Self {
        Self {
            outcome,
            snapshot: None,
            decision: None,
        }
    }

    /// Pacing applies only when external services may have been called.
    fn consulted_engine(&self) -> bool {
        self.snapshot.is_some()
    }
}

/// Drives every agent through one decision per round.
pub struct TradingScheduler {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<PriceOracle>,
    executor: Arc<TradeExecutor>,
    engine: Arc<StrategyEngine>,
    instruments: Arc<InstrumentTable>,
    audit: Arc<dyn AuditSink>,
    clock: SharedClock,
    cooldown: CooldownGate,
    agents: Vec<AgentProfile>,
    config: SchedulerConfig,
    round_lock: AsyncMutex<()>,
}

impl TradingScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        oracle: Arc<PriceOracle>,
        executor: Arc<TradeExecutor>,
        engine: Arc<StrategyEngine>,
        instruments: Arc<InstrumentTable>,
        audit: Arc<dyn AuditSink>,
        clock: SharedClock,
        agents: Vec<AgentProfile>,
        config: SchedulerConfig,
    ) -> Self {
        let cooldown = CooldownGate::new(store.clone(), clock.clone(), config.cooldown_secs);
        Self {
            store,
            oracle,
            executor,
            engine,
            instruments,
            audit,
            clock,
            cooldown,
            agents,
            config,
            round_lock: AsyncMutex::new(()),
        }
    }

    pub fn agents(&self) -> &[AgentProfile] {
        &self.agents
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn is_round_running(&self) -> bool {
        self.round_lock.try_lock().is_err()
    }

    /// Run one round over every configured agent.
    ///
    /// Fails only with [`SchedulerError::RoundInProgress`] when another round
    /// holds the round lock; agent failures are reported, not returned.
    pub async fn run_round(&self) -> SchedulerResult<RoundReport> {
        let Ok(_round) = self.round_lock.try_lock() else {
            Metrics::round_skipped();
            warn!("Trading round already in progress, skipping trigger");
            return Err(SchedulerError::RoundInProgress);
        };

        let round_id = Uuid::new_v4().to_string();
        let started_at = self.clock.now();
        let timer = Instant::now();
        info!(round_id = %round_id, agents = self.agents.len(), "Trading round started");

        let mut results = Vec::with_capacity(self.agents.len());
        for (index, agent) in self.agents.iter().enumerate() {
            let turn = match tokio::time::timeout(self.config.agent_timeout(), self.agent_turn(agent)).await
            {
                Ok(turn) => turn,
                Err(_) => AgentTurn::bare(AgentOutcome::Failed {
                    error: format!("agent timed out after {}ms", self.config.agent_timeout_ms),
                }),
            };

            Metrics::agent_outcome(turn.outcome.label());
            self.write_audit(&round_id, agent, &turn);

            let pace = turn.consulted_engine() && index + 1 < self.agents.len();
            results.push(AgentResult {
                account_id: agent.account_id.clone(),
                persona_name: agent.persona.name.clone(),
                outcome: turn.outcome,
            });

            if pace && !self.config.pacing_delay().is_zero() {
                tokio::time::sleep(self.config.pacing_delay()).await;
            }
        }

        if let Err(e) = self.audit.flush() {
            warn!(round_id = %round_id, error = %e, "Failed to flush audit log");
        }

        let report = RoundReport {
            round_id,
            started_at,
            finished_at: self.clock.now(),
            results,
        };
        Metrics::round_completed(timer.elapsed());
        info!(
            round_id = %report.round_id,
            executed = report.count("executed"),
            held = report.count("held"),
            cooldown = report.count("cooldown"),
            failed = report.count("failed"),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "Trading round finished"
        );
        Ok(report)
    }

    async fn agent_turn(&self, agent: &AgentProfile) -> AgentTurn {
        let account = match self.store.get_account(&agent.account_id).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                return AgentTurn::bare(AgentOutcome::Failed {
                    error: SchedulerError::AccountNotFound(agent.account_id.to_string()).to_string(),
                })
            }
            Err(e) => return AgentTurn::bare(AgentOutcome::Failed { error: e.to_string() }),
        };
        if !account.is_active_agent() {
            return AgentTurn::bare(AgentOutcome::Held {
                reason: "agent paused".to_string(),
            });
        }

        match self.cooldown.check(&account.id, &agent.persona).await {
            Ok(CooldownStatus::Ready) => {}
            Ok(CooldownStatus::Cooling { until, .. }) => {
                debug!(agent = %agent.account_id, %until, "Agent cooling down");
                return AgentTurn::bare(AgentOutcome::Cooldown { until });
            }
            Err(e) => return AgentTurn::bare(AgentOutcome::Failed { error: e.to_string() }),
        }

        let quotes = quote_instruments(&self.oracle, &self.instruments).await;
        let snapshot = match build_snapshot(self.store.as_ref(), &account, quotes, &self.clock).await {
            Ok(snapshot) => snapshot,
            Err(e) => return AgentTurn::bare(AgentOutcome::Failed { error: e.to_string() }),
        };

        let decided = self.engine.decide(&agent.persona, &snapshot).await;
        let decision = &decided.decision;
        let outcome = match (decision.side(), decision.instrument_id(), decision.shares()) {
            (Some(side), Some(instrument_id), Some(shares)) => {
                match self.executor.execute(side, &account.id, instrument_id, shares).await {
                    Ok(receipt) => AgentOutcome::Executed {
                        receipt,
                        reason: decision.reason().to_string(),
                    },
                    Err(e) => AgentOutcome::Failed {
                        error: format!("{}: {e}", e.code()),
                    },
                }
            }
            _ => AgentOutcome::Held {
                reason: decision.reason().to_string(),
            },
        };

        AgentTurn {
            outcome,
            snapshot: Some(snapshot),
            decision: Some(decided),
        }
    }

    fn write_audit(&self, round_id: &str, agent: &AgentProfile, turn: &AgentTurn) {
        let record = decision_record(round_id, self.clock.now(), agent, turn);
        if let Err(e) = self.audit.record(record) {
            warn!(agent = %agent.account_id, error = %e, "Failed to write audit record");
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn decision_record(
    round_id: &str,
    at: DateTime<Utc>,
    agent: &AgentProfile,
    turn: &AgentTurn,
) -> DecisionRecord {
    let decision = match (&turn.decision, &turn.outcome) {
        (Some(decided), _) => to_json(&decided.decision),
        (None, AgentOutcome::Cooldown { .. }) => to_json(&Decision::hold("cooldown")),
        (None, outcome) => to_json(&Decision::hold(outcome.detail())),
    };
    let (execution, error) = match &turn.outcome {
        AgentOutcome::Executed { receipt, .. } => (Some(to_json(receipt)), None),
        AgentOutcome::Failed { error } => (None, Some(error.clone())),
        _ => (None, None),
    };

    DecisionRecord {
        round_id: round_id.to_string(),
        recorded_at: at,
        account_id: agent.account_id.clone(),
        persona_name: agent.persona.name.clone(),
        persona: to_json(&agent.persona),
        snapshot: turn.snapshot.as_ref().map(to_json),
        proposed: turn.decision.as_ref().map(|d| to_json(&d.proposed)),
        decision,
        raw_reasoning: turn.decision.as_ref().and_then(|d| d.raw_reasoning.clone()),
        fallback: turn.decision.as_ref().and_then(|d| d.fallback.clone()),
        outcome: turn.outcome.label().to_string(),
        execution,
        success: !turn.outcome.is_failure(),
        error,
    }
}

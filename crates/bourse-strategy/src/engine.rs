//! Policy plus narration.
//!
//! `decide` evaluates the persona, clamps the result to its budget and, for
//! non-`HOLD` decisions, asks the narrator for a rationale. The narrator
//! runs under a timeout. How a narration failure is treated depends on
//! [`NarrationMode`].

use std::sync::Arc;
use std::time::Duration;

use bourse_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::decision::Decision;
use crate::error::StrategyError;
use crate::narrator::{NarrationRequest, Narrator, Verdict};
use crate::persona::Persona;
use crate::policy;
use crate::snapshot::MarketSnapshot;

/// What to do with the narrator's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationMode {
    /// Never call the narrator.
    Disabled,
    /// Narration failure keeps the policy decision.
    Advisory,
    /// Narration failure turns the decision into `HOLD`.
    #[default]
    Required,
}

/// Strategy engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub narration: NarrationMode,
    #[serde(default = "default_reasoning_timeout_ms")]
    pub reasoning_timeout_ms: u64,
}

fn default_reasoning_timeout_ms() -> u64 {
    15_000
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            narration: NarrationMode::default(),
            reasoning_timeout_ms: default_reasoning_timeout_ms(),
        }
    }
}

/// Result of one decision cycle for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOutcome {
    /// Decision to act on.
    pub decision: Decision,
    /// Clamped policy decision before narration.
    pub proposed: Decision,
    /// Raw reasoner output, if any was received.
    pub raw_reasoning: Option<String>,
    /// Set when narration failed: "timeout", "error", "malformed".
    pub fallback: Option<String>,
}

/// Persona evaluation with optional narration.
pub struct StrategyEngine {
    config: StrategyConfig,
    narrator: Option<Arc<dyn Narrator>>,
}

impl StrategyEngine {
    /// Create a new engine. Without a narrator, narration is disabled.
    #[must_use]
    pub fn new(config: StrategyConfig, narrator: Option<Arc<dyn Narrator>>) -> Self {
        Self { config, narrator }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    fn effective_mode(&self) -> NarrationMode {
        if self.narrator.is_none() {
            NarrationMode::Disabled
        } else {
            self.config.narration
        }
    }

    /// Produce the decision for one agent.
    pub async fn decide(&self, persona: &Persona, snapshot: &MarketSnapshot) -> DecisionOutcome {
        if let Err(e) = persona.validate() {
            warn!(persona = %persona.name, error = %e, "Invalid persona, holding");
            let decision = Decision::hold(e.to_string());
            return DecisionOutcome {
                proposed: decision.clone(),
                decision,
                raw_reasoning: None,
                fallback: Some(e.fallback_reason().to_string()),
            };
        }

        let evaluated = policy::evaluate(persona, snapshot);
        let proposed = policy::clamp_to_budget(persona, snapshot, evaluated);

        let mode = self.effective_mode();
        let narrator = match (&self.narrator, mode) {
            (Some(narrator), NarrationMode::Advisory | NarrationMode::Required)
                if !proposed.is_hold() =>
            {
                narrator
            }
            _ => {
                return DecisionOutcome {
                    decision: proposed.clone(),
                    proposed,
                    raw_reasoning: None,
                    fallback: None,
                }
            }
        };

        let request = NarrationRequest {
            persona: persona.clone(),
            snapshot: snapshot.clone(),
            proposed: proposed.clone(),
        };
        let timeout = Duration::from_millis(self.config.reasoning_timeout_ms);
        let result = match tokio::time::timeout(timeout, narrator.narrate(&request)).await {
            Ok(result) => result,
            Err(_) => Err(StrategyError::Timeout(self.config.reasoning_timeout_ms)),
        };

        match result {
            Ok(narration) => {
                debug!(
                    persona = %persona.name,
                    narrator = narrator.name(),
                    verdict = ?narration.verdict,
                    "Narration received"
                );
                let decision = match narration.verdict {
                    Verdict::Proceed => proposed.clone().with_reason(narration.rationale),
                    Verdict::Hold => Decision::hold(narration.rationale),
                };
                DecisionOutcome {
                    decision,
                    proposed,
                    raw_reasoning: Some(narration.raw),
                    fallback: None,
                }
            }
            Err(e) => {
                let reason = e.fallback_reason();
                Metrics::reasoning_fallback(reason);
                warn!(
                    persona = %persona.name,
                    narrator = narrator.name(),
                    error = %e,
                    ?mode,
                    "Narration failed"
                );
                let decision = match mode {
                    NarrationMode::Advisory => proposed.clone(),
                    _ => Decision::hold(format!("reasoning unavailable ({reason}): {e}")),
                };
                DecisionOutcome {
                    decision,
                    proposed,
                    raw_reasoning: None,
                    fallback: Some(reason.to_string()),
                }
            }
        }
    }
}

//! Narration seam for the external reasoning service.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;
use crate::error::{StrategyError, StrategyResult};
use crate::persona::Persona;
use crate::snapshot::MarketSnapshot;

/// What the reasoner is asked to narrate.
#[derive(Debug, Clone, Serialize)]
pub struct NarrationRequest {
    pub persona: Persona,
    pub snapshot: MarketSnapshot,
    /// Already clamped; the reasoner cannot change it, only veto it.
    pub proposed: Decision,
}

/// Reasoner's verdict on a proposed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Proceed,
    Hold,
}

/// Validated reasoner output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub verdict: Verdict,
    pub rationale: String,
    /// Unparsed service output, kept for the audit log.
    pub raw: String,
}

/// Produces rationale text for a proposed decision.
#[async_trait]
pub trait Narrator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn narrate(&self, request: &NarrationRequest) -> StrategyResult<Narration>;
}

/// Scripted reply for [`ScriptedNarrator`].
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    Narrate(Narration),
    Fail(String),
    Malformed(String),
}

/// Narrator that replays queued replies; proceeds with a fixed rationale
/// once the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedNarrator {
    replies: Mutex<VecDeque<ScriptedReply>>,
    latency: Mutex<Option<Duration>>,
    calls: AtomicU64,
}

impl ScriptedNarrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies.lock().push_back(reply);
    }

    /// Queue a verdict with rationale.
    pub fn push_verdict(&self, verdict: Verdict, rationale: impl Into<String>) {
        let rationale = rationale.into();
        self.push(ScriptedReply::Narrate(Narration {
            verdict,
            raw: rationale.clone(),
            rationale,
        }));
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Narrator for ScriptedNarrator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn narrate(&self, request: &NarrationRequest) -> StrategyResult<Narration> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self.replies.lock().pop_front();
        match reply {
            Some(ScriptedReply::Narrate(narration)) => Ok(narration),
            Some(ScriptedReply::Fail(msg)) => Err(StrategyError::Reasoning(msg)),
            Some(ScriptedReply::Malformed(raw)) => Err(StrategyError::MalformedOutput(raw)),
            None => Ok(Narration {
                verdict: Verdict::Proceed,
                rationale: format!("{} agrees: {}", request.persona.name, request.proposed.reason()),
                raw: String::new(),
            }),
        }
    }
}

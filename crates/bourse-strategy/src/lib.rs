//! Agent decision making for bourse.
//!
//! Each agent is a typed [`Persona`] evaluated by the pure
//! [`policy::evaluate`] function against a [`MarketSnapshot`]. Sizing is
//! always computed and clamped locally; an external reasoning service may
//! only narrate a proposed trade or veto it to `HOLD`.
//!
//! # Key Components
//!
//! - [`Persona`]: strategy, risk band, budget band, eligibility, thresholds
//! - [`MarketSnapshot`]: cash, positions and live quotes for one agent
//! - [`Decision`]: `HOLD` / `BUY` / `SELL` with a rationale
//! - [`policy`]: `evaluate` and `clamp_to_budget`
//! - [`Narrator`]: reasoning seam; [`ReasoningClient`] and [`ScriptedNarrator`]
//! - [`StrategyEngine`]: policy + narration with timeouts and `HOLD` fallback

pub mod decision;
pub mod engine;
pub mod error;
pub mod narrator;
pub mod persona;
pub mod policy;
pub mod reasoning;
pub mod snapshot;

pub use decision::Decision;
pub use engine::{DecisionOutcome, NarrationMode, StrategyConfig, StrategyEngine};
pub use error::{StrategyError, StrategyResult};
pub use narrator::{Narration, NarrationRequest, Narrator, ScriptedNarrator, ScriptedReply, Verdict};
pub use persona::{BudgetBand, Eligibility, Persona, RiskBand, StrategyKind, MAX_COOLDOWN_SECS};
pub use reasoning::{ReasoningClient, ReasoningConfig};
pub use snapshot::{InstrumentQuote, MarketSnapshot, PositionView};

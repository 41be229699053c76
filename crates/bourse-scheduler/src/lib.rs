//! Trading scheduler for bourse.
//!
//! Runs agents through sequential, paced rounds: cooldown gate, market
//! snapshot, strategy decision, execution and an audit record per agent.
//!
//! # Key Components
//!
//! - [`TradingScheduler`]: `run_round`, one round at a time
//! - [`CooldownGate`]: cooldown derived from each agent's last transaction
//! - [`RoundReport`]: every agent's [`AgentOutcome`] for one round
//! - [`refresh_instrument_prices`]: stores fresh quotes as fallback prices

pub mod config;
pub mod cooldown;
pub mod error;
pub mod prices;
pub mod report;
pub mod scheduler;
pub mod snapshot;

pub use config::SchedulerConfig;
pub use cooldown::{CooldownGate, CooldownStatus};
pub use error::{SchedulerError, SchedulerResult};
pub use prices::{refresh_instrument_prices, RefreshSummary};
pub use report::{AgentOutcome, AgentResult, RoundReport};
pub use scheduler::{AgentProfile, TradingScheduler};
pub use snapshot::{build_snapshot, quote_instruments};

//! Per-agent trade cooldown.
//!
//! The cooldown is derived from the transaction log, not stored: an agent
//! is cooling down while `now - last_transaction.timestamp < window`.

use std::sync::Arc;

use bourse_core::{AccountId, SharedClock};
use bourse_ledger::LedgerStore;
use bourse_strategy::Persona;
use chrono::{DateTime, Duration, Utc};

use crate::error::SchedulerResult;

/// Result of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownStatus {
    Ready,
    Cooling {
        last_trade_at: DateTime<Utc>,
        until: DateTime<Utc>,
    },
}

impl CooldownStatus {
    pub fn is_cooling(&self) -> bool {
        matches!(self, Self::Cooling { .. })
    }
}

/// Checks cooldown windows against the ledger's last transaction.
pub struct CooldownGate {
    store: Arc<dyn LedgerStore>,
    clock: SharedClock,
    default_window: Duration,
}

impl CooldownGate {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: SharedClock, default_window_secs: u64) -> Self {
        Self {
            store,
            clock,
            default_window: secs(default_window_secs),
        }
    }

    /// Window for `persona`, honouring its override.
    pub fn window_for(&self, persona: &Persona) -> Duration {
        persona
            .cooldown_secs
            .map(secs)
            .unwrap_or(self.default_window)
    }

    pub async fn check(&self, account: &AccountId, persona: &Persona) -> SchedulerResult<CooldownStatus> {
        let Some(last) = self.store.last_transaction(account).await? else {
            return Ok(CooldownStatus::Ready);
        };

        let until = last
            .timestamp
            .checked_add_signed(self.window_for(persona))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        if self.clock.now() < until {
            Ok(CooldownStatus::Cooling {
                last_trade_at: last.timestamp,
                until,
            })
        } else {
            Ok(CooldownStatus::Ready)
        }
    }
}

/// Saturates at `Duration::MAX` for windows chrono cannot represent.
fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

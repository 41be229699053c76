//! Trade decisions.

use bourse_core::{InstrumentId, Shares, TradeSide};
use serde::{Deserialize, Serialize};

/// A single proposed action for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Decision {
    Hold {
        reason: String,
    },
    Buy {
        instrument_id: InstrumentId,
        shares: Shares,
        reason: String,
    },
    Sell {
        instrument_id: InstrumentId,
        shares: Shares,
        reason: String,
    },
}

impl Decision {
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::Hold {
            reason: reason.into(),
        }
    }

    pub fn buy(instrument_id: InstrumentId, shares: Shares, reason: impl Into<String>) -> Self {
        Self::Buy {
            instrument_id,
            shares,
            reason: reason.into(),
        }
    }

    pub fn sell(instrument_id: InstrumentId, shares: Shares, reason: impl Into<String>) -> Self {
        Self::Sell {
            instrument_id,
            shares,
            reason: reason.into(),
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Self::Hold { .. })
    }

    /// "HOLD", "BUY" or "SELL".
    pub fn label(&self) -> &'static str {
        match self {
            Self::Hold { .. } => "HOLD",
            Self::Buy { .. } => "BUY",
            Self::Sell { .. } => "SELL",
        }
    }

    pub fn side(&self) -> Option<TradeSide> {
        match self {
            Self::Hold { .. } => None,
            Self::Buy { .. } => Some(TradeSide::Buy),
            Self::Sell { .. } => Some(TradeSide::Sell),
        }
    }

    pub fn instrument_id(&self) -> Option<&InstrumentId> {
        match self {
            Self::Hold { .. } => None,
            Self::Buy { instrument_id, .. } | Self::Sell { instrument_id, .. } => {
                Some(instrument_id)
            }
        }
    }

    pub fn shares(&self) -> Option<Shares> {
        match self {
            Self::Hold { .. } => None,
            Self::Buy { shares, .. } | Self::Sell { shares, .. } => Some(*shares),
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Hold { reason } | Self::Buy { reason, .. } | Self::Sell { reason, .. } => reason,
        }
    }

    /// Same action with a different rationale.
    #[must_use]
    pub fn with_reason(mut self, new_reason: impl Into<String>) -> Self {
        match &mut self {
            Self::Hold { reason } | Self::Buy { reason, .. } | Self::Sell { reason, .. } => {
                *reason = new_reason.into();
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_serializes_with_action_tag() {
        let decision = Decision::buy(InstrumentId::new("acme"), Shares::new(dec!(2.5)), "trend");
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["action"], "BUY");
        assert_eq!(json["instrument_id"], "acme");

        let hold = Decision::hold("cooldown");
        assert_eq!(serde_json::to_value(&hold).unwrap()["action"], "HOLD");
    }

    #[test]
    fn test_with_reason_keeps_size() {
        let decision = Decision::sell(InstrumentId::new("acme"), Shares::ONE, "template")
            .with_reason("narrated");
        assert_eq!(decision.reason(), "narrated");
        assert_eq!(decision.shares(), Some(Shares::ONE));
        assert_eq!(decision.side(), Some(TradeSide::Sell));
    }
}

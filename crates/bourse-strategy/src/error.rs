//! Strategy error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid persona {persona}: {reason}")]
    InvalidPersona { persona: String, reason: String },

    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    #[error("Reasoning service timed out after {0}ms")]
    Timeout(u64),

    #[error("Malformed reasoning output: {0}")]
    MalformedOutput(String),
}

impl StrategyError {
    /// Label for fallback metrics.
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            Self::InvalidPersona { .. } => "invalid_persona",
            Self::Reasoning(_) => "error",
            Self::Timeout(_) => "timeout",
            Self::MalformedOutput(_) => "malformed",
        }
    }
}

pub type StrategyResult<T> = Result<T, StrategyError>;

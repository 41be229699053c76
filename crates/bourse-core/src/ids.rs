//! Identifiers for accounts, instruments and tickers.
//!
//! All identifiers are string-backed newtypes. Ordering is lexicographic,
//! which the leaderboard relies on for deterministic tie-breaks.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Parse a user-supplied identifier, rejecting blank input.
            pub fn parse(value: &str) -> Result<Self> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(CoreError::InvalidId(format!(
                        "{} must not be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Unique account identifier (human player or automated agent).
    AccountId
);

string_id!(
    /// Unique instrument identifier (startup/company profile).
    InstrumentId
);

string_id!(
    /// Market-data ticker symbol used by the price provider.
    Ticker
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_rejects_blank() {
        assert_eq!(AccountId::parse("  alice ").unwrap().as_str(), "alice");
        assert!(InstrumentId::parse("   ").is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut ids = vec![AccountId::new("b"), AccountId::new("a"), AccountId::new("c")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
        assert_eq!(ids[2].as_str(), "c");
    }

    #[test]
    fn test_serde_transparent() {
        let ticker = Ticker::new("ACME");
        assert_eq!(serde_json::to_string(&ticker).unwrap(), "\"ACME\"");
    }
}

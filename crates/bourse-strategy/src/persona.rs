//! Typed agent personas.

use bourse_core::Ticker;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StrategyError, StrategyResult};
use crate::snapshot::InstrumentQuote;

/// Longest accepted cooldown window (one year).
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// How an agent picks entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Buy the strongest riser.
    Momentum,
    /// Buy the steepest faller.
    Contrarian,
    /// Add to the least-allocated calm instrument.
    Balanced,
    /// Buy the calmest non-falling instrument.
    Conservative,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Momentum => "momentum",
            Self::Contrarian => "contrarian",
            Self::Balanced => "balanced",
            Self::Conservative => "conservative",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where inside the budget band an agent sizes its entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Position within the budget band: 0 (min), ½, 1 (max).
    pub fn weight(&self) -> Decimal {
        match self {
            Self::Low => Decimal::ZERO,
            Self::Medium => dec!(0.5),
            Self::High => Decimal::ONE,
        }
    }
}

/// Fraction of available cash one entry may spend, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetBand {
    pub min_pct: Decimal,
    pub max_pct: Decimal,
}

impl BudgetBand {
    /// Percent of cash for a given risk band.
    pub fn pct_for(&self, risk: RiskBand) -> Decimal {
        self.min_pct + (self.max_pct - self.min_pct) * risk.weight()
    }
}

/// Which instruments an agent may trade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    #[default]
    All,
    Tickers(Vec<Ticker>),
    Sectors(Vec<String>),
}

impl Eligibility {
    pub fn admits(&self, quote: &InstrumentQuote) -> bool {
        match self {
            Self::All => true,
            Self::Tickers(tickers) => tickers.contains(&quote.ticker),
            Self::Sectors(sectors) => quote
                .sector
                .as_ref()
                .is_some_and(|s| sectors.iter().any(|allowed| allowed.eq_ignore_ascii_case(s))),
        }
    }
}

/// A typed trading persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub strategy: StrategyKind,
    pub risk: RiskBand,
    pub budget: BudgetBand,
    #[serde(default)]
    pub eligible: Eligibility,
    /// Minimum absolute 24h move (percent) that triggers an entry.
    #[serde(default = "default_buy_threshold_pct")]
    pub buy_threshold_pct: Decimal,
    /// Unrealized gain (percent) at which half the position is sold.
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: Decimal,
    /// Unrealized loss (percent) at which the whole position is sold.
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: Decimal,
    /// No entries while cash is at or below this share of total value.
    #[serde(default = "default_min_cash_reserve_pct")]
    pub min_cash_reserve_pct: Decimal,
    /// Cap on one position's share of total value.
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: Decimal,
    /// Overrides the scheduler's cooldown window.
    #[serde(default)]
    pub cooldown_secs: Option<u64>,
}

fn default_buy_threshold_pct() -> Decimal {
    dec!(2)
}

fn default_take_profit_pct() -> Decimal {
    dec!(20)
}

fn default_stop_loss_pct() -> Decimal {
    dec!(10)
}

fn default_min_cash_reserve_pct() -> Decimal {
    dec!(10)
}

fn default_max_position_pct() -> Decimal {
    dec!(25)
}

impl Persona {
    /// Persona with default thresholds.
    pub fn new(
        name: impl Into<String>,
        strategy: StrategyKind,
        risk: RiskBand,
        budget: BudgetBand,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            risk,
            budget,
            eligible: Eligibility::All,
            buy_threshold_pct: default_buy_threshold_pct(),
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            min_cash_reserve_pct: default_min_cash_reserve_pct(),
            max_position_pct: default_max_position_pct(),
            cooldown_secs: None,
        }
    }

    /// Check band and threshold ranges.
    pub fn validate(&self) -> StrategyResult<()> {
        let invalid = |reason: &str| StrategyError::InvalidPersona {
            persona: self.name.clone(),
            reason: reason.to_string(),
        };
        let hundred = Decimal::ONE_HUNDRED;

        if self.budget.min_pct <= Decimal::ZERO {
            return Err(invalid("budget.min_pct must be positive"));
        }
        if self.budget.min_pct > self.budget.max_pct {
            return Err(invalid("budget.min_pct exceeds budget.max_pct"));
        }
        if self.budget.max_pct > hundred {
            return Err(invalid("budget.max_pct exceeds 100"));
        }
        if self.buy_threshold_pct.is_sign_negative()
            || self.take_profit_pct <= Decimal::ZERO
            || self.stop_loss_pct <= Decimal::ZERO
        {
            return Err(invalid("thresholds must be positive"));
        }
        if self.min_cash_reserve_pct.is_sign_negative() || self.min_cash_reserve_pct >= hundred {
            return Err(invalid("min_cash_reserve_pct must be in [0, 100)"));
        }
        if self.max_position_pct <= Decimal::ZERO || self.max_position_pct > hundred {
            return Err(invalid("max_position_pct must be in (0, 100]"));
        }
        if self.cooldown_secs.is_some_and(|secs| secs > MAX_COOLDOWN_SECS) {
            return Err(invalid("cooldown_secs exceeds one year"));
        }
        Ok(())
    }

    /// Entry budget as percent of cash.
    pub fn budget_pct(&self) -> Decimal {
        self.budget.pct_for(self.risk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(min: Decimal, max: Decimal) -> BudgetBand {
        BudgetBand {
            min_pct: min,
            max_pct: max,
        }
    }

    #[test]
    fn test_budget_pct_by_risk() {
        let mut persona = Persona::new("p", StrategyKind::Momentum, RiskBand::Low, band(dec!(2), dec!(10)));
        assert_eq!(persona.budget_pct(), dec!(2));
        persona.risk = RiskBand::Medium;
        assert_eq!(persona.budget_pct(), dec!(6));
        persona.risk = RiskBand::High;
        assert_eq!(persona.budget_pct(), dec!(10));
    }

    #[test]
    fn test_validate_rejects_bad_band() {
        let inverted = Persona::new("p", StrategyKind::Balanced, RiskBand::Low, band(dec!(10), dec!(5)));
        assert!(inverted.validate().is_err());

        let zero = Persona::new("p", StrategyKind::Balanced, RiskBand::Low, band(dec!(0), dec!(5)));
        assert!(zero.validate().is_err());

        let ok = Persona::new("p", StrategyKind::Balanced, RiskBand::Low, band(dec!(1), dec!(5)));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds_cooldown() {
        let mut p = Persona::new("p", StrategyKind::Balanced, RiskBand::Low, band(dec!(1), dec!(5)));
        p.cooldown_secs = Some(MAX_COOLDOWN_SECS);
        assert!(p.validate().is_ok());

        p.cooldown_secs = Some(100_000_000_000_000_000);
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_persona_from_toml() {
        let persona: Persona = toml::from_str(
            r#"
            name = "Momentum Mike"
            strategy = "momentum"
            risk = "high"
            budget = { min_pct = "5", max_pct = "15" }
            eligible = { tickers = ["ACME", "GBX"] }
            cooldown_secs = 1800
            "#,
        )
        .unwrap();

        assert_eq!(persona.strategy, StrategyKind::Momentum);
        assert_eq!(persona.budget_pct(), dec!(15));
        assert_eq!(persona.cooldown_secs, Some(1800));
        assert_eq!(persona.take_profit_pct, dec!(20));
        assert!(matches!(persona.eligible, Eligibility::Tickers(ref t) if t.len() == 2));
    }

    #[test]
    fn test_eligibility_all_by_default_in_toml() {
        let persona: Persona = toml::from_str(
            r#"
            name = "Steady Sue"
            strategy = "conservative"
            risk = "low"
            budget = { min_pct = "1", max_pct = "3" }
            "#,
        )
        .unwrap();
        assert_eq!(persona.eligible, Eligibility::All);
    }
}

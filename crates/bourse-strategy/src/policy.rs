//! Deterministic persona evaluation.
//!
//! # Evaluation Order (in `evaluate`)
//!
//! 1. Exits: stop-loss sells everything, take-profit sells half
//! 2. Cash reserve: no entries at or below `min_cash_reserve_pct`
//! 3. Candidate selection by strategy (ties by ticker)
//! 4. Sizing from the risk band's point in the budget band
//!
//! Both functions are pure: same persona and snapshot, same decision.

use std::cmp::Ordering;

use bourse_core::Shares;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::decision::Decision;
use crate::persona::{Persona, StrategyKind};
use crate::snapshot::{InstrumentQuote, MarketSnapshot};

fn pct_of(amount: Decimal, pct: Decimal) -> Decimal {
    amount * pct / Decimal::ONE_HUNDRED
}

/// Propose one decision for `persona` given `snapshot`.
pub fn evaluate(persona: &Persona, snapshot: &MarketSnapshot) -> Decision {
    if let Some(exit) = exit_decision(persona, snapshot) {
        return exit;
    }

    let cash_pct = snapshot.cash_pct();
    if cash_pct <= persona.min_cash_reserve_pct {
        return Decision::hold(format!(
            "cash {}% at or below reserve {}%",
            cash_pct.round_dp(2),
            persona.min_cash_reserve_pct
        ));
    }

    let Some(quote) = select_entry(persona, snapshot) else {
        return Decision::hold(format!(
            "no {} entry signal at threshold {}%",
            persona.strategy, persona.buy_threshold_pct
        ));
    };

    let mut budget = pct_of(snapshot.cash_available, persona.budget_pct());
    let room = pct_of(snapshot.total_value(), persona.max_position_pct)
        - snapshot.position_value(&quote.instrument_id);
    budget = budget.min(room).min(snapshot.cash_available);

    let shares = Shares::affordable(budget, quote.price);
    if !shares.is_positive() {
        return Decision::hold(format!("budget too small for {}", quote.ticker));
    }

    Decision::buy(
        quote.instrument_id.clone(),
        shares,
        entry_reason(persona, quote),
    )
}

fn exit_decision(persona: &Persona, snapshot: &MarketSnapshot) -> Option<Decision> {
    let mut best: Option<(Decimal, &InstrumentQuote, Decision)> = None;

    for position in &snapshot.positions {
        let Some(quote) = snapshot.quote(&position.instrument_id) else {
            continue;
        };
        if !persona.eligible.admits(quote) || !position.shares.is_positive() {
            continue;
        }
        let Some(pnl_pct) = snapshot.unrealized_pct(&position.instrument_id) else {
            continue;
        };

        let decision = if pnl_pct <= -persona.stop_loss_pct {
            Decision::sell(
                quote.instrument_id.clone(),
                position.shares,
                format!("stop-loss on {} at {}%", quote.ticker, pnl_pct.round_dp(2)),
            )
        } else if pnl_pct >= persona.take_profit_pct {
            let half = Shares::new(position.shares.inner() / dec!(2)).round_down();
            let shares = if half.is_positive() {
                half
            } else {
                position.shares
            };
            Decision::sell(
                quote.instrument_id.clone(),
                shares,
                format!("take-profit on {} at {}%", quote.ticker, pnl_pct.round_dp(2)),
            )
        } else {
            continue;
        };

        let magnitude = pnl_pct.abs();
        let replace = match &best {
            None => true,
            Some((best_mag, best_quote, _)) => match magnitude.cmp(best_mag) {
                Ordering::Greater => true,
                Ordering::Equal => quote.ticker < best_quote.ticker,
                Ordering::Less => false,
            },
        };
        if replace {
            best = Some((magnitude, quote, decision));
        }
    }

    best.map(|(_, _, decision)| decision)
}

fn select_entry<'a>(persona: &Persona, snapshot: &'a MarketSnapshot) -> Option<&'a InstrumentQuote> {
    let threshold = persona.buy_threshold_pct;
    let total = snapshot.total_value();
    let cap = pct_of(total, persona.max_position_pct);

    let candidates = snapshot.instruments.iter().filter(|q| {
        persona.eligible.admits(q)
            && q.price.is_positive()
            && snapshot.position_value(&q.instrument_id) < cap
    });
    let change = |q: &InstrumentQuote| q.change_24h_pct.unwrap_or(Decimal::ZERO);

    // Each arm yields (key, quote); the lowest key wins, ticker breaks ties.
    let keyed: Vec<(Decimal, &InstrumentQuote)> = match persona.strategy {
        StrategyKind::Momentum => candidates
            .filter(|q| change(q) >= threshold)
            .map(|q| (-change(q), q))
            .collect(),
        StrategyKind::Contrarian => candidates
            .filter(|q| change(q) <= -threshold)
            .map(|q| (change(q), q))
            .collect(),
        StrategyKind::Balanced => candidates
            .filter(|q| change(q).abs() <= threshold)
            .map(|q| (snapshot.position_value(&q.instrument_id), q))
            .collect(),
        StrategyKind::Conservative => candidates
            .filter(|q| change(q) >= Decimal::ZERO)
            .map(|q| (change(q), q))
            .collect(),
    };

    keyed
        .into_iter()
        .min_by(|(ka, qa), (kb, qb)| ka.cmp(kb).then_with(|| qa.ticker.cmp(&qb.ticker)))
        .map(|(_, q)| q)
}

fn entry_reason(persona: &Persona, quote: &InstrumentQuote) -> String {
    let change = quote
        .change_24h_pct
        .map(|c| format!("{}%", c.round_dp(2)))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "{} entry in {} (24h {}), {} risk sizing at {}% of cash",
        persona.strategy,
        quote.ticker,
        change,
        persona.risk.as_str(),
        persona.budget_pct().round_dp(2)
    )
}

/// Force a decision inside the persona's limits.
///
/// Buys are resized so their cost lies in `[min_pct, max_pct]` of cash,
/// never above cash and never past `max_position_pct` of total value. A buy
/// whose remaining position room is below the minimum becomes `HOLD`. Sells
/// are capped at the shares owned. Anything that
/// ends at zero shares, or refers to an unknown or ineligible instrument,
/// becomes `HOLD`.
pub fn clamp_to_budget(persona: &Persona, snapshot: &MarketSnapshot, decision: Decision) -> Decision {
    match decision {
        hold @ Decision::Hold { .. } => hold,
        Decision::Buy {
            instrument_id,
            shares,
            reason,
        } => {
            let Some(quote) = snapshot.quote(&instrument_id) else {
                return Decision::hold(format!("unknown instrument {instrument_id}"));
            };
            if !persona.eligible.admits(quote) {
                return Decision::hold(format!("{} not eligible for {}", quote.ticker, persona.name));
            }
            if !quote.price.is_positive() {
                return Decision::hold(format!("no usable price for {}", quote.ticker));
            }

            let cash = snapshot.cash_available;
            let min_cost = pct_of(cash, persona.budget.min_pct);
            let room = pct_of(snapshot.total_value(), persona.max_position_pct)
                - snapshot.position_value(&instrument_id);
            let max_cost = pct_of(cash, persona.budget.max_pct).min(cash).min(room);
            if max_cost < min_cost {
                return Decision::hold(format!("position cap reached for {}", quote.ticker));
            }
            let cost = shares.value_at(quote.price).clamp(min_cost, max_cost);

            let clamped = Shares::affordable(cost, quote.price);
            if !clamped.is_positive() {
                return Decision::hold(format!("budget too small for {}", quote.ticker));
            }
            Decision::buy(instrument_id, clamped, reason)
        }
        Decision::Sell {
            instrument_id,
            shares,
            reason,
        } => {
            let owned = snapshot
                .position(&instrument_id)
                .map(|p| p.shares)
                .unwrap_or(Shares::ZERO);
            let clamped = if shares > owned { owned } else { shares };
            if !clamped.is_positive() {
                return Decision::hold(format!("nothing to sell in {instrument_id}"));
            }
            Decision::sell(instrument_id, clamped, reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{BudgetBand, Eligibility, RiskBand};
    use crate::snapshot::PositionView;
    use bourse_core::{AccountId, InstrumentId, Price, Ticker};
    use chrono::Utc;

    fn quote(id: &str, price: Decimal, change: Decimal) -> InstrumentQuote {
        InstrumentQuote {
            instrument_id: InstrumentId::new(id),
            ticker: Ticker::new(id.to_uppercase()),
            name: id.to_string(),
            sector: Some(if id.starts_with('b') { "bio" } else { "tech" }.to_string()),
            price: Price::new(price),
            change_24h_pct: Some(change),
        }
    }

    fn snapshot(cash: Decimal, quotes: Vec<InstrumentQuote>) -> MarketSnapshot {
        MarketSnapshot {
            account_id: AccountId::new("bot"),
            cash_available: cash,
            instruments: quotes,
            positions: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    fn position(id: &str, shares: Decimal, avg: Decimal) -> PositionView {
        PositionView {
            instrument_id: InstrumentId::new(id),
            shares: Shares::new(shares),
            total_invested: shares * avg,
            avg_purchase_price: Price::new(avg),
        }
    }

    fn persona(strategy: StrategyKind, risk: RiskBand) -> Persona {
        Persona::new(
            "test",
            strategy,
            risk,
            BudgetBand {
                min_pct: dec!(2),
                max_pct: dec!(10),
            },
        )
    }

    fn market() -> Vec<InstrumentQuote> {
        vec![
            quote("acme", dec!(100), dec!(5)),
            quote("bio", dec!(50), dec!(-6)),
            quote("calm", dec!(20), dec!(0.5)),
            quote("drift", dec!(10), dec!(-1)),
        ]
    }

    #[test]
    fn test_momentum_buys_strongest_riser() {
        let decision = evaluate(
            &persona(StrategyKind::Momentum, RiskBand::High),
            &snapshot(dec!(100000), market()),
        );
        // 10% of 100000 = 10000 at 100 per share.
        assert_eq!(
            decision,
            Decision::buy(
                InstrumentId::new("acme"),
                Shares::new(dec!(100)),
                decision.reason().to_string()
            )
        );
    }

    #[test]
    fn test_contrarian_buys_steepest_faller() {
        let decision = evaluate(
            &persona(StrategyKind::Contrarian, RiskBand::Low),
            &snapshot(dec!(100000), market()),
        );
        // 2% of 100000 = 2000 at 50 per share.
        assert_eq!(decision.instrument_id(), Some(&InstrumentId::new("bio")));
        assert_eq!(decision.shares(), Some(Shares::new(dec!(40))));
    }

    #[test]
    fn test_balanced_and_conservative_selection() {
        let snap = snapshot(dec!(100000), market());
        let balanced = evaluate(&persona(StrategyKind::Balanced, RiskBand::Medium), &snap);
        // calm and drift both unallocated with |change| <= 2; tie broken by ticker.
        assert_eq!(balanced.instrument_id(), Some(&InstrumentId::new("calm")));

        let conservative = evaluate(&persona(StrategyKind::Conservative, RiskBand::Medium), &snap);
        assert_eq!(conservative.instrument_id(), Some(&InstrumentId::new("calm")));
        // 6% of 100000 = 6000 at 20 per share.
        assert_eq!(conservative.shares(), Some(Shares::new(dec!(300))));
    }

    #[test]
    fn test_eligibility_filters_candidates() {
        let mut p = persona(StrategyKind::Momentum, RiskBand::High);
        p.eligible = Eligibility::Sectors(vec!["bio".to_string()]);
        let decision = evaluate(&p, &snapshot(dec!(100000), market()));
        assert!(decision.is_hold());
    }

    #[test]
    fn test_stop_loss_sells_everything() {
        let mut snap = snapshot(dec!(1000), market());
        snap.positions.push(position("acme", dec!(10), dec!(125)));
        let decision = evaluate(&persona(StrategyKind::Momentum, RiskBand::High), &snap);
        assert_eq!(decision.label(), "SELL");
        assert_eq!(decision.shares(), Some(Shares::new(dec!(10))));
    }

    #[test]
    fn test_take_profit_sells_half() {
        let mut snap = snapshot(dec!(1000), market());
        snap.positions.push(position("calm", dec!(7), dec!(10)));
        let decision = evaluate(&persona(StrategyKind::Balanced, RiskBand::High), &snap);
        assert_eq!(decision.instrument_id(), Some(&InstrumentId::new("calm")));
        assert_eq!(decision.shares(), Some(Shares::new(dec!(3.5))));
    }

    #[test]
    fn test_cash_reserve_blocks_entries() {
        let mut snap = snapshot(dec!(50), market());
        snap.positions.push(position("drift", dec!(100), dec!(10)));
        let decision = evaluate(&persona(StrategyKind::Momentum, RiskBand::High), &snap);
        assert!(decision.is_hold());
        assert!(decision.reason().contains("reserve"));
    }

    #[test]
    fn test_fractional_shares_round_down() {
        let snap = snapshot(dec!(1000), vec![quote("acme", dec!(3), dec!(9))]);
        let decision = evaluate(&persona(StrategyKind::Momentum, RiskBand::High), &snap);
        // 100 / 3 = 33.3333...
        assert_eq!(decision.shares(), Some(Shares::new(dec!(33.3333))));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let snap = snapshot(dec!(100000), market());
        let p = persona(StrategyKind::Balanced, RiskBand::Medium);
        assert_eq!(evaluate(&p, &snap), evaluate(&p, &snap));
    }

    #[test]
    fn test_clamp_oversized_buy_to_max_band() {
        let snap = snapshot(dec!(100000), market());
        let p = persona(StrategyKind::Momentum, RiskBand::High);
        let huge = Decision::buy(InstrumentId::new("acme"), Shares::new(dec!(5000)), "hint");

        let clamped = clamp_to_budget(&p, &snap, huge);
        // max 10% of 100000 = 10000 -> 100 shares at 100.
        assert_eq!(clamped.shares(), Some(Shares::new(dec!(100))));
        assert_eq!(clamped.reason(), "hint");
    }

    #[test]
    fn test_clamp_tiny_buy_up_to_min_band() {
        let snap = snapshot(dec!(100000), market());
        let p = persona(StrategyKind::Momentum, RiskBand::High);
        let tiny = Decision::buy(InstrumentId::new("acme"), Shares::new(dec!(0.5)), "hint");

        let clamped = clamp_to_budget(&p, &snap, tiny);
        // min 2% of 100000 = 2000 -> 20 shares at 100.
        assert_eq!(clamped.shares(), Some(Shares::new(dec!(20))));
    }

    #[test]
    fn test_clamp_keeps_position_under_cap() {
        let mut p = persona(StrategyKind::Momentum, RiskBand::Low);
        p.budget = BudgetBand {
            min_pct: dec!(5),
            max_pct: dec!(10),
        };
        p.max_position_pct = dec!(10);
        let mut snap = snapshot(dec!(100000), market());
        snap.positions.push(position("acme", dec!(95), dec!(100)));
        let acme = InstrumentId::new("acme");
        let cap = pct_of(snap.total_value(), p.max_position_pct);

        let proposed = evaluate(&p, &snap);
        assert_eq!(proposed.instrument_id(), Some(&acme));
        let clamped = clamp_to_budget(&p, &snap, proposed);
        match clamped.shares() {
            Some(shares) => {
                let after = snap.position_value(&acme) + shares.value_at(Price::new(dec!(100)));
                assert!(after <= cap, "position {after} above cap {cap}");
            }
            None => assert!(clamped.is_hold()),
        }

        // 5% of cash is 5000 but only 1450 of room is left under the cap.
        let forced = clamp_to_budget(
            &p,
            &snap,
            Decision::buy(acme.clone(), Shares::new(dec!(50)), "hint"),
        );
        assert!(forced.is_hold());
        assert!(forced.reason().contains("position cap"));
    }

    #[test]
    fn test_clamp_sell_to_owned_and_unknown_to_hold() {
        let mut snap = snapshot(dec!(1000), market());
        snap.positions.push(position("acme", dec!(4), dec!(90)));
        let p = persona(StrategyKind::Momentum, RiskBand::High);

        let oversell = Decision::sell(InstrumentId::new("acme"), Shares::new(dec!(10)), "exit");
        assert_eq!(
            clamp_to_budget(&p, &snap, oversell).shares(),
            Some(Shares::new(dec!(4)))
        );

        let not_held = Decision::sell(InstrumentId::new("bio"), Shares::ONE, "exit");
        assert!(clamp_to_budget(&p, &snap, not_held).is_hold());

        let unknown = Decision::buy(InstrumentId::new("zzz"), Shares::ONE, "x");
        assert!(clamp_to_budget(&p, &snap, unknown).is_hold());
    }
}

//! Pure trade arithmetic.
//!
//! Turns (account, holding, shares, price) into the full set of record
//! changes for one trade. No I/O; the executor commits the result.

use bourse_core::{
    Account, AccountId, Holding, InstrumentId, Price, Shares, TradeSide, Transaction,
};
use bourse_ledger::{HoldingChange, InstrumentDelta, TradeCommit};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ExecutionError, ExecutionResult};

/// Outcome of an executed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeReceipt {
    pub transaction_id: Uuid,
    pub account_id: AccountId,
    pub instrument_id: InstrumentId,
    pub side: TradeSide,
    pub shares: Shares,
    pub price: Price,
    /// Cost for a buy, proceeds for a sell.
    pub total_amount: Decimal,
    pub new_balance: Decimal,
    /// Proceeds minus proportional cost basis (sells only).
    pub realized_gain_loss: Option<Decimal>,
    /// Position after the trade; `None` when fully sold.
    pub holding: Option<Holding>,
    pub executed_at: DateTime<Utc>,
}

/// Planned commit plus the receipt returned once it lands.
#[derive(Debug, Clone)]
pub struct TradePlan {
    pub commit: TradeCommit,
    pub receipt: TradeReceipt,
}

fn validate(shares: Shares, price: Price) -> ExecutionResult<Decimal> {
    if !shares.is_positive() {
        return Err(ExecutionError::Validation(format!(
            "shares must be positive, got {shares}"
        )));
    }
    if !price.is_positive() {
        return Err(ExecutionError::Validation(format!(
            "price must be positive, got {price}"
        )));
    }
    shares
        .inner()
        .checked_mul(price.inner())
        .ok_or_else(|| ExecutionError::Validation("trade amount overflows".to_string()))
}

/// Plan a buy of `shares` at `price`.
///
/// Fails with [`ExecutionError::InsufficientFunds`] if the cost exceeds cash.
pub fn plan_buy(
    account: &Account,
    existing: Option<&Holding>,
    instrument_id: &InstrumentId,
    shares: Shares,
    price: Price,
    transaction_id: Uuid,
    now: DateTime<Utc>,
) -> ExecutionResult<TradePlan> {
    let total_cost = validate(shares, price)?;
    if total_cost > account.cash_available {
        return Err(ExecutionError::InsufficientFunds {
            available: account.cash_available,
            required: total_cost,
        });
    }

    let (old_shares, old_invested) = existing
        .map(|h| (h.shares_owned, h.total_invested))
        .unwrap_or((Shares::ZERO, Decimal::ZERO));
    let new_shares = old_shares + shares;
    let new_invested = old_invested + total_cost;
    let avg_purchase_price = Holding::average_price(new_invested, new_shares).unwrap_or(price);

    let holding = Holding {
        account_id: account.id.clone(),
        instrument_id: instrument_id.clone(),
        shares_owned: new_shares,
        total_invested: new_invested,
        avg_purchase_price,
        current_value: new_shares.value_at(price),
        updated_at: now,
    };

    let balance_before = account.cash_available;
    let balance_after = balance_before - total_cost;

    let mut next = account.clone();
    next.cash_available = balance_after;
    next.total_invested += total_cost;

    let transaction = Transaction {
        id: transaction_id,
        account_id: account.id.clone(),
        instrument_id: instrument_id.clone(),
        side: TradeSide::Buy,
        shares,
        price_per_share: price,
        total_amount: total_cost,
        balance_before,
        balance_after,
        timestamp: now,
    };

    let receipt = TradeReceipt {
        transaction_id,
        account_id: account.id.clone(),
        instrument_id: instrument_id.clone(),
        side: TradeSide::Buy,
        shares,
        price,
        total_amount: total_cost,
        new_balance: balance_after,
        realized_gain_loss: None,
        holding: Some(holding.clone()),
        executed_at: now,
    };

    Ok(TradePlan {
        commit: TradeCommit {
            expected_version: account.version,
            account: next,
            holding: HoldingChange::Upsert(holding),
            transaction,
            instrument: InstrumentDelta {
                instrument_id: instrument_id.clone(),
                side: TradeSide::Buy,
                shares,
                opened_position: existing.is_none(),
                closed_position: false,
                price,
            },
        },
        receipt,
    })
}

/// Plan a sell of `shares` at `price`.
///
/// Cost basis is released proportionally to the fraction of the position
/// sold. Selling the whole position deletes the holding.
pub fn plan_sell(
    account: &Account,
    holding: Option<&Holding>,
    instrument_id: &InstrumentId,
    shares: Shares,
    price: Price,
    transaction_id: Uuid,
    now: DateTime<Utc>,
) -> ExecutionResult<TradePlan> {
    let proceeds = validate(shares, price)?;
    let holding = holding.ok_or_else(|| ExecutionError::NoHolding {
        account: account.id.clone(),
        instrument: instrument_id.clone(),
    })?;
    if shares > holding.shares_owned {
        return Err(ExecutionError::InsufficientShares {
            owned: holding.shares_owned,
            requested: shares,
        });
    }

    let remaining = holding.shares_owned - shares;
    let closes = remaining.is_zero();
    let cost_basis_sold = if closes {
        holding.total_invested
    } else {
        holding.cost_basis_for(shares).ok_or_else(|| {
            ExecutionError::Validation("cannot allocate cost basis".to_string())
        })?
    };

    let (change, remaining_holding) = if closes {
        (
            HoldingChange::Delete {
                account_id: account.id.clone(),
                instrument_id: instrument_id.clone(),
            },
            None,
        )
    } else {
        let new_invested = holding.total_invested - cost_basis_sold;
        let updated = Holding {
            shares_owned: remaining,
            total_invested: new_invested,
            avg_purchase_price: Holding::average_price(new_invested, remaining)
                .unwrap_or(holding.avg_purchase_price),
            current_value: remaining.value_at(price),
            updated_at: now,
            ..holding.clone()
        };
        (HoldingChange::Upsert(updated.clone()), Some(updated))
    };

    let balance_before = account.cash_available;
    let balance_after = balance_before + proceeds;

    let mut next = account.clone();
    next.cash_available = balance_after;
    next.total_invested = (account.total_invested - cost_basis_sold).max(Decimal::ZERO);

    let transaction = Transaction {
        id: transaction_id,
        account_id: account.id.clone(),
        instrument_id: instrument_id.clone(),
        side: TradeSide::Sell,
        shares,
        price_per_share: price,
        total_amount: proceeds,
        balance_before,
        balance_after,
        timestamp: now,
    };

    let receipt = TradeReceipt {
        transaction_id,
        account_id: account.id.clone(),
        instrument_id: instrument_id.clone(),
        side: TradeSide::Sell,
        shares,
        price,
        total_amount: proceeds,
        new_balance: balance_after,
        realized_gain_loss: Some(proceeds - cost_basis_sold),
        holding: remaining_holding,
        executed_at: now,
    };

    Ok(TradePlan {
        commit: TradeCommit {
            expected_version: account.version,
            account: next,
            holding: change,
            transaction,
            instrument: InstrumentDelta {
                instrument_id: instrument_id.clone(),
                side: TradeSide::Sell,
                shares,
                opened_position: false,
                closed_position: closes,
                price,
            },
        },
        receipt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::AccountKind;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap()
    }

    fn account(cash: Decimal) -> Account {
        Account::new(AccountId::new("alice"), "Alice", AccountKind::Human, cash, now())
    }

    fn acme() -> InstrumentId {
        InstrumentId::new("acme")
    }

    fn holding(shares: Decimal, invested: Decimal) -> Holding {
        Holding {
            account_id: AccountId::new("alice"),
            instrument_id: acme(),
            shares_owned: Shares::new(shares),
            total_invested: invested,
            avg_purchase_price: Price::new(invested / shares),
            current_value: invested,
            updated_at: now(),
        }
    }

    #[test]
    fn test_first_buy_opens_position() {
        let plan = plan_buy(
            &account(dec!(1000000)),
            None,
            &acme(),
            Shares::new(dec!(100)),
            Price::new(dec!(100)),
            Uuid::nil(),
            now(),
        )
        .unwrap();

        assert_eq!(plan.commit.account.cash_available, dec!(990000));
        assert_eq!(plan.commit.account.total_invested, dec!(10000));
        assert!(plan.commit.instrument.opened_position);
        let HoldingChange::Upsert(h) = &plan.commit.holding else {
            panic!("expected upsert");
        };
        assert_eq!(h.avg_purchase_price, Price::new(dec!(100)));
        assert_eq!(plan.commit.transaction.balance_before, dec!(1000000));
        assert_eq!(plan.commit.transaction.balance_after, dec!(990000));
    }

    #[test]
    fn test_averaging_up() {
        let plan = plan_buy(
            &account(dec!(10000)),
            Some(&holding(dec!(10), dec!(1000))),
            &acme(),
            Shares::new(dec!(10)),
            Price::new(dec!(200)),
            Uuid::nil(),
            now(),
        )
        .unwrap();

        let HoldingChange::Upsert(h) = &plan.commit.holding else {
            panic!("expected upsert");
        };
        assert_eq!(h.shares_owned, Shares::new(dec!(20)));
        assert_eq!(h.total_invested, dec!(3000));
        assert_eq!(h.avg_purchase_price, Price::new(dec!(150)));
        assert_eq!(h.current_value, dec!(4000));
        assert!(!plan.commit.instrument.opened_position);
    }

    #[test]
    fn test_buy_beyond_cash_rejected() {
        let result = plan_buy(
            &account(dec!(500)),
            None,
            &acme(),
            Shares::new(dec!(6)),
            Price::new(dec!(100)),
            Uuid::nil(),
            now(),
        );
        match result {
            Err(ExecutionError::InsufficientFunds {
                available,
                required,
            }) => {
                assert_eq!(available, dec!(500));
                assert_eq!(required, dec!(600));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_zero_or_negative_shares_rejected() {
        for shares in [dec!(0), dec!(-1)] {
            assert!(matches!(
                plan_buy(
                    &account(dec!(500)),
                    None,
                    &acme(),
                    Shares::new(shares),
                    Price::new(dec!(1)),
                    Uuid::nil(),
                    now(),
                ),
                Err(ExecutionError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_partial_sell_releases_proportional_basis() {
        let mut acct = account(dec!(990000));
        acct.total_invested = dec!(10000);
        let plan = plan_sell(
            &acct,
            Some(&holding(dec!(100), dec!(10000))),
            &acme(),
            Shares::new(dec!(40)),
            Price::new(dec!(150)),
            Uuid::nil(),
            now(),
        )
        .unwrap();

        assert_eq!(plan.receipt.total_amount, dec!(6000));
        assert_eq!(plan.receipt.new_balance, dec!(996000));
        assert_eq!(plan.receipt.realized_gain_loss, Some(dec!(2000)));
        assert_eq!(plan.commit.account.total_invested, dec!(6000));

        let remaining = plan.receipt.holding.unwrap();
        assert_eq!(remaining.shares_owned, Shares::new(dec!(60)));
        assert_eq!(remaining.total_invested, dec!(6000));
        assert_eq!(remaining.avg_purchase_price, Price::new(dec!(100)));
    }

    #[test]
    fn test_full_sell_deletes_holding() {
        let mut acct = account(dec!(0));
        acct.total_invested = dec!(300);
        let plan = plan_sell(
            &acct,
            Some(&holding(dec!(3), dec!(300))),
            &acme(),
            Shares::new(dec!(3)),
            Price::new(dec!(90)),
            Uuid::nil(),
            now(),
        )
        .unwrap();

        assert!(matches!(plan.commit.holding, HoldingChange::Delete { .. }));
        assert!(plan.commit.instrument.closed_position);
        assert_eq!(plan.commit.account.total_invested, dec!(0));
        assert_eq!(plan.receipt.realized_gain_loss, Some(dec!(-30)));
        assert!(plan.receipt.holding.is_none());
    }

    #[test]
    fn test_oversized_sell_and_missing_holding() {
        let acct = account(dec!(0));
        assert!(matches!(
            plan_sell(
                &acct,
                Some(&holding(dec!(3), dec!(300))),
                &acme(),
                Shares::new(dec!(4)),
                Price::new(dec!(90)),
                Uuid::nil(),
                now(),
            ),
            Err(ExecutionError::InsufficientShares { .. })
        ));
        assert!(matches!(
            plan_sell(
                &acct,
                None,
                &acme(),
                Shares::new(dec!(1)),
                Price::new(dec!(90)),
                Uuid::nil(),
                now(),
            ),
            Err(ExecutionError::NoHolding { .. })
        ));
    }
}

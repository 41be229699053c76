//! Request and response bodies.
//!
//! All JSON field names are camelCase.

use bourse_core::{AccountId, InstrumentId, Price, Shares};
use bourse_executor::TradeReceipt;
use bourse_scheduler::{AgentResult, RoundReport};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /api/trade/buy` and `POST /api/trade/sell`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub instrument_id: String,
    pub shares: Decimal,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyResponse {
    pub transaction_id: Uuid,
    pub instrument_id: InstrumentId,
    pub shares: Shares,
    pub price: Price,
    pub total_cost: Decimal,
    pub new_balance: Decimal,
}

impl From<TradeReceipt> for BuyResponse {
    fn from(receipt: TradeReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id,
            instrument_id: receipt.instrument_id,
            shares: receipt.shares,
            price: receipt.price,
            total_cost: receipt.total_amount,
            new_balance: receipt.new_balance,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellResponse {
    pub transaction_id: Uuid,
    pub instrument_id: InstrumentId,
    pub shares: Shares,
    pub price: Price,
    pub proceeds: Decimal,
    pub new_balance: Decimal,
    pub realized_gain_loss: Decimal,
    /// Shares still held after the sale.
    pub remaining_shares: Shares,
}

impl From<TradeReceipt> for SellResponse {
    fn from(receipt: TradeReceipt) -> Self {
        Self {
            transaction_id: receipt.transaction_id,
            instrument_id: receipt.instrument_id,
            shares: receipt.shares,
            price: receipt.price,
            proceeds: receipt.total_amount,
            new_balance: receipt.new_balance,
            realized_gain_loss: receipt.realized_gain_loss.unwrap_or(Decimal::ZERO),
            remaining_shares: receipt
                .holding
                .map_or(Shares::ZERO, |h| h.shares_owned),
        }
    }
}

/// One agent's row in a round response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResultView {
    pub account_id: AccountId,
    pub persona_name: String,
    pub outcome: &'static str,
    pub detail: String,
}

impl From<&AgentResult> for RoundResultView {
    fn from(result: &AgentResult) -> Self {
        Self {
            account_id: result.account_id.clone(),
            persona_name: result.persona_name.clone(),
            outcome: result.outcome.label(),
            detail: result.outcome.detail(),
        }
    }
}

/// Body returned by `POST /api/cron/trading-round`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResponse {
    pub round_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub executed: usize,
    pub held: usize,
    pub cooldown: usize,
    pub failed: usize,
    pub results: Vec<RoundResultView>,
}

impl From<&RoundReport> for RoundResponse {
    fn from(report: &RoundReport) -> Self {
        Self {
            round_id: report.round_id.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            executed: report.count("executed"),
            held: report.count("held"),
            cooldown: report.count("cooldown"),
            failed: report.count("failed"),
            results: report.results.iter().map(RoundResultView::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{Holding, TradeSide};
    use rust_decimal_macros::dec;

    fn receipt(side: TradeSide, holding: Option<Holding>) -> TradeReceipt {
        TradeReceipt {
            transaction_id: Uuid::new_v4(),
            account_id: AccountId::new("alice"),
            instrument_id: InstrumentId::new("acme"),
            side,
            shares: Shares::new(dec!(40)),
            price: Price::new(dec!(150)),
            total_amount: dec!(6000),
            new_balance: dec!(996000),
            realized_gain_loss: Some(dec!(2000)),
            holding,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_trade_request_camel_case() {
        let req: TradeRequest =
            serde_json::from_str(r#"{"instrumentId":"acme","shares":"2.5"}"#).unwrap();
        assert_eq!(req.instrument_id, "acme");
        assert_eq!(req.shares, dec!(2.5));

        let numeric: TradeRequest =
            serde_json::from_str(r#"{"instrumentId":"acme","shares":3}"#).unwrap();
        assert_eq!(numeric.shares, dec!(3));
    }

    #[test]
    fn test_sell_response_fields() {
        let json = serde_json::to_value(SellResponse::from(receipt(TradeSide::Sell, None))).unwrap();
        assert_eq!(json["proceeds"], "6000");
        assert_eq!(json["realizedGainLoss"], "2000");
        assert_eq!(json["newBalance"], "996000");
        assert_eq!(json["remainingShares"], "0");
    }
}

//! API error type and its JSON rendering.
//!
//! Every error body has the shape `{"error": code, "message": text}` plus
//! any structured detail the error carries (e.g. `available`/`required` for
//! insufficient funds).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bourse_executor::ExecutionError;
use bourse_ledger::LedgerError;
use bourse_scheduler::SchedulerError;
use bourse_valuation::ValuationError;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Execution(e) => match e {
                ExecutionError::Validation(_)
                | ExecutionError::InsufficientFunds { .. }
                | ExecutionError::InsufficientShares { .. } => StatusCode::BAD_REQUEST,
                ExecutionError::AccountNotFound(_)
                | ExecutionError::InstrumentNotFound(_)
                | ExecutionError::NoHolding { .. } => StatusCode::NOT_FOUND,
                ExecutionError::PriceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                ExecutionError::Contention(_) => StatusCode::CONFLICT,
                ExecutionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Valuation(e) => match e {
                ValuationError::AccountNotFound(_) | ValuationError::UnknownInstrument(_) => {
                    StatusCode::NOT_FOUND
                }
                ValuationError::PriceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                ValuationError::Ledger(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Scheduler(SchedulerError::RoundInProgress) => StatusCode::CONFLICT,
            Self::Scheduler(_) | Self::Ledger(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Error name exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Unauthorized => "AuthError",
            Self::Execution(e) => match e {
                ExecutionError::Validation(_) => "ValidationError",
                ExecutionError::AccountNotFound(_)
                | ExecutionError::InstrumentNotFound(_)
                | ExecutionError::NoHolding { .. } => "NotFoundError",
                ExecutionError::InsufficientFunds { .. } => "InsufficientFunds",
                ExecutionError::InsufficientShares { .. } => "InsufficientShares",
                ExecutionError::PriceUnavailable(_) => "ProviderError",
                ExecutionError::Contention(_) => "ConflictError",
                ExecutionError::Persistence(_) => "PersistenceError",
            },
            Self::Valuation(e) => match e {
                ValuationError::AccountNotFound(_) | ValuationError::UnknownInstrument(_) => {
                    "NotFoundError"
                }
                ValuationError::PriceUnavailable { .. } => "ProviderError",
                ValuationError::Ledger(_) => "PersistenceError",
            },
            Self::Scheduler(SchedulerError::RoundInProgress) => "RoundInProgress",
            Self::Scheduler(_) => "SchedulerError",
            Self::Ledger(_) => "PersistenceError",
            Self::Internal(_) => "InternalError",
        }
    }

    fn detail(&self) -> Map<String, Value> {
        let mut detail = Map::new();
        match self {
            Self::Execution(ExecutionError::InsufficientFunds {
                available,
                required,
            }) => {
                detail.insert("available".into(), json!(available));
                detail.insert("required".into(), json!(required));
            }
            Self::Execution(ExecutionError::InsufficientShares { owned, requested }) => {
                detail.insert("owned".into(), json!(owned));
                detail.insert("requested".into(), json!(requested));
            }
            _ => {}
        }
        detail
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Request failed");
        } else {
            warn!(code = self.code(), error = %self, "Request rejected");
        }

        let mut body = self.detail();
        body.insert("error".into(), Value::from(self.code()));
        body.insert("message".into(), Value::from(self.to_string()));
        (status, Json(Value::Object(body))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bourse_core::{AccountId, InstrumentId, Shares};
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_mapping() {
        let funds = ApiError::from(ExecutionError::InsufficientFunds {
            available: dec!(10),
            required: dec!(20),
        });
        assert_eq!(funds.status(), StatusCode::BAD_REQUEST);
        assert_eq!(funds.code(), "InsufficientFunds");

        let holding = ApiError::from(ExecutionError::NoHolding {
            account: AccountId::new("a"),
            instrument: InstrumentId::new("acme"),
        });
        assert_eq!(holding.status(), StatusCode::NOT_FOUND);

        let busy = ApiError::from(SchedulerError::RoundInProgress);
        assert_eq!(busy.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_detail_fields() {
        let err = ApiError::from(ExecutionError::InsufficientShares {
            owned: Shares::new(dec!(5)),
            requested: Shares::new(dec!(8)),
        });
        let detail = err.detail();
        assert_eq!(detail["owned"], json!("5"));
        assert_eq!(detail["requested"], json!("8"));
    }
}

//! HTTP server implementation using axum.

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use bourse_core::{InstrumentId, Shares, TradeSide};
use bourse_telemetry::metrics;
use bourse_valuation::{Leaderboard, ReconciliationReport};
use tower_http::cors::CorsLayer;
use tracing::{debug, info};

use crate::auth::{bearer_token, Session};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::types::{BuyResponse, RoundResponse, SellResponse, TradeRequest};

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .route("/api/trade/buy", post(buy))
        .route("/api/trade/sell", post(sell))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/reconciliation", get(reconciliation))
        .route("/api/cron/trading-round", post(trading_round))
        .with_state(state)
}

// ============================================================================
// Authentication helpers
// ============================================================================

async fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Session> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    state
        .sessions
        .verify(token)
        .await
        .ok_or(ApiError::Unauthorized)
}

/// No header means anonymous; a header with an unknown token is rejected.
async fn optional_session(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<Session>> {
    if headers.get(header::AUTHORIZATION).is_none() {
        return Ok(None);
    }
    require_session(state, headers).await.map(Some)
}

fn require_cron(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if state.cron.verify(headers) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

// ============================================================================
// Trades
// ============================================================================

fn parse_trade(payload: Result<Json<TradeRequest>, JsonRejection>) -> ApiResult<(InstrumentId, Shares)> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let instrument = InstrumentId::parse(&request.instrument_id)
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok((instrument, Shares::new(request.shares)))
}

async fn trade(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<TradeRequest>, JsonRejection>,
    side: TradeSide,
) -> ApiResult<bourse_executor::TradeReceipt> {
    let session = require_session(state, headers).await?;
    let (instrument, shares) = parse_trade(payload)?;
    let account = state.ensure_account(&session).await?;
    debug!(account = %account.id, instrument = %instrument, %side, shares = %shares, "Trade request");
    Ok(state
        .executor
        .execute(side, &account.id, &instrument, shares)
        .await?)
}

async fn buy(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<Json<BuyResponse>> {
    let receipt = trade(&state, &headers, payload, TradeSide::Buy).await?;
    Ok(Json(receipt.into()))
}

async fn sell(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<Json<SellResponse>> {
    let receipt = trade(&state, &headers, payload, TradeSide::Sell).await?;
    Ok(Json(receipt.into()))
}

// ============================================================================
// Read models
// ============================================================================

async fn leaderboard(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Leaderboard>> {
    let me = match optional_session(&state, &headers).await? {
        Some(session) => Some(state.ensure_account(&session).await?.id),
        None => None,
    };
    let board = state
        .valuation
        .leaderboard(me.as_ref(), state.top_agents)
        .await?;
    Ok(Json(board))
}

async fn reconciliation(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ReconciliationReport>> {
    require_cron(&state, &headers)?;
    let report = state.reconciliation.check_all(state.clock.now()).await?;
    Ok(Json(report))
}

// ============================================================================
// Scheduler trigger
// ============================================================================

async fn trading_round(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<RoundResponse>> {
    require_cron(&state, &headers)?;
    let report = state.scheduler.run_round().await?;
    Ok(Json(RoundResponse::from(&report)))
}

// ============================================================================
// Operational
// ============================================================================

async fn health() -> &'static str {
    "ok"
}

async fn prometheus_metrics() -> ApiResult<Response> {
    let body = metrics::gather_text().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

/// Run the API server until `shutdown` resolves.
pub async fn run_server<F>(state: AppState, config: ApiConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut app = create_router(state);
    if config.cors_permissive {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}

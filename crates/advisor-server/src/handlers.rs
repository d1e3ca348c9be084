//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agent_core::{AgentError, ToolCall, ToolResult, ToolSchema};
use decision_engine::{
    AdvisorRequest, AdvisorVerdict, EmotionAnalysis, EmotionSignals, EngineError, EvAnalysis,
    MarketContext, SessionSummary, Side, TradeSetup,
};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub data_source: String,
    pub data_source_healthy: bool,
    pub tools: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, code: &str, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: code.into(),
        }),
    )
}

fn engine_error(err: &EngineError) -> ApiError {
    match err {
        EngineError::UnsupportedSymbol(_) => {
            api_error(StatusCode::NOT_FOUND, "UNSUPPORTED_SYMBOL", err)
        }
        EngineError::DataSource(_) => api_error(StatusCode::BAD_GATEWAY, "DATA_SOURCE", err),
        EngineError::Pattern(_) | EngineError::Serialization(_) => {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", err)
        }
        EngineError::InvalidPrice { .. }
        | EngineError::ZeroStopDistance
        | EngineError::InvalidInput(_) => api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", err),
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Behavioural context accepted next to a message
#[derive(Debug, Default, Deserialize)]
pub struct SignalFields {
    pub change_24h: Option<f64>,
    pub last_trade_pnl: Option<f64>,
    pub last_trade_pnl_pct: Option<f64>,
    pub minutes_since_last_trade: Option<i64>,
}

impl SignalFields {
    fn to_signals(&self, fallback_change: Option<f64>) -> Result<EmotionSignals, ApiError> {
        let mut signals = EmotionSignals::default();

        if let Some(change) = self.change_24h.or(fallback_change) {
            signals = signals.with_market_move(change);
        }
        if let Some(pnl) = self.last_trade_pnl.or(self.last_trade_pnl_pct) {
            signals = signals.with_last_trade(pnl, self.last_trade_pnl_pct);
        }
        if let Some(minutes) = self.minutes_since_last_trade.filter(|m| *m >= 0) {
            let elapsed = chrono::Duration::try_minutes(minutes).ok_or_else(|| {
                api_error(
                    StatusCode::BAD_REQUEST,
                    "INVALID_INPUT",
                    format!("minutes_since_last_trade is out of range: {minutes}"),
                )
            })?;
            signals = signals.with_time_since_last_trade(elapsed);
        }

        Ok(signals)
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketRequest {
    pub symbol: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub symbol: String,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Inferred from the target when omitted
    #[serde(default)]
    pub side: Option<Side>,
    #[serde(default = "default_true")]
    pub use_market_context: bool,
}

const fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub analysis: EvAnalysis,
    pub context: Option<MarketContext>,
}

#[derive(Debug, Deserialize)]
pub struct EmotionRequest {
    pub message: String,
    #[serde(flatten)]
    pub signals: SignalFields,
}

#[derive(Debug, Serialize)]
pub struct EmotionResponse {
    pub analysis: EmotionAnalysis,
    pub report: String,
}

#[derive(Debug, Deserialize)]
pub struct AdvisorApiRequest {
    pub message: String,
    /// Omit to start a new session
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(flatten)]
    pub signals: SignalFields,
}

#[derive(Debug, Serialize)]
pub struct AdvisorResponse {
    pub session_id: Uuid,
    pub verdict: AdvisorVerdict,
    pub response: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        data_source: state.source.name().to_string(),
        data_source_healthy: state.source.health_check().await,
        tools: state.tools.len(),
    })
}

pub async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSchema>> {
    Json(state.tools.schemas())
}

pub async fn call_tool(
    State(state): State<AppState>,
    Json(call): Json<ToolCall>,
) -> ApiResult<ToolResult> {
    state.tools.execute(&call).await.map(Json).map_err(|e| {
        tracing::warn!(tool = %call.name, error = %e, "tool call failed");
        let status = match &e {
            AgentError::ToolNotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        api_error(status, "TOOL_ERROR", e.user_message())
    })
}

pub async fn analyze_market(
    State(state): State<AppState>,
    Json(payload): Json<MarketRequest>,
) -> ApiResult<MarketContext> {
    let limit = payload.limit.unwrap_or(state.candle_limit);
    let candles = state
        .source
        .fetch_candles(&payload.symbol, limit)
        .await
        .map_err(|e| engine_error(&e))?;

    Ok(Json(state.advisor.analyzer().analyze(&candles)))
}

pub async fn evaluate_trade(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> ApiResult<EvaluateResponse> {
    let side = payload.side.unwrap_or(if payload.take_profit > payload.entry_price {
        Side::Long
    } else {
        Side::Short
    });

    let setup = TradeSetup::new(
        payload.symbol.as_str(),
        side,
        payload.entry_price,
        payload.stop_loss,
        payload.take_profit,
    )
    .map_err(|e| engine_error(&e))?;

    let context = if payload.use_market_context {
        market_context(&state, &setup.symbol).await
    } else {
        None
    };

    let analysis = state.advisor.calculator().analyze(&setup, context.as_ref());
    Ok(Json(EvaluateResponse { analysis, context }))
}

pub async fn analyze_emotion(
    State(state): State<AppState>,
    Json(payload): Json<EmotionRequest>,
) -> ApiResult<EmotionResponse> {
    let signals = payload.signals.to_signals(None)?;
    let analysis = state.advisor.filter().analyze_request(&payload.message, &signals);

    Ok(Json(EmotionResponse {
        report: analysis.report(),
        analysis,
    }))
}

pub async fn session_summary(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<SessionSummary> {
    let sessions = state.sessions.lock().await;
    sessions
        .get(&session_id, Utc::now())
        .map(|tracker| Json(tracker.session_summary()))
        .ok_or_else(|| {
            let message = format!("no session {session_id}");
            api_error(StatusCode::NOT_FOUND, "SESSION_NOT_FOUND", message)
        })
}

/// Full pipeline: emotion gate, market context, expected value, sizing
pub async fn advisor_handler(
    State(state): State<AppState>,
    Json(payload): Json<AdvisorApiRequest>,
) -> ApiResult<AdvisorResponse> {
    let mut request = AdvisorRequest::new(payload.message.as_str());
    let mut fallback_change = None;

    if let Some(symbol) = payload.symbol.as_deref() {
        request = request.with_symbol(symbol);

        match state.source.fetch_candles(symbol, state.candle_limit).await {
            Ok(candles) => request = request.with_candles(candles),
            Err(e) => tracing::warn!(%symbol, error = %e, "advising without market data"),
        }
        if payload.signals.change_24h.is_none() {
            fallback_change = state.source.market_move(symbol).await.ok().map(|m| m.change_24h);
        }
    }
    request = request.with_signals(payload.signals.to_signals(fallback_change)?);

    let session_id = payload.session_id.unwrap_or_else(Uuid::new_v4);
    let (verdict, live_sessions) = {
        let mut sessions = state.sessions.lock().await;
        let verdict = state.advisor.process(sessions.touch(session_id, Utc::now()), &request);
        (verdict, sessions.len())
    };

    tracing::info!(
        %session_id,
        verdict = verdict.kind(),
        live_sessions,
        "advisor request handled"
    );

    Ok(Json(AdvisorResponse {
        session_id,
        response: verdict.render(),
        verdict,
    }))
}

/// Context for a symbol; unavailable data degrades to none
async fn market_context(state: &AppState, symbol: &str) -> Option<MarketContext> {
    match state.source.fetch_candles(symbol, state.candle_limit).await {
        Ok(candles) => Some(state.advisor.analyzer().analyze(&candles)),
        Err(e) => {
            tracing::warn!(%symbol, error = %e, "evaluating without market context");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_fields() {
        let fields = SignalFields {
            change_24h: None,
            last_trade_pnl: None,
            last_trade_pnl_pct: Some(-4.0),
            minutes_since_last_trade: Some(30),
        };
        let signals = fields.to_signals(Some(7.5)).unwrap();

        assert_eq!(signals.recent_market_move.map(|m| m.change_24h), Some(7.5));
        assert_eq!(signals.last_trade.map(|t| t.pnl), Some(-4.0));
        assert_eq!(signals.time_since_last_trade, Some(chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_out_of_range_minutes_are_rejected() {
        let fields = SignalFields {
            minutes_since_last_trade: Some(i64::MAX),
            ..SignalFields::default()
        };

        let (status, Json(body)) = fields.to_signals(None).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "INVALID_INPUT");
    }

    #[test]
    fn test_engine_error_status() {
        let (status, Json(body)) = engine_error(&EngineError::UnsupportedSymbol("XYZ".into()));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "UNSUPPORTED_SYMBOL");

        let (status, _) = engine_error(&EngineError::ZeroStopDistance);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

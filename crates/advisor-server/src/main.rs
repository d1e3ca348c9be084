//! advisor-server
//!
//! Axum HTTP/JSON server exposing the rational trade decision engine:
//! market analysis, trade evaluation, emotion checks, the full advisor
//! pipeline and the agent tool registry.

mod config;
mod handlers;
mod sessions;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decision_engine::{CandleSource, MockCandleSource};

use crate::config::ServerConfig;
use crate::handlers::{
    advisor_handler, analyze_emotion, analyze_market, call_tool, evaluate_trade, health_check,
    list_tools, session_summary,
};
use crate::state::AppState;

fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & tools
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/tools/call", post(call_tool))
        // Engine
        .route("/api/market/analyze", post(analyze_market))
        .route("/api/trade/evaluate", post(evaluate_trade))
        .route("/api/emotion/analyze", post(analyze_emotion))
        // Advisor sessions
        .route("/api/advisor", post(advisor_handler))
        .route("/api/sessions/{id}/summary", get(session_summary))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    let source: Arc<dyn CandleSource> = Arc::new(MockCandleSource::new());
    if !source.health_check().await {
        tracing::warn!("⚠ market data source {} is not healthy", source.name());
    }

    let state = AppState::new(&config, source)?;

    tracing::info!("Registered {} tools:", state.tools.len());
    for name in state.tools.names() {
        tracing::info!("  • {}", name);
    }
    tracing::info!(
        capital = %config.capital,
        risk_per_trade = %config.risk_per_trade,
        "position sizing configured"
    );
    tracing::info!(
        ttl_minutes = config.session_ttl_minutes,
        max_sessions = config.max_sessions,
        "advisor sessions bounded"
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 advisor-server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  GET  /api/tools                 - List tool schemas");
    tracing::info!("  POST /api/tools/call            - Call a tool");
    tracing::info!("  POST /api/market/analyze        - Market context for a symbol");
    tracing::info!("  POST /api/trade/evaluate        - Expected-value verdict");
    tracing::info!("  POST /api/emotion/analyze       - Emotion check");
    tracing::info!("  POST /api/advisor               - Full advisor pipeline");
    tracing::info!("  GET  /api/sessions/{{id}}/summary - Session emotion summary");

    axum::serve(listener, app(state)).await?;

    Ok(())
}

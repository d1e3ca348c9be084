//! Application State

use std::sync::Arc;

use tokio::sync::Mutex;

use agent_core::ToolRegistry;
use decision_engine::{CandleSource, PositionSizer, RationalAdvisor, svckit};

use crate::config::ServerConfig;
use crate::sessions::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub advisor: Arc<RationalAdvisor>,

    /// Market data for analysis and 24h moves
    pub source: Arc<dyn CandleSource>,

    /// Tool registry with all decision-engine tools
    pub tools: Arc<ToolRegistry>,

    /// One emotion tracker per session; a single writer at a time
    pub sessions: Arc<Mutex<SessionStore>>,

    pub candle_limit: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig, source: Arc<dyn CandleSource>) -> anyhow::Result<Self> {
        let sizer = PositionSizer::new(config.capital, config.risk_per_trade)?;

        Ok(Self {
            advisor: Arc::new(RationalAdvisor::new(sizer)?),
            tools: Arc::new(svckit::registry(Arc::clone(&source))?),
            source,
            sessions: Arc::new(Mutex::new(SessionStore::new(
                config.session_ttl()?,
                config.max_sessions,
            ))),
            candle_limit: config.candle_limit,
        })
    }
}

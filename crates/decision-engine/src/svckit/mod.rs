//! Service Kit - Agent Tools
//!
//! Decision-engine capabilities exposed as `agent_core::Tool`s, so an LLM
//! agent or an HTTP client can call them by name with JSON arguments.

mod emotion_check;
mod market_analyzer;
mod position_sizer;
mod trade_evaluator;

pub use emotion_check::EmotionCheckTool;
pub use market_analyzer::{DEFAULT_CANDLE_LIMIT, MarketAnalyzerTool};
pub use position_sizer::PositionSizerTool;
pub use trade_evaluator::TradeEvaluatorTool;

use std::sync::Arc;

use agent_core::ToolRegistry;

use crate::error::Result;
use crate::exchange::CandleSource;

/// Registry with every decision-engine tool, reading markets from `source`
pub fn registry(source: Arc<dyn CandleSource>) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(MarketAnalyzerTool::new(Arc::clone(&source)));
    registry.register(TradeEvaluatorTool::new(Some(source)));
    registry.register(EmotionCheckTool::new()?);
    registry.register(PositionSizerTool);
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockCandleSource;
    use agent_core::ToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_registry_dispatch() {
        let registry = registry(Arc::new(MockCandleSource::new())).unwrap();
        assert_eq!(
            registry.names(),
            vec!["emotion_check", "market_analyzer", "position_sizer", "trade_evaluator"]
        );

        let mut call = ToolCall::new("emotion_check")
            .with_arg("message", json!("지금 안 사면 놓칠 것 같아 급등 중"));
        call.id = Some("call-1".to_string());
        let result = registry.execute(&call).await.unwrap();
        assert_eq!(result.id.as_deref(), Some("call-1"));
        assert_eq!(result.data.unwrap()["detected_emotions"], json!(["fomo"]));
    }

    #[tokio::test]
    async fn test_schema_validation_runs_first() {
        let registry = registry(Arc::new(MockCandleSource::new())).unwrap();
        let missing = ToolCall::new("trade_evaluator").with_arg("symbol", json!("BTC"));
        assert!(registry.execute(&missing).await.is_err());

        let prompt = registry.generate_prompt_section();
        assert!(prompt.contains("### position_sizer"));
    }
}

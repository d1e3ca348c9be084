//! Market Analyzer Tool
//!
//! Fetches candles for a symbol and labels the market: regime, trend,
//! momentum, support/resistance and a suggested strategy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use crate::engine::MarketAnalyzer;
use crate::exchange::CandleSource;

/// Candles requested when the caller gives no limit
pub const DEFAULT_CANDLE_LIMIT: usize = 200;

pub struct MarketAnalyzerTool {
    source: Arc<dyn CandleSource>,
    analyzer: MarketAnalyzer,
}

impl MarketAnalyzerTool {
    pub fn new(source: Arc<dyn CandleSource>) -> Self {
        Self {
            source,
            analyzer: MarketAnalyzer::new(),
        }
    }
}

#[async_trait]
impl Tool for MarketAnalyzerTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "market_analyzer".into(),
            description: "Analyze the current market for a symbol: regime, trend, RSI, MACD, \
                          support/resistance, volatility and a suggested strategy."
                .into(),
            parameters: vec![
                ParameterSchema::required(
                    "symbol",
                    "string",
                    "Symbol to analyze (e.g., 'BTC', 'KRW-ETH')",
                ),
                ParameterSchema::optional(
                    "limit",
                    "number",
                    "Number of hourly candles to analyze (50-1000)",
                    json!(DEFAULT_CANDLE_LIMIT),
                ),
            ],
            category: Some("analysis".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let symbol = call.str_arg("symbol").unwrap_or("BTC").trim();
        let limit = call
            .f64_arg("limit")
            .map_or(DEFAULT_CANDLE_LIMIT, |n| n.clamp(50.0, 1000.0) as usize);

        let candles = self.source.fetch_candles(symbol, limit).await?;
        let context = self.analyzer.analyze(&candles);

        tracing::debug!(
            source = self.source.name(),
            %symbol,
            candles = candles.len(),
            regime = context.regime.label(),
            "market analyzed"
        );

        let mut output = format!("Market analysis: {symbol}\n");
        output.push_str(&"═".repeat(40));
        output.push('\n');
        output.push_str(&context.brief());
        if !context.reasoning.is_empty() {
            output.push_str("\n\nReasoning:\n");
            for line in &context.reasoning {
                output.push_str(&format!("  {line}\n"));
            }
        }

        let data = serde_json::to_value(&context)?;
        Ok(ToolResult::success("market_analyzer", output.trim_end()).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockCandleSource;

    fn tool() -> MarketAnalyzerTool {
        let source = MockCandleSource::new().with_drift(0.4).with_volatility(0.3);
        MarketAnalyzerTool::new(Arc::new(source))
    }

    #[tokio::test]
    async fn test_analyzes_mock_market() {
        let call = ToolCall::new("market_analyzer").with_arg("symbol", json!("BTC"));
        let result = tool().execute(&call).await.unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Market analysis: BTC"));
        assert!(result.output.contains("Regime:"));

        let data = result.data.unwrap();
        assert_eq!(data["trend_direction"], "up");
        assert!(data["current_price"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_a_validation_error() {
        let call = ToolCall::new("market_analyzer").with_arg("symbol", json!("NOTREAL"));
        let err = tool().execute(&call).await.unwrap_err();
        assert!(err.is_client_error());
    }
}

//! Trade Evaluator Tool
//!
//! Expected-value verdict for an entry/stop/target setup, optionally scored
//! against live market context.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use agent_core::{ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema};

use super::market_analyzer::DEFAULT_CANDLE_LIMIT;
use crate::engine::{ExpectedValueCalculator, MarketAnalyzer};
use crate::exchange::CandleSource;
use crate::model::{MarketContext, Side, TradeSetup};

pub struct TradeEvaluatorTool {
    /// Without a source every evaluation uses neutral context
    source: Option<Arc<dyn CandleSource>>,
    analyzer: MarketAnalyzer,
    calculator: ExpectedValueCalculator,
}

impl TradeEvaluatorTool {
    pub fn new(source: Option<Arc<dyn CandleSource>>) -> Self {
        Self {
            source,
            analyzer: MarketAnalyzer::new(),
            calculator: ExpectedValueCalculator::new(),
        }
    }

    /// Context for the symbol; a failed fetch degrades to none
    async fn live_context(&self, symbol: &str) -> Option<MarketContext> {
        let source = self.source.as_ref()?;
        match source.fetch_candles(symbol, DEFAULT_CANDLE_LIMIT).await {
            Ok(candles) => Some(self.analyzer.analyze(&candles)),
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "no market context, evaluating without it");
                None
            }
        }
    }
}

#[async_trait]
impl Tool for TradeEvaluatorTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "trade_evaluator".into(),
            description: "Evaluate a trade setup: expected value, win probability, risk/reward, \
                          Kelly fraction and an enter/skip/wait verdict."
                .into(),
            parameters: vec![
                ParameterSchema::required("symbol", "string", "Symbol being traded (e.g., 'BTC')"),
                ParameterSchema::required("entry_price", "number", "Planned entry price"),
                ParameterSchema::required("stop_loss", "number", "Stop-loss price"),
                ParameterSchema::required("take_profit", "number", "Target price"),
                ParameterSchema {
                    required: false,
                    ..ParameterSchema::required(
                        "side",
                        "string",
                        "Trade direction; inferred from the target when omitted",
                    )
                }
                .with_enum(vec![json!("long"), json!("short")]),
                ParameterSchema::optional(
                    "use_market_context",
                    "boolean",
                    "Score the setup against current market conditions",
                    json!(true),
                ),
            ],
            category: Some("analysis".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let symbol = call.str_arg("symbol").unwrap_or("UNKNOWN").trim();
        let entry = call.require_f64("entry_price")?;
        let stop = call.require_f64("stop_loss")?;
        let target = call.require_f64("take_profit")?;

        let side = match call.str_arg("side") {
            Some(side) => side.parse::<Side>()?,
            None if target > entry => Side::Long,
            None => Side::Short,
        };

        let setup = TradeSetup::new(symbol, side, entry, stop, target)?;

        let context = if call.bool_arg("use_market_context").unwrap_or(true) {
            self.live_context(symbol).await
        } else {
            None
        };

        let analysis = self.calculator.analyze(&setup, context.as_ref());

        let mut output = analysis.summary();
        if context.is_none() {
            output.push_str("(no market context: neutral assumptions used)");
        }

        let data = json!({
            "analysis": analysis,
            "context": context,
        });

        Ok(ToolResult::success("trade_evaluator", output.trim_end()).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockCandleSource;

    fn call(entry: f64, stop: f64, target: f64) -> ToolCall {
        ToolCall::new("trade_evaluator")
            .with_arg("symbol", json!("BTC"))
            .with_arg("entry_price", json!(entry))
            .with_arg("stop_loss", json!(stop))
            .with_arg("take_profit", json!(target))
    }

    #[tokio::test]
    async fn test_evaluates_without_source() {
        let tool = TradeEvaluatorTool::new(None);
        let result = tool
            .execute(&call(100_000_000.0, 97_000_000.0, 109_000_000.0))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("neutral assumptions"));

        let data = result.data.unwrap();
        assert_eq!(data["analysis"]["side"], "long");
        assert_eq!(data["analysis"]["recommendation"], "enter");
        assert!(data["context"].is_null());
    }

    #[tokio::test]
    async fn test_uses_live_context() {
        let tool = TradeEvaluatorTool::new(Some(Arc::new(MockCandleSource::new())));
        let result = tool.execute(&call(97_500.0, 99_000.0, 94_000.0)).await.unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["analysis"]["side"], "short");
        assert!(data["context"]["regime"].is_string());
    }

    #[tokio::test]
    async fn test_unsupported_symbol_falls_back_to_neutral() {
        let tool = TradeEvaluatorTool::new(Some(Arc::new(MockCandleSource::new())));
        let call = call(100.0, 95.0, 115.0).with_arg("symbol", json!("NOTREAL"));
        let result = tool.execute(&call).await.unwrap();
        assert!(result.data.unwrap()["context"].is_null());
    }

    #[tokio::test]
    async fn test_rejects_invalid_prices() {
        let tool = TradeEvaluatorTool::new(None);
        assert!(tool.execute(&call(0.0, 95.0, 110.0)).await.is_err());
        let bad_side = call(100.0, 95.0, 110.0).with_arg("side", json!("up"));
        assert!(tool.execute(&bad_side).await.is_err());
    }
}

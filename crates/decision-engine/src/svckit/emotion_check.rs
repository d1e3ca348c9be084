//! Emotion Check Tool
//!
//! Screens a trade request for FOMO, panic, revenge trading and the other
//! emotional biases before any analysis runs.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::json;

use agent_core::{
    AgentError, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::engine::{EmotionFilter, EmotionSignals};
use crate::error::Result;

pub struct EmotionCheckTool {
    filter: EmotionFilter,
}

impl EmotionCheckTool {
    pub fn new() -> Result<Self> {
        Ok(Self {
            filter: EmotionFilter::new()?,
        })
    }

    fn signals(call: &ToolCall) -> CoreResult<EmotionSignals> {
        let mut signals = EmotionSignals::default();

        if let Some(change) = call.f64_arg("change_24h") {
            signals = signals.with_market_move(change);
        }

        let pnl_pct = call.f64_arg("last_trade_pnl_pct");
        if let Some(pnl) = call.f64_arg("last_trade_pnl").or(pnl_pct) {
            signals = signals.with_last_trade(pnl, pnl_pct);
        }

        if let Some(minutes) = call.f64_arg("minutes_since_last_trade").filter(|m| *m >= 0.0) {
            let elapsed = Duration::try_minutes(minutes as i64).ok_or_else(|| {
                AgentError::ToolValidation(format!(
                    "minutes_since_last_trade is out of range: {minutes}"
                ))
            })?;
            signals = signals.with_time_since_last_trade(elapsed);
        }

        Ok(signals)
    }
}

#[async_trait]
impl Tool for EmotionCheckTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "emotion_check".into(),
            description: "Check a trade request for emotional bias (FOMO, fear, revenge, \
                          overconfidence, greed, sunk cost). Blocked requests must not be traded."
                .into(),
            parameters: vec![
                ParameterSchema::required("message", "string", "The user's request, verbatim"),
                ParameterSchema::optional(
                    "change_24h",
                    "number",
                    "Market move over 24h, %",
                    json!(0.0),
                ),
                ParameterSchema::optional(
                    "last_trade_pnl",
                    "number",
                    "P&L of the previous trade",
                    json!(0.0),
                ),
                ParameterSchema::optional(
                    "last_trade_pnl_pct",
                    "number",
                    "P&L of the previous trade, %",
                    json!(0.0),
                ),
                ParameterSchema {
                    required: false,
                    ..ParameterSchema::required(
                        "minutes_since_last_trade",
                        "number",
                        "Minutes since the previous trade closed",
                    )
                },
            ],
            category: Some("psychology".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let message = call.str_arg("message").unwrap_or_default();
        let analysis = self.filter.analyze_request(message, &Self::signals(call)?);

        let data = serde_json::to_value(&analysis)?;
        Ok(ToolResult::success("emotion_check", analysis.report()).with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rational_message() {
        let tool = EmotionCheckTool::new().unwrap();
        let call = ToolCall::new("emotion_check")
            .with_arg("message", json!("BTC 진입 100000 손절 97000 목표 109000"));
        let result = tool.execute(&call).await.unwrap();

        assert!(result.output.contains("looks rational"));
        let data = result.data.unwrap();
        assert_eq!(data["is_rational"], true);
        assert_eq!(data["should_block"], false);
    }

    #[tokio::test]
    async fn test_revenge_signals_are_applied() {
        let tool = EmotionCheckTool::new().unwrap();
        let call = ToolCall::new("emotion_check")
            .with_arg("message", json!("아까 손절했는데 다시 들어가서 원금 회복해야해"))
            .with_arg("last_trade_pnl", json!(-50_000))
            .with_arg("last_trade_pnl_pct", json!(-5.0))
            .with_arg("minutes_since_last_trade", json!(60));
        let result = tool.execute(&call).await.unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["detected_emotions"], json!(["revenge"]));
        assert!(result.output.contains("lost 5.0%"));
    }

    #[test]
    fn test_signal_parsing() {
        let call = ToolCall::new("emotion_check")
            .with_arg("change_24h", json!("12.5"))
            .with_arg("last_trade_pnl_pct", json!(-3.0));
        let signals = EmotionCheckTool::signals(&call).unwrap();

        assert_eq!(signals.recent_market_move.map(|m| m.change_24h), Some(12.5));
        let trade = signals.last_trade.unwrap();
        assert_eq!(trade.pnl, -3.0);
        assert_eq!(trade.pnl_pct, Some(-3.0));
        assert!(signals.time_since_last_trade.is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_minutes_are_rejected() {
        let tool = EmotionCheckTool::new().unwrap();
        let call = ToolCall::new("emotion_check")
            .with_arg("message", json!("sell now?"))
            .with_arg("minutes_since_last_trade", json!(1e17));

        let err = tool.execute(&call).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolValidation(_)));
    }
}

//! Position Sizer Tool
//!
//! Risk-based position sizing: how much to buy so that hitting the stop
//! costs a fixed share of capital.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use agent_core::{
    AgentError, ParameterSchema, Result as CoreResult, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::model::Side;
use crate::sizing::{
    ATR_STOP_MULTIPLIER, Conviction, DEFAULT_MAX_POSITION_PCT, DEFAULT_RISK_PER_TRADE,
    PositionPlan, PositionSizer, to_decimal, to_f64,
};

pub struct PositionSizerTool;

impl PositionSizerTool {
    fn decimal_arg(call: &ToolCall, key: &'static str) -> CoreResult<Option<Decimal>> {
        call.f64_arg(key)
            .map(|v| to_decimal(key, v))
            .transpose()
            .map_err(AgentError::from)
    }

    fn plan(sizer: &PositionSizer, call: &ToolCall) -> CoreResult<PositionPlan> {
        let entry = to_decimal("entry_price", call.require_f64("entry_price")?)?;
        let target = Self::decimal_arg(call, "target_price")?;

        let plan = match (Self::decimal_arg(call, "stop_loss")?, Self::decimal_arg(call, "atr")?) {
            (Some(stop), _) => match call.str_arg("conviction") {
                Some(conviction) if target.is_none() => {
                    sizer.size_by_conviction(entry, stop, conviction.parse::<Conviction>()?)?
                }
                _ => sizer.calculate_position(entry, stop, target)?,
            },
            (None, Some(atr)) => {
                let side = call.str_arg("side").unwrap_or("long").parse::<Side>()?;
                let target_rr = Self::decimal_arg(call, "target_rr")?.unwrap_or(Decimal::TWO);
                sizer.calculate_from_atr(entry, atr, ATR_STOP_MULTIPLIER, side, target_rr)?
            }
            (None, None) => {
                return Err(AgentError::ToolValidation(
                    "either 'stop_loss' or 'atr' is required".into(),
                ));
            }
        };

        Ok(plan)
    }
}

#[async_trait]
impl Tool for PositionSizerTool {
    fn schema(&self) -> ToolSchema {
        let optional = |name: &str, kind: &str, description: &str| ParameterSchema {
            required: false,
            ..ParameterSchema::required(name, kind, description)
        };

        ToolSchema {
            name: "position_sizer".into(),
            description: "Size a position so that a stop-out loses a fixed share of capital. \
                          Accepts an explicit stop or an ATR-based one."
                .into(),
            parameters: vec![
                ParameterSchema::required("capital", "number", "Total trading capital"),
                ParameterSchema::required("entry_price", "number", "Planned entry price"),
                optional("stop_loss", "number", "Stop-loss price"),
                optional("target_price", "number", "Target price, for the risk/reward ratio"),
                optional("atr", "number", "ATR, used to place the stop when none is given"),
                optional("side", "string", "Direction for ATR stops")
                    .with_enum(vec![json!("long"), json!("short")]),
                optional("target_rr", "number", "Target as a multiple of the ATR stop distance"),
                ParameterSchema::optional(
                    "risk_per_trade",
                    "number",
                    "Share of capital risked per trade (capped at 0.05)",
                    json!(0.02),
                ),
                optional("conviction", "string", "Scales the risk budget")
                    .with_enum(vec![json!("low"), json!("medium"), json!("high")]),
                ParameterSchema::optional(
                    "max_position_pct",
                    "number",
                    "Largest position allowed, % of capital",
                    json!(40),
                ),
            ],
            category: Some("risk".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall) -> CoreResult<ToolResult> {
        let capital = to_decimal("capital", call.require_f64("capital")?)?;
        let risk = Self::decimal_arg(call, "risk_per_trade")?.unwrap_or(DEFAULT_RISK_PER_TRADE);
        let max_pct =
            Self::decimal_arg(call, "max_position_pct")?.unwrap_or(DEFAULT_MAX_POSITION_PCT);

        let sizer = PositionSizer::new(capital, risk)?;
        let plan = Self::plan(&sizer, call)?;
        let validation = sizer.validate(&plan, max_pct);

        let mut output = plan.summary(call.str_arg("symbol").unwrap_or_default());
        if !validation.warnings.is_empty() {
            output.push_str("\n\n⚠️ Warnings:\n");
            for warning in &validation.warnings {
                output.push_str(&format!("  - {warning}\n"));
            }
        }

        let data = json!({
            "plan": plan,
            "validation": validation,
            "position_pct": to_f64(plan.position_pct),
        });

        Ok(ToolResult::success("position_sizer", output.trim_end()).with_data(data))
    }
}

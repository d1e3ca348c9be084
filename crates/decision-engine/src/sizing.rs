//! Position Sizing
//!
//! Risk-based sizing: the quantity is chosen so that hitting the stop loses a
//! fixed fraction of capital.
//!
//! ```text
//! quantity = capital × risk_per_trade / |entry − stop|
//! ```

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::Side;

/// Default fraction of capital risked per trade
pub const DEFAULT_RISK_PER_TRADE: Decimal = dec!(0.02);

/// Hard ceiling on risk per trade
pub const MAX_RISK_PER_TRADE: Decimal = dec!(0.05);

/// Stop distance in ATRs
pub const ATR_STOP_MULTIPLIER: Decimal = dec!(1.5);

/// Default ceiling for [`PositionSizer::validate`], % of capital
pub const DEFAULT_MAX_POSITION_PCT: Decimal = dec!(40);

/// Quantities are rounded to this many decimal places
const QUANTITY_DP: u32 = 8;

/// Trader conviction, scaling the risk budget
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conviction {
    Low,
    #[default]
    Medium,
    High,
}

impl Conviction {
    pub const fn multiplier(self) -> Decimal {
        match self {
            Self::Low => dec!(0.5),
            Self::Medium => dec!(1.0),
            Self::High => dec!(1.5),
        }
    }
}

impl std::str::FromStr for Conviction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(EngineError::InvalidInput(format!("unknown conviction '{other}'"))),
        }
    }
}

/// A sized position
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionPlan {
    /// Direction implied by entry vs stop
    pub side: Side,

    /// Units to buy or sell
    pub quantity: Decimal,

    /// quantity × entry
    pub position_value: Decimal,

    /// Loss if the stop is hit
    pub risk_amount: Decimal,

    pub entry_price: Decimal,
    pub stop_loss: Decimal,

    /// Target at 2R
    pub target_1to2: Decimal,

    /// Target at 3R
    pub target_1to3: Decimal,

    /// From the supplied target, 2.0 without one
    pub risk_reward_ratio: Decimal,

    /// position_value as % of capital
    pub position_pct: Decimal,

    pub capital: Decimal,
    pub risk_per_trade: Decimal,
}

impl PositionPlan {
    pub fn summary(&self, symbol: &str) -> String {
        let mut s = String::new();

        if symbol.is_empty() {
            s.push_str("📊 Position plan\n\n");
        } else {
            s.push_str(&format!("📊 Position plan ({symbol})\n\n"));
        }

        s.push_str(&format!("💰 Capital: {:.0}\n", self.capital));
        s.push_str(&format!(
            "📉 Risk per trade: {:.1}% ({:.0})\n\n",
            self.risk_per_trade * dec!(100),
            self.risk_amount
        ));

        s.push_str(&format!("📌 Quantity: {:.8} ({})\n", self.quantity, self.side));
        s.push_str(&format!("💵 Position value: {:.0}\n", self.position_value));
        s.push_str(&format!("📊 Share of capital: {:.1}%\n\n", self.position_pct));

        s.push_str(&format!("🎯 Stop loss: {:.0}\n", self.stop_loss));
        s.push_str(&format!("🎯 Target (1:2): {:.0}\n", self.target_1to2));
        s.push_str(&format!("🎯 Target (1:3): {:.0}\n\n", self.target_1to3));

        s.push_str(&format!("⚖️ Risk/reward: 1:{:.1}", self.risk_reward_ratio));
        s
    }
}

/// Result of [`PositionSizer::validate`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionValidation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

/// Sizes positions for a fixed capital and risk budget
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionSizer {
    capital: Decimal,
    risk_per_trade: Decimal,
}

impl PositionSizer {
    /// Risk above [`MAX_RISK_PER_TRADE`] is capped
    pub fn new(capital: Decimal, risk_per_trade: Decimal) -> Result<Self> {
        if capital <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "capital must be positive, got {capital}"
            )));
        }
        if risk_per_trade <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "risk per trade must be positive, got {risk_per_trade}"
            )));
        }

        Ok(Self {
            capital,
            risk_per_trade: risk_per_trade.min(MAX_RISK_PER_TRADE),
        })
    }

    pub fn with_default_risk(capital: Decimal) -> Result<Self> {
        Self::new(capital, DEFAULT_RISK_PER_TRADE)
    }

    pub const fn capital(&self) -> Decimal {
        self.capital
    }

    pub const fn risk_per_trade(&self) -> Decimal {
        self.risk_per_trade
    }

    /// Capital lost if the stop is hit
    pub fn risk_amount(&self) -> Decimal {
        self.capital * self.risk_per_trade
    }

    pub fn calculate_position(
        &self,
        entry_price: Decimal,
        stop_loss: Decimal,
        target_price: Option<Decimal>,
    ) -> Result<PositionPlan> {
        if entry_price <= Decimal::ZERO {
            return Err(EngineError::invalid_price("entry_price", entry_price));
        }
        if stop_loss <= Decimal::ZERO {
            return Err(EngineError::invalid_price("stop_loss", stop_loss));
        }

        let stop_distance = (entry_price - stop_loss).abs();
        if stop_distance.is_zero() {
            return Err(EngineError::ZeroStopDistance);
        }

        let risk_reward_ratio = match target_price {
            Some(target) if target <= Decimal::ZERO => {
                return Err(EngineError::invalid_price("target_price", target));
            }
            Some(target) => {
                let reward = (target - entry_price).abs();
                checked("risk/reward", reward.checked_div(stop_distance))?
            }
            None => dec!(2.0),
        };

        let risk_amount = self.risk_amount();
        let quantity =
            checked("quantity", risk_amount.checked_div(stop_distance))?.round_dp(QUANTITY_DP);
        let position_value = checked("position value", quantity.checked_mul(entry_price))?;
        let position_pct = self.share_of_capital(position_value)?;

        let side = if entry_price > stop_loss { Side::Long } else { Side::Short };
        let target_1to2 = offset(entry_price, stop_distance, dec!(2), side)?;
        let target_1to3 = offset(entry_price, stop_distance, dec!(3), side)?;

        tracing::debug!(
            %entry_price,
            %stop_loss,
            %quantity,
            %position_pct,
            "position sized"
        );

        Ok(PositionPlan {
            side,
            quantity,
            position_value,
            risk_amount,
            entry_price,
            stop_loss,
            target_1to2,
            target_1to3,
            risk_reward_ratio,
            position_pct,
            capital: self.capital,
            risk_per_trade: self.risk_per_trade,
        })
    }

    /// Risk-based plan, scaled down so the position never exceeds
    /// `max_position_pct` of capital
    pub fn calculate_capped(
        &self,
        entry_price: Decimal,
        stop_loss: Decimal,
        target_price: Option<Decimal>,
        max_position_pct: Decimal,
    ) -> Result<PositionPlan> {
        let mut plan = self.calculate_position(entry_price, stop_loss, target_price)?;
        let cap = max_position_pct.max(Decimal::ZERO);

        if plan.position_pct > cap {
            let budget = checked("position budget", (cap / dec!(100)).checked_mul(self.capital))?;
            let stop_distance = (entry_price - stop_loss).abs();
            plan.quantity =
                checked("quantity", budget.checked_div(entry_price))?.round_dp(QUANTITY_DP);
            plan.position_value =
                checked("position value", plan.quantity.checked_mul(entry_price))?;
            plan.risk_amount = checked("risk amount", plan.quantity.checked_mul(stop_distance))?;
            plan.position_pct = self.share_of_capital(plan.position_value)?;
        }

        Ok(plan)
    }

    /// Stop `multiplier` ATRs away from entry, against the trade
    pub fn stop_loss_from_atr(
        entry_price: Decimal,
        atr: Decimal,
        multiplier: Decimal,
        side: Side,
    ) -> Result<Decimal> {
        let against = match side {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        };
        offset(entry_price, atr, multiplier, against)
    }

    /// ATR stop with a target at `target_rr` times the stop distance
    pub fn calculate_from_atr(
        &self,
        entry_price: Decimal,
        atr: Decimal,
        multiplier: Decimal,
        side: Side,
        target_rr: Decimal,
    ) -> Result<PositionPlan> {
        if atr <= Decimal::ZERO || multiplier <= Decimal::ZERO {
            return Err(EngineError::InvalidInput(format!(
                "ATR and multiplier must be positive, got {atr} × {multiplier}"
            )));
        }

        let stop_loss = Self::stop_loss_from_atr(entry_price, atr, multiplier, side)?;
        let distance = (entry_price - stop_loss).abs();
        let target = offset(entry_price, distance, target_rr, side)?;

        self.calculate_position(entry_price, stop_loss, Some(target))
    }

    /// Scale the risk budget by conviction, never beyond [`MAX_RISK_PER_TRADE`]
    pub fn size_by_conviction(
        &self,
        entry_price: Decimal,
        stop_loss: Decimal,
        conviction: Conviction,
    ) -> Result<PositionPlan> {
        // risk_per_trade is at most 0.05 and the multiplier at most 1.5
        let adjusted = Self {
            risk_per_trade: (self.risk_per_trade * conviction.multiplier()).min(MAX_RISK_PER_TRADE),
            ..*self
        };
        adjusted.calculate_position(entry_price, stop_loss, None)
    }

    /// `value` as % of capital
    fn share_of_capital(&self, value: Decimal) -> Result<Decimal> {
        let fraction = checked("position share", value.checked_div(self.capital))?;
        checked("position share", fraction.checked_mul(dec!(100)))
    }

    pub fn validate(&self, plan: &PositionPlan, max_position_pct: Decimal) -> PositionValidation {
        let mut warnings = Vec::new();
        let mut is_valid = true;

        if plan.position_pct > max_position_pct {
            warnings.push(format!(
                "Position ({:.1}% of capital) exceeds the {}% limit",
                plan.position_pct, max_position_pct
            ));
        }

        if plan.risk_reward_ratio < dec!(1.5) {
            warnings.push(format!(
                "Risk/reward ({:.1}) is below 1.5. Look for a better entry.",
                plan.risk_reward_ratio
            ));
        }

        if plan.risk_amount > self.capital * MAX_RISK_PER_TRADE {
            warnings.push("Risk per trade exceeds 5% of capital".to_string());
            is_valid = false;
        }

        PositionValidation {
            is_valid: is_valid && warnings.is_empty(),
            warnings,
        }
    }
}

/// `entry` moved `distance × multiple` in the direction of `side`
fn offset(entry: Decimal, distance: Decimal, multiple: Decimal, side: Side) -> Result<Decimal> {
    let step = checked("price offset", distance.checked_mul(multiple))?;
    let price = match side {
        Side::Long => entry.checked_add(step),
        Side::Short => entry.checked_sub(step),
    };
    checked("price offset", price)
}

/// Decimal operations return `None` on overflow; surface that as bad input
fn checked(what: &str, value: Option<Decimal>) -> Result<Decimal> {
    value.ok_or_else(|| EngineError::InvalidInput(format!("{what} is out of range")))
}

/// Lossless-enough conversion for prices coming from `f64` analysis code
pub fn to_decimal(field: &'static str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|_| EngineError::invalid_price(field, value))
}

/// For handing money figures back to `f64` scoring code
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizer() -> PositionSizer {
        PositionSizer::new(dec!(5000000), dec!(0.02)).unwrap()
    }

    #[test]
    fn test_basic_long_position() {
        let plan = sizer()
            .calculate_position(dec!(50000000), dec!(48000000), None)
            .unwrap();

        assert_eq!(plan.side, Side::Long);
        assert_eq!(plan.risk_amount, dec!(100000));
        assert_eq!(plan.quantity, dec!(0.05));
        assert_eq!(plan.position_value, dec!(2500000));
        assert_eq!(plan.position_pct, dec!(50));
        assert_eq!(plan.target_1to2, dec!(54000000));
        assert_eq!(plan.target_1to3, dec!(56000000));
        assert_eq!(plan.risk_reward_ratio, dec!(2.0));
    }

    #[test]
    fn test_short_targets_go_down() {
        let plan = sizer().calculate_position(dec!(100), dec!(110), Some(dec!(75))).unwrap();
        assert_eq!(plan.side, Side::Short);
        assert_eq!(plan.target_1to2, dec!(80));
        assert_eq!(plan.target_1to3, dec!(70));
        assert_eq!(plan.risk_reward_ratio, dec!(2.5));
    }

    #[test]
    fn test_invalid_inputs() {
        let s = sizer();
        assert!(matches!(
            s.calculate_position(dec!(0), dec!(48), None),
            Err(EngineError::InvalidPrice { field: "entry_price", .. })
        ));
        assert!(matches!(
            s.calculate_position(dec!(50), dec!(50), None),
            Err(EngineError::ZeroStopDistance)
        ));
        assert!(s.calculate_position(dec!(50), dec!(48), Some(dec!(-1))).is_err());
        assert!(PositionSizer::new(dec!(0), dec!(0.02)).is_err());
        assert!(PositionSizer::new(dec!(1000), dec!(0)).is_err());
    }

    #[test]
    fn test_risk_is_capped() {
        let s = PositionSizer::new(dec!(1000), dec!(0.10)).unwrap();
        assert_eq!(s.risk_per_trade(), MAX_RISK_PER_TRADE);
        assert_eq!(s.risk_amount(), dec!(50));
    }

    #[test]
    fn test_atr_based_plan() {
        let plan = sizer()
            .calculate_from_atr(
                dec!(50000000),
                dec!(1000000),
                ATR_STOP_MULTIPLIER,
                Side::Long,
                dec!(2),
            )
            .unwrap();
        assert_eq!(plan.stop_loss, dec!(48500000));
        assert_eq!(plan.risk_reward_ratio, dec!(2));
        assert_eq!(plan.quantity, dec!(0.06666667));

        let stop = PositionSizer::stop_loss_from_atr(dec!(100), dec!(2), dec!(1.5), Side::Short);
        assert_eq!(stop.unwrap(), dec!(103));

        assert!(sizer()
            .calculate_from_atr(dec!(100), dec!(0), ATR_STOP_MULTIPLIER, Side::Long, dec!(2))
            .is_err());
    }

    #[test]
    fn test_conviction_scales_risk() {
        let s = sizer();
        let low = s.size_by_conviction(dec!(50000000), dec!(48000000), Conviction::Low).unwrap();
        let high = s.size_by_conviction(dec!(50000000), dec!(48000000), Conviction::High).unwrap();

        assert_eq!(low.risk_amount, dec!(50000));
        assert_eq!(low.position_pct, dec!(25));
        assert_eq!(high.risk_amount, dec!(150000));
        assert_eq!(high.position_pct, dec!(75));
        // The sizer itself is unchanged
        assert_eq!(s.risk_per_trade(), dec!(0.02));

        let bold = PositionSizer::new(dec!(1000), dec!(0.04)).unwrap();
        let capped = bold.size_by_conviction(dec!(100), dec!(90), Conviction::High).unwrap();
        assert_eq!(capped.risk_per_trade, MAX_RISK_PER_TRADE);
        assert_eq!("HIGH".parse::<Conviction>().unwrap(), Conviction::High);
    }

    #[test]
    fn test_overflow_is_invalid_input() {
        let huge_capital = Decimal::from_i128_with_scale(10_i128.pow(27), 0);
        let huge = PositionSizer::new(huge_capital, dec!(0.05)).unwrap();
        assert!(matches!(
            huge.calculate_position(dec!(1000000), dec!(999999), None),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            huge.calculate_capped(dec!(1000000), dec!(999999), None, dec!(40)),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            huge.size_by_conviction(dec!(1000000), dec!(999999), Conviction::High),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(matches!(
            sizer().calculate_from_atr(dec!(100), huge_capital, dec!(1000), Side::Short, dec!(2)),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_capped_plan() {
        let plan = sizer()
            .calculate_capped(dec!(50000000), dec!(48000000), None, dec!(5))
            .unwrap();
        assert_eq!(plan.position_pct, dec!(5));
        assert_eq!(plan.quantity, dec!(0.005));
        assert_eq!(plan.position_value, dec!(250000));
        assert_eq!(plan.risk_amount, dec!(10000));

        // Already under the cap: unchanged
        let small = sizer()
            .calculate_capped(dec!(50000000), dec!(48000000), None, dec!(60))
            .unwrap();
        assert_eq!(small.position_pct, dec!(50));
    }

    #[test]
    fn test_validation() {
        let s = sizer();
        let plan = s.calculate_position(dec!(50000000), dec!(48000000), None).unwrap();

        let strict = s.validate(&plan, DEFAULT_MAX_POSITION_PCT);
        assert!(!strict.is_valid);
        assert_eq!(strict.warnings.len(), 1);

        let loose = s.validate(&plan, dec!(60));
        assert!(loose.is_valid);

        // Same plan against a much smaller account risks more than 5%
        let tiny = PositionSizer::new(dec!(1000000), dec!(0.02)).unwrap();
        let result = tiny.validate(&plan, dec!(1000));
        assert!(!result.is_valid);
        assert!(result.warnings[0].contains("5%"));

        let thin = s.calculate_position(dec!(100), dec!(90), Some(dec!(110))).unwrap();
        assert!(s.validate(&thin, dec!(1000)).warnings[0].contains("below 1.5"));
    }

    #[test]
    fn test_summary() {
        let plan = sizer().calculate_position(dec!(50000000), dec!(48000000), None).unwrap();
        let text = plan.summary("BTC/KRW");
        assert!(text.contains("(BTC/KRW)"));
        assert!(text.contains("Risk per trade: 2.0%"));
        assert!(text.contains("1:2.0"));
    }

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(to_decimal("entry_price", 1.5).unwrap(), dec!(1.5));
        assert!(to_decimal("entry_price", f64::NAN).is_err());
        assert!((to_f64(dec!(2.25)) - 2.25).abs() < 1e-12);
    }
}

//! Domain Models
//!
//! Core data types shared by the analyzers: candles, trade setups and the
//! market snapshot produced by [`crate::engine::MarketAnalyzer`].
//!
//! Indicator and probability math is done in `f64`. Money only appears in
//! [`crate::sizing`], which uses `rust_decimal`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// One OHLCV bar
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub const fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }

    /// Close above open
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }
}

/// Trade direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            other => Err(EngineError::InvalidInput(format!("unknown side '{other}'"))),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall market state of the latest candle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    StrongBull,
    Bull,
    Neutral,
    Bear,
    StrongBear,
    HighVolatility,
}

impl MarketRegime {
    pub const fn label(self) -> &'static str {
        match self {
            Self::StrongBull => "Strong bull",
            Self::Bull => "Bull",
            Self::Neutral => "Neutral",
            Self::Bear => "Bear",
            Self::StrongBear => "Strong bear",
            Self::HighVolatility => "High volatility",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Sideways,
}

impl TrendDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Sideways => "sideways",
        }
    }
}

/// Directional consistency of the last 20 candles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
    NoTrend,
}

impl TrendStrength {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
            Self::NoTrend => "no trend",
        }
    }

    /// Weak or absent trend; strategies wait on these
    pub const fn is_indecisive(self) -> bool {
        matches!(self, Self::Weak | Self::NoTrend)
    }
}

/// Bullish / bearish / neutral reading of MACD or moving-average alignment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

impl Signal {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiSignal {
    Oversold,
    Neutral,
    Overbought,
}

impl RsiSignal {
    pub fn from_rsi(rsi: f64) -> Self {
        if rsi < 30.0 {
            Self::Oversold
        } else if rsi > 70.0 {
            Self::Overbought
        } else {
            Self::Neutral
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Oversold => "oversold",
            Self::Neutral => "neutral",
            Self::Overbought => "overbought",
        }
    }
}

/// ATR% bucket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
    Extreme,
}

impl VolatilityRegime {
    pub fn from_atr_percent(atr_percent: f64) -> Self {
        if atr_percent < 1.5 {
            Self::Low
        } else if atr_percent < 3.0 {
            Self::Normal
        } else if atr_percent < 5.0 {
            Self::High
        } else {
            Self::Extreme
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

impl VolumeTrend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
        }
    }
}

/// Suggested course of action from the market snapshot alone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Long,
    Short,
    Wait,
}

impl Strategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Wait => "wait",
        }
    }
}

/// Latest raw indicator values behind a [`MarketContext`]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub ema12: Option<f64>,
    pub ema26: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub atr: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub volume_sma: Option<f64>,
}

/// Labeled market snapshot
///
/// Percentage distances are signed relative to the current price: support uses
/// `(current - support) / current * 100`, resistance
/// `(resistance - current) / current * 100`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub regime: MarketRegime,
    pub trend_direction: TrendDirection,
    pub trend_strength: TrendStrength,

    pub rsi: f64,
    pub rsi_signal: RsiSignal,
    pub macd_signal: Signal,
    pub ma_alignment: Signal,

    pub nearest_support: f64,
    pub nearest_resistance: f64,
    pub distance_to_support_pct: f64,
    pub distance_to_resistance_pct: f64,

    pub atr_percent: f64,
    pub volatility_regime: VolatilityRegime,

    pub volume_trend: VolumeTrend,
    pub volume_anomaly: bool,

    /// 0-100, independent of `bearish_score`
    pub bullish_score: f64,
    /// 0-100, independent of `bullish_score`
    pub bearish_score: f64,

    pub recommended_strategy: Strategy,
    pub reasoning: Vec<String>,

    pub current_price: f64,
    #[serde(default)]
    pub indicators: IndicatorSnapshot,
}

impl Default for MarketContext {
    /// Neutral values used when a caller supplies no (or only partial) context
    fn default() -> Self {
        Self {
            regime: MarketRegime::Neutral,
            trend_direction: TrendDirection::Sideways,
            trend_strength: TrendStrength::Moderate,
            rsi: 50.0,
            rsi_signal: RsiSignal::Neutral,
            macd_signal: Signal::Neutral,
            ma_alignment: Signal::Neutral,
            nearest_support: 0.0,
            nearest_resistance: 0.0,
            distance_to_support_pct: 100.0,
            distance_to_resistance_pct: 100.0,
            atr_percent: 2.0,
            volatility_regime: VolatilityRegime::Normal,
            volume_trend: VolumeTrend::Stable,
            volume_anomaly: false,
            bullish_score: 50.0,
            bearish_score: 50.0,
            recommended_strategy: Strategy::Wait,
            reasoning: Vec::new(),
            current_price: 0.0,
            indicators: IndicatorSnapshot::default(),
        }
    }
}

impl MarketContext {
    /// Result for candle histories too short to analyze
    pub fn insufficient_data() -> Self {
        Self {
            trend_strength: TrendStrength::NoTrend,
            distance_to_support_pct: 0.0,
            distance_to_resistance_pct: 0.0,
            reasoning: vec!["⚠️ insufficient data - at least 50 candles required".into()],
            ..Self::default()
        }
    }

    /// Compact multi-line summary for prompts and logs
    pub fn brief(&self) -> String {
        format!(
            "Regime: {}\nTrend: {} ({})\nRSI: {:.1} ({})\nMACD: {}\nMA alignment: {}\n\
             Support: {:.2} ({:.2}% below)\nResistance: {:.2} ({:.2}% above)\n\
             Volatility: {} (ATR {:.2}%)\nVolume: {}{}\n\
             Bullish score: {:.0}/100\nBearish score: {:.0}/100\nStrategy: {}",
            self.regime.label(),
            self.trend_direction.as_str(),
            self.trend_strength.label(),
            self.rsi,
            self.rsi_signal.as_str(),
            self.macd_signal.as_str(),
            self.ma_alignment.as_str(),
            self.nearest_support,
            self.distance_to_support_pct,
            self.nearest_resistance,
            self.distance_to_resistance_pct,
            self.volatility_regime.as_str(),
            self.atr_percent,
            self.volume_trend.as_str(),
            if self.volume_anomaly { " (anomaly)" } else { "" },
            self.bullish_score,
            self.bearish_score,
            self.recommended_strategy.as_str(),
        )
    }
}

/// A proposed trade with its derived risk/reward figures
///
/// Built through [`TradeSetup::new`], which validates the prices and computes
/// the derived fields once.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TradeSetup {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,

    /// Distance from entry to stop, % of entry
    pub risk_percent: f64,
    /// Distance from entry to target, % of entry
    pub reward_percent: f64,
    /// `reward_percent / risk_percent`, 0 when risk is 0
    pub risk_reward_ratio: f64,
}

impl TradeSetup {
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
    ) -> Result<Self> {
        for (field, value) in [
            ("entry_price", entry_price),
            ("stop_loss", stop_loss),
            ("take_profit", take_profit),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EngineError::invalid_price(field, value));
            }
        }

        // Absolute distances: inverted setups still produce a ratio.
        let risk_percent = (entry_price - stop_loss).abs() * 100.0 / entry_price;
        let reward_percent = (take_profit - entry_price).abs() * 100.0 / entry_price;
        let risk_reward_ratio = if risk_percent > 0.0 {
            reward_percent / risk_percent
        } else {
            0.0
        };

        Ok(Self {
            symbol: symbol.into(),
            side,
            entry_price,
            stop_loss,
            take_profit,
            risk_percent,
            reward_percent,
            risk_reward_ratio,
        })
    }

    /// Stop or target sits on the wrong side of entry for the stated side
    pub fn is_inverted(&self) -> bool {
        match self.side {
            Side::Long => {
                self.stop_loss >= self.entry_price || self.take_profit <= self.entry_price
            }
            Side::Short => {
                self.stop_loss <= self.entry_price || self.take_profit >= self.entry_price
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_setup_ratios() {
        let setup =
            TradeSetup::new("BTC", Side::Long, 100_000_000.0, 97_000_000.0, 109_000_000.0).unwrap();
        assert!((setup.risk_percent - 3.0).abs() < 1e-12);
        assert!((setup.reward_percent - 9.0).abs() < 1e-12);
        assert!((setup.risk_reward_ratio - 3.0).abs() < 1e-12);
        assert!(!setup.is_inverted());
    }

    #[test]
    fn test_short_setup_ratios() {
        let setup = TradeSetup::new("ETH", Side::Short, 3000.0, 3090.0, 2820.0).unwrap();
        assert!((setup.risk_percent - 3.0).abs() < 1e-9);
        assert!((setup.reward_percent - 6.0).abs() < 1e-9);
        assert!((setup.risk_reward_ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_risk_gives_zero_ratio() {
        let setup = TradeSetup::new("BTC", Side::Long, 100.0, 100.0, 110.0).unwrap();
        assert_eq!(setup.risk_percent, 0.0);
        assert_eq!(setup.risk_reward_ratio, 0.0);
    }

    #[test]
    fn test_inverted_setup_is_permitted() {
        // Long with the stop above entry: ratio is still computed from distances
        let setup = TradeSetup::new("BTC", Side::Long, 100.0, 105.0, 110.0).unwrap();
        assert!(setup.is_inverted());
        assert!((setup.risk_reward_ratio - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_positive_prices() {
        assert!(matches!(
            TradeSetup::new("BTC", Side::Long, 0.0, 95.0, 110.0),
            Err(EngineError::InvalidPrice { field: "entry_price", .. })
        ));
        assert!(TradeSetup::new("BTC", Side::Long, 100.0, -1.0, 110.0).is_err());
        assert!(TradeSetup::new("BTC", Side::Short, 100.0, 105.0, f64::NAN).is_err());
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("LONG".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Short);
        assert!("flat".parse::<Side>().is_err());
    }

    #[test]
    fn test_classifiers() {
        assert_eq!(RsiSignal::from_rsi(29.9), RsiSignal::Oversold);
        assert_eq!(RsiSignal::from_rsi(70.0), RsiSignal::Neutral);
        assert_eq!(RsiSignal::from_rsi(70.1), RsiSignal::Overbought);
        assert_eq!(VolatilityRegime::from_atr_percent(1.49), VolatilityRegime::Low);
        assert_eq!(VolatilityRegime::from_atr_percent(1.5), VolatilityRegime::Normal);
        assert_eq!(VolatilityRegime::from_atr_percent(3.0), VolatilityRegime::High);
        assert_eq!(VolatilityRegime::from_atr_percent(5.0), VolatilityRegime::Extreme);
    }

    #[test]
    fn test_context_serializes_with_wire_vocabulary() {
        let json = serde_json::to_value(MarketContext::insufficient_data()).unwrap();
        assert_eq!(json["regime"], "NEUTRAL");
        assert_eq!(json["trend_strength"], "NO_TREND");
        assert_eq!(json["trend_direction"], "sideways");
        assert_eq!(json["recommended_strategy"], "wait");
        assert_eq!(json["bullish_score"], 50.0);
    }
}

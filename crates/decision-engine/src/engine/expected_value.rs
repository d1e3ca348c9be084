//! Expected-Value Calculator
//!
//! Only positive-expectancy trades pass:
//!
//! ```text
//! EV    = win% × reward% − (1 − win%) × risk%
//! Kelly = W − (1 − W) / R        (halved, capped at 25%)
//! ```
//!
//! The win probability is a weighted blend of a pattern base rate, a technical
//! score, trend alignment and a risk/reward adjustment.

use serde::{Deserialize, Serialize};

use crate::engine::Bounds;
use crate::error::Result;
use crate::model::{
    MarketContext, Side, Signal, TradeSetup, TrendDirection, TrendStrength, VolatilityRegime,
};

const WIN_PROB_BOUNDS: Bounds = Bounds::new(0.20, 0.80);
const SUB_SCORE_BOUNDS: Bounds = Bounds::new(0.2, 0.8);

const PATTERN_WEIGHT: f64 = 0.30;
const TECHNICAL_WEIGHT: f64 = 0.30;
const TREND_WEIGHT: f64 = 0.25;
const RISK_REWARD_WEIGHT: f64 = 0.15;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Enter,
    Skip,
    Wait,
}

impl Recommendation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Skip => "skip",
            Self::Wait => "wait",
        }
    }

    pub const fn verdict_label(self) -> &'static str {
        match self {
            Self::Enter => "✅ Entry allowed",
            Self::Skip => "❌ Do not enter",
            Self::Wait => "⏸️ Wait for conditions",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Setup family used for the base win rate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RsiOversold,
    RsiOverbought,
    TrendFollowing,
    CounterTrend,
    SupportBounce,
    ResistanceRejection,
    Default,
}

impl PatternKind {
    /// Historical base win rate for the pattern
    pub const fn probability(self) -> f64 {
        match self {
            Self::RsiOversold => 0.58,
            Self::RsiOverbought => 0.55,
            Self::TrendFollowing => 0.52,
            Self::CounterTrend => 0.42,
            Self::SupportBounce => 0.55,
            Self::ResistanceRejection => 0.53,
            Self::Default => 0.50,
        }
    }
}

type PatternRule = (PatternKind, fn(Side, &MarketContext) -> bool);

/// Checked in order; the first matching rule sets the base rate
const PATTERN_RULES: &[PatternRule] = &[
    (PatternKind::RsiOversold, |side: Side, c: &MarketContext| {
        side == Side::Long && c.rsi < 30.0
    }),
    (PatternKind::TrendFollowing, |side: Side, c: &MarketContext| {
        side == Side::Long && c.ma_alignment == Signal::Bullish
    }),
    (PatternKind::CounterTrend, |side: Side, c: &MarketContext| {
        side == Side::Long && c.trend_direction == TrendDirection::Down
    }),
    (PatternKind::RsiOverbought, |side: Side, c: &MarketContext| {
        side == Side::Short && c.rsi > 70.0
    }),
    (PatternKind::TrendFollowing, |side: Side, c: &MarketContext| {
        side == Side::Short && c.ma_alignment == Signal::Bearish
    }),
    (PatternKind::CounterTrend, |side: Side, c: &MarketContext| {
        side == Side::Short && c.trend_direction == TrendDirection::Up
    }),
    (PatternKind::SupportBounce, |side: Side, c: &MarketContext| {
        side == Side::Long && c.distance_to_support_pct < 2.0
    }),
    (PatternKind::ResistanceRejection, |side: Side, c: &MarketContext| {
        side == Side::Short && c.distance_to_resistance_pct < 2.0
    }),
];

/// The four sub-scores behind a win probability
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WinProbabilityBreakdown {
    pub pattern: PatternKind,
    pub pattern_probability: f64,
    pub technical_score: f64,
    pub trend_alignment: f64,
    pub risk_reward_adjustment: f64,
}

impl WinProbabilityBreakdown {
    /// Weighted blend, clamped to 0.20..=0.80
    pub fn win_probability(&self) -> f64 {
        WIN_PROB_BOUNDS.clamp(
            self.pattern_probability * PATTERN_WEIGHT
                + self.technical_score * TECHNICAL_WEIGHT
                + self.trend_alignment * TREND_WEIGHT
                + self.risk_reward_adjustment * RISK_REWARD_WEIGHT,
        )
    }
}

/// Outcome of [`ExpectedValueCalculator::analyze`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvAnalysis {
    pub symbol: String,
    pub side: Side,
    /// % of position
    pub expected_value: f64,
    pub win_probability: f64,
    pub risk_reward_ratio: f64,
    /// Half-Kelly fraction of capital
    pub kelly_fraction: f64,
    pub recommendation: Recommendation,
    pub confidence: Confidence,
    pub reasoning: Vec<String>,
    pub risk_percent: f64,
    pub reward_percent: f64,
    /// % of capital
    pub optimal_position_pct: f64,
    pub breakdown: WinProbabilityBreakdown,
}

impl EvAnalysis {
    pub const fn verdict_label(&self) -> &'static str {
        self.recommendation.verdict_label()
    }

    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} {} ({} confidence)\n\
             EV: {:+.2}% | Win rate: {:.1}% | R:R 1:{:.2}\n\
             Risk: {:.2}% | Reward: {:.2}% | Kelly: {:.2}% | Position: {:.2}% of capital\n",
            self.verdict_label(),
            self.symbol,
            self.confidence.as_str(),
            self.expected_value,
            self.win_probability * 100.0,
            self.risk_reward_ratio,
            self.risk_percent,
            self.reward_percent,
            self.kelly_fraction * 100.0,
            self.optimal_position_pct,
        );
        for line in &self.reasoning {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Result of [`ExpectedValueCalculator::quick_evaluate`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuickEvaluation {
    pub expected_value: f64,
    pub risk_reward_ratio: f64,
    pub win_probability: f64,
    pub kelly_fraction: f64,
    pub verdict: String,
    pub confidence: Confidence,
}

/// Scores trade setups against a market context
#[derive(Clone, Copy, Debug, Default)]
pub struct ExpectedValueCalculator;

impl ExpectedValueCalculator {
    pub const MIN_RISK_REWARD: f64 = 1.5;
    pub const MIN_WIN_PROB: f64 = 0.35;
    /// %
    pub const MIN_EV: f64 = 0.5;
    pub const MAX_KELLY: f64 = 0.25;
    /// % of capital
    pub const MAX_POSITION_PCT: f64 = 5.0;

    pub const fn new() -> Self {
        Self
    }

    /// Evaluate a setup. A missing context scores as neutral.
    pub fn analyze(&self, setup: &TradeSetup, context: Option<&MarketContext>) -> EvAnalysis {
        let fallback = MarketContext::default();
        let ctx = context.unwrap_or(&fallback);

        let breakdown = Self::breakdown(setup, ctx);
        let win_probability = breakdown.win_probability();

        let expected_value =
            win_probability * setup.reward_percent - (1.0 - win_probability) * setup.risk_percent;
        let kelly_fraction = Self::kelly(win_probability, setup.risk_reward_ratio);

        let (recommendation, confidence, mut reasoning) =
            Self::decide(expected_value, win_probability, setup.risk_reward_ratio, ctx);

        if setup.is_inverted() {
            reasoning.insert(
                0,
                format!(
                    "⚠️ Stop or target sits on the wrong side of entry for a {} trade - \
                     ratios use absolute distances",
                    setup.side
                ),
            );
        }

        let optimal_position_pct = (kelly_fraction * 100.0).min(Self::MAX_POSITION_PCT);

        tracing::debug!(
            symbol = %setup.symbol,
            pattern = ?breakdown.pattern,
            technical = breakdown.technical_score,
            trend = breakdown.trend_alignment,
            rr_adjustment = breakdown.risk_reward_adjustment,
            win_probability,
            "win probability estimated"
        );
        tracing::info!(
            symbol = %setup.symbol,
            side = %setup.side,
            ev = expected_value,
            rr = setup.risk_reward_ratio,
            recommendation = recommendation.as_str(),
            confidence = confidence.as_str(),
            "trade evaluated"
        );

        EvAnalysis {
            symbol: setup.symbol.clone(),
            side: setup.side,
            expected_value,
            win_probability,
            risk_reward_ratio: setup.risk_reward_ratio,
            kelly_fraction,
            recommendation,
            confidence,
            reasoning,
            risk_percent: setup.risk_percent,
            reward_percent: setup.reward_percent,
            optimal_position_pct,
            breakdown,
        }
    }

    /// Evaluate raw prices without market context
    pub fn quick_evaluate(
        &self,
        entry_price: f64,
        stop_loss: f64,
        take_profit: f64,
        side: Side,
        symbol: &str,
    ) -> Result<QuickEvaluation> {
        let setup = TradeSetup::new(symbol, side, entry_price, stop_loss, take_profit)?;
        let analysis = self.analyze(&setup, None);

        Ok(QuickEvaluation {
            expected_value: analysis.expected_value,
            risk_reward_ratio: analysis.risk_reward_ratio,
            win_probability: analysis.win_probability,
            kelly_fraction: analysis.kelly_fraction,
            verdict: analysis.verdict_label().to_string(),
            confidence: analysis.confidence,
        })
    }

    fn breakdown(setup: &TradeSetup, ctx: &MarketContext) -> WinProbabilityBreakdown {
        let pattern = pattern_kind(setup.side, ctx);
        WinProbabilityBreakdown {
            pattern,
            pattern_probability: pattern.probability(),
            technical_score: technical_score(setup.side, ctx),
            trend_alignment: trend_alignment(setup.side, ctx.trend_direction, ctx.trend_strength),
            risk_reward_adjustment: risk_reward_adjustment(setup.risk_reward_ratio),
        }
    }

    fn kelly(win_probability: f64, risk_reward_ratio: f64) -> f64 {
        if risk_reward_ratio <= 0.0 {
            return 0.0;
        }
        let kelly = win_probability - (1.0 - win_probability) / risk_reward_ratio;
        Bounds::new(0.0, Self::MAX_KELLY).clamp(kelly / 2.0)
    }

    /// First matching gate wins. A sub-1 ratio outranks the thin-EV gate so
    /// that it always reports high confidence.
    fn decide(
        ev: f64,
        win_prob: f64,
        rr: f64,
        ctx: &MarketContext,
    ) -> (Recommendation, Confidence, Vec<String>) {
        let mut reasoning = Vec::new();

        if ev < 0.0 {
            reasoning.push(format!("❌ Expected value {ev:+.2}% is negative (expected loss)"));
            reasoning.push("   → This trade is mathematically unfavourable".to_string());
            return (Recommendation::Skip, Confidence::High, reasoning);
        }

        if rr < 1.0 {
            reasoning.push(format!("❌ Risk/reward 1:{rr:.1} - the loss is larger than the gain"));
            reasoning.push("   → Tighten the stop or raise the target".to_string());
            return (Recommendation::Skip, Confidence::High, reasoning);
        }

        if ev < Self::MIN_EV {
            reasoning.push(format!(
                "⚠️ Expected value {ev:+.2}% is too low (at least {}% required)",
                Self::MIN_EV
            ));
            reasoning.push("   → Fees and slippage can turn this into a loss".to_string());
            return (Recommendation::Skip, Confidence::Medium, reasoning);
        }

        if rr < Self::MIN_RISK_REWARD {
            reasoning.push(format!(
                "⚠️ Risk/reward 1:{rr:.1} is unfavourable (1:{} or better recommended)",
                Self::MIN_RISK_REWARD
            ));
            reasoning.push("   → Wait for a better entry or adjust the target".to_string());
            return (Recommendation::Wait, Confidence::Medium, reasoning);
        }

        if win_prob < Self::MIN_WIN_PROB {
            reasoning.push(format!(
                "⚠️ Estimated win rate {:.0}% is low (at least {:.0}% required)",
                win_prob * 100.0,
                Self::MIN_WIN_PROB * 100.0
            ));
            reasoning.push("   → Re-check once technical conditions improve".to_string());
            return (Recommendation::Wait, Confidence::Low, reasoning);
        }

        if ctx.volatility_regime == VolatilityRegime::Extreme {
            reasoning.push("⚠️ Extreme volatility - cut position size by 50%".to_string());
        }

        reasoning.push(format!("✅ Expected value {ev:+.2}% (positive)"));
        reasoning.push(format!("✅ Risk/reward 1:{rr:.1} (favourable)"));
        reasoning.push(format!("✅ Estimated win rate {:.0}%", win_prob * 100.0));

        let confidence = if ev > 2.0 && rr >= 2.0 && win_prob >= 0.55 {
            reasoning.push("📊 Confidence: high - excellent opportunity".to_string());
            Confidence::High
        } else if ev > 1.0 && rr >= 1.5 && win_prob >= 0.45 {
            reasoning.push("📊 Confidence: medium - solid opportunity".to_string());
            Confidence::Medium
        } else {
            reasoning.push("📊 Confidence: low - keep the position small".to_string());
            Confidence::Low
        };

        (Recommendation::Enter, confidence, reasoning)
    }
}

fn pattern_kind(side: Side, ctx: &MarketContext) -> PatternKind {
    PATTERN_RULES
        .iter()
        .find(|(_, applies)| applies(side, ctx))
        .map_or(PatternKind::Default, |&(kind, _)| kind)
}

fn technical_score(side: Side, ctx: &MarketContext) -> f64 {
    let rsi = ctx.rsi;
    let mut score = 0.5;

    // RSI steps, most favourable extreme first
    let (favoured, rsi_steps) = match side {
        Side::Long => (
            Signal::Bullish,
            [
                (rsi < 30.0, 0.15),
                (rsi < 40.0, 0.10),
                (rsi > 70.0, -0.15),
                (rsi > 60.0, -0.08),
            ],
        ),
        Side::Short => (
            Signal::Bearish,
            [
                (rsi > 70.0, 0.15),
                (rsi > 60.0, 0.10),
                (rsi < 30.0, -0.15),
                (rsi < 40.0, -0.08),
            ],
        ),
    };
    if let Some(&(_, delta)) = rsi_steps.iter().find(|(hit, _)| *hit) {
        score += delta;
    }

    match ctx.macd_signal {
        Signal::Neutral => {}
        s if s == favoured => score += 0.10,
        _ => score -= 0.10,
    }
    match ctx.ma_alignment {
        Signal::Neutral => {}
        s if s == favoured => score += 0.08,
        _ => score -= 0.08,
    }

    SUB_SCORE_BOUNDS.clamp(score)
}

fn trend_alignment(side: Side, direction: TrendDirection, strength: TrendStrength) -> f64 {
    let aligned = matches!(
        (side, direction),
        (Side::Long, TrendDirection::Up) | (Side::Short, TrendDirection::Down)
    );
    let opposed = matches!(
        (side, direction),
        (Side::Long, TrendDirection::Down) | (Side::Short, TrendDirection::Up)
    );

    let mut score: f64 = 0.5;
    if aligned {
        score += 0.2;
    } else if opposed {
        score -= 0.15;
    }

    match strength {
        TrendStrength::Strong if aligned => score += 0.1,
        TrendStrength::Strong => score -= 0.1,
        TrendStrength::Weak | TrendStrength::NoTrend => score = 0.5 + (score - 0.5) * 0.5,
        TrendStrength::Moderate => {}
    }

    SUB_SCORE_BOUNDS.clamp(score)
}

/// Far targets are reached less often
fn risk_reward_adjustment(rr: f64) -> f64 {
    const STEPS: [(f64, f64); 5] =
        [(1.0, 0.55), (1.5, 0.52), (2.0, 0.50), (2.5, 0.47), (3.0, 0.45)];

    STEPS
        .iter()
        .find(|&&(limit, _)| rr <= limit)
        .map_or(0.40, |&(_, adjustment)| adjustment)
}

//! Rational Advisor
//!
//! The end-to-end request pipeline: emotion gate first, then market context,
//! then an expected-value verdict for any trade setup found in the message.
//!
//! ```text
//! message ──▶ EmotionFilter ──▶ EmotionTracker ──▶ 3 blocks in a row? ──▶ ForceBreak
//!                                      │
//!                                      ▼
//!                              rational? ── no ──▶ Blocked / Emotional
//!                                      │ yes
//!                                      ▼
//!                 candles ──▶ MarketAnalyzer ──▶ setup in message?
//!                                                  │ yes          │ no
//!                                                  ▼              ▼
//!                                   EV + PositionSizer ▶ Trade   Analysis
//! ```

use regex::Regex;
use serde::Serialize;

use crate::engine::{
    EmotionAnalysis, EmotionFilter, EmotionSignals, EmotionTracker, EvAnalysis,
    ExpectedValueCalculator, MarketAnalyzer, Recommendation,
};
use crate::error::Result;
use crate::model::{Candle, MarketContext, Side, TradeSetup};
use crate::sizing::{PositionPlan, PositionSizer, to_decimal};

/// Plain or comma-grouped number, optional decimals
const PRICE: &str = r"(\d+(?:,\d{3})*(?:\.\d+)?)";

/// One user request to the advisor
#[derive(Clone, Debug, Default)]
pub struct AdvisorRequest {
    pub message: String,
    /// Symbol used for extracted setups, `UNKNOWN` when absent
    pub symbol: Option<String>,
    /// Time-ascending candles for context, may be empty
    pub candles: Vec<Candle>,
    pub signals: EmotionSignals,
}

impl AdvisorRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn with_candles(mut self, candles: Vec<Candle>) -> Self {
        self.candles = candles;
        self
    }

    pub fn with_signals(mut self, signals: EmotionSignals) -> Self {
        self.signals = signals;
        self
    }
}

/// Outcome of [`RationalAdvisor::process`]
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdvisorVerdict {
    /// Too many blocked requests in a row
    ForceBreak {
        emotion: EmotionAnalysis,
        consecutive_blocks: u32,
    },
    Blocked {
        emotion: EmotionAnalysis,
    },
    /// Emotional, but below the blocking threshold
    Emotional {
        emotion: EmotionAnalysis,
    },
    Trade {
        setup: TradeSetup,
        analysis: EvAnalysis,
        context: Option<MarketContext>,
        /// Only for entries, and only when the prices can be sized
        plan: Option<PositionPlan>,
    },
    Analysis {
        context: Option<MarketContext>,
    },
}

impl AdvisorVerdict {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ForceBreak { .. } => "force_break",
            Self::Blocked { .. } => "blocked",
            Self::Emotional { .. } => "emotional",
            Self::Trade { .. } => "trade",
            Self::Analysis { .. } => "analysis",
        }
    }

    /// Whether the request was stopped before any market analysis
    pub const fn is_gated(&self) -> bool {
        matches!(
            self,
            Self::ForceBreak { .. } | Self::Blocked { .. } | Self::Emotional { .. }
        )
    }

    /// Plain-text response body
    pub fn render(&self) -> String {
        match self {
            Self::ForceBreak {
                emotion,
                consecutive_blocks,
            } => render_force_break(emotion, *consecutive_blocks),
            Self::Blocked { emotion } => {
                format!("🚫 This request was blocked.\n\n{}", emotion.report())
            }
            Self::Emotional { emotion } => emotion.report(),
            Self::Trade {
                setup,
                analysis,
                context,
                plan,
            } => match analysis.recommendation {
                Recommendation::Enter => render_entry(setup, analysis, plan.as_ref()),
                Recommendation::Skip => render_skip(setup, analysis, context.as_ref()),
                Recommendation::Wait => render_wait(analysis),
            },
            Self::Analysis { context } => render_analysis(context.as_ref()),
        }
    }
}

/// Entry/stop/target extractors for free-text messages
#[derive(Clone, Debug)]
struct SetupPatterns {
    entry: Regex,
    stop: Regex,
    target: Regex,
}

impl SetupPatterns {
    fn new() -> Result<Self> {
        let keyword = |words: &str| Regex::new(&format!(r"(?i)(?:{words}).*?{PRICE}"));

        Ok(Self {
            entry: keyword("진입|entry")?,
            stop: keyword("손절|stop")?,
            target: keyword("목표|target")?,
        })
    }
}

fn capture_price(pattern: &Regex, text: &str) -> Option<f64> {
    let raw = pattern.captures(text)?.get(1)?.as_str();
    raw.replace(',', "").parse().ok()
}

/// Rule-based advisor; one instance serves every session
#[derive(Clone, Debug)]
pub struct RationalAdvisor {
    analyzer: MarketAnalyzer,
    calculator: ExpectedValueCalculator,
    filter: EmotionFilter,
    sizer: PositionSizer,
    patterns: SetupPatterns,
}

impl RationalAdvisor {
    pub fn new(sizer: PositionSizer) -> Result<Self> {
        Ok(Self {
            analyzer: MarketAnalyzer::new(),
            calculator: ExpectedValueCalculator::new(),
            filter: EmotionFilter::new()?,
            sizer,
            patterns: SetupPatterns::new()?,
        })
    }

    pub const fn analyzer(&self) -> &MarketAnalyzer {
        &self.analyzer
    }

    pub const fn calculator(&self) -> &ExpectedValueCalculator {
        &self.calculator
    }

    pub const fn filter(&self) -> &EmotionFilter {
        &self.filter
    }

    pub const fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    pub fn process(
        &self,
        tracker: &mut EmotionTracker,
        request: &AdvisorRequest,
    ) -> AdvisorVerdict {
        let emotion = self.filter.analyze_request(&request.message, &request.signals);
        tracker.record(&emotion);

        if tracker.should_force_break() {
            return AdvisorVerdict::ForceBreak {
                consecutive_blocks: tracker.consecutive_blocks(),
                emotion,
            };
        }

        if !emotion.is_rational {
            tracing::info!(
                session_id = %tracker.session_id(),
                score = emotion.emotion_score,
                blocked = emotion.should_block,
                "emotional request"
            );
            return if emotion.should_block {
                AdvisorVerdict::Blocked { emotion }
            } else {
                AdvisorVerdict::Emotional { emotion }
            };
        }

        let context = (!request.candles.is_empty())
            .then(|| self.analyzer.analyze(&request.candles));

        let symbol = request.symbol.as_deref().unwrap_or("UNKNOWN");
        let Some(setup) = self.extract_trade_setup(&request.message, symbol) else {
            return AdvisorVerdict::Analysis { context };
        };

        let analysis = self.calculator.analyze(&setup, context.as_ref());
        let plan = match analysis.recommendation {
            Recommendation::Enter => self.size(&setup, &analysis),
            Recommendation::Skip | Recommendation::Wait => None,
        };

        tracing::info!(
            session_id = %tracker.session_id(),
            symbol = %setup.symbol,
            recommendation = analysis.recommendation.as_str(),
            "trade evaluated"
        );

        AdvisorVerdict::Trade {
            setup,
            analysis,
            context,
            plan,
        }
    }

    /// Pull entry, stop and target prices out of a message
    ///
    /// Accepts `진입 100,000,000원 손절 97,000,000원 목표 109,000,000원` as well
    /// as `entry 3000 stop 3090 target 2820`. The side is long when the target
    /// sits above the entry.
    pub fn extract_trade_setup(&self, message: &str, symbol: &str) -> Option<TradeSetup> {
        let entry = capture_price(&self.patterns.entry, message)?;
        let stop = capture_price(&self.patterns.stop, message)?;
        let target = capture_price(&self.patterns.target, message)?;

        let side = if target > entry { Side::Long } else { Side::Short };
        TradeSetup::new(symbol, side, entry, stop, target).ok()
    }

    fn size(&self, setup: &TradeSetup, analysis: &EvAnalysis) -> Option<PositionPlan> {
        self.try_size(setup, analysis)
            .inspect_err(|err| {
                tracing::warn!(symbol = %setup.symbol, %err, "could not size position");
            })
            .ok()
    }

    /// Risk-based size, capped at the Kelly-derived share of capital
    fn try_size(&self, setup: &TradeSetup, analysis: &EvAnalysis) -> Result<PositionPlan> {
        self.sizer.calculate_capped(
            to_decimal("entry_price", setup.entry_price)?,
            to_decimal("stop_loss", setup.stop_loss)?,
            Some(to_decimal("take_profit", setup.take_profit)?),
            to_decimal("optimal_position_pct", analysis.optimal_position_pct)?,
        )
    }
}

fn bullets(lines: &[String]) -> String {
    lines.iter().map(|l| format!("- {l}\n")).collect()
}

fn render_force_break(emotion: &EmotionAnalysis, streak: u32) -> String {
    let mut s = String::from("## 🛑 Time for a break\n\n");
    s.push_str(&format!(
        "{streak} emotional requests in a row were blocked. Trading decisions made \
         in this state are rarely good ones.\n\n"
    ));
    s.push_str("### 🧘 What to do now\n");
    s.push_str("1. Close the charts and step away for at least 30 minutes\n");
    s.push_str("2. Write down why you wanted to trade just now\n");
    s.push_str("3. Come back with an entry, a stop and a target decided in advance\n\n");
    s.push_str(&format!(
        "📈 Last emotion score: {:.0}/100\n",
        emotion.emotion_score * 100.0
    ));
    s.push_str("> The market will still be there tomorrow. Your capital might not.\n");
    s
}

fn render_entry(setup: &TradeSetup, ev: &EvAnalysis, plan: Option<&PositionPlan>) -> String {
    let mut s = format!("## ✅ Trade recommended: {} {}\n\n", setup.symbol, setup.side);

    s.push_str("### 📊 Analysis\n");
    s.push_str("| Metric | Value | Rating |\n|---|---|---|\n");
    s.push_str(&format!(
        "| Expected value | **{:+.2}%** | {} |\n",
        ev.expected_value,
        if ev.expected_value > 1.0 { "✅ good" } else { "⚠️ fair" }
    ));
    s.push_str(&format!(
        "| Risk/reward | **1:{:.1}** | {} |\n",
        ev.risk_reward_ratio,
        if ev.risk_reward_ratio >= 2.0 { "✅ excellent" } else { "✅ good" }
    ));
    s.push_str(&format!(
        "| Win probability | **{:.0}%** | {} |\n",
        ev.win_probability * 100.0,
        if ev.win_probability > 0.55 { "✅ high" } else { "⚠️ fair" }
    ));
    s.push_str(&format!("| Confidence | **{}** | |\n\n", ev.confidence.as_str()));

    s.push_str("### ✅ Execution plan\n");
    s.push_str(&format!("- **Entry**: {:.2}\n", setup.entry_price));
    s.push_str(&format!(
        "- **Stop loss**: {:.2} (risk {:.1}%)\n",
        setup.stop_loss, setup.risk_percent
    ));
    s.push_str(&format!(
        "- **Target**: {:.2} (+{:.1}%)\n",
        setup.take_profit, setup.reward_percent
    ));
    match plan {
        Some(plan) => {
            s.push_str(&format!(
                "- **Position**: {:.8} units, {:.0} ({:.1}% of capital)\n",
                plan.quantity, plan.position_value, plan.position_pct
            ));
            s.push_str(&format!("- **Max loss**: {:.0}\n\n", plan.risk_amount));
        }
        None => s.push_str(&format!(
            "- **Position**: at most {:.1}% of capital\n\n",
            ev.optimal_position_pct
        )),
    }

    s.push_str("### 📈 Reasoning\n");
    s.push_str(&bullets(&ev.reasoning));
    s.push_str("\n### ⚠️ Caution\n");
    s.push_str("- If the stop is hit, **exit**. No exceptions.\n");
    s.push_str("- Re-check the plan if market conditions change sharply\n");
    s.push_str("- This is a probabilistic estimate; losses remain possible\n");
    s
}

fn render_skip(setup: &TradeSetup, ev: &EvAnalysis, context: Option<&MarketContext>) -> String {
    let support = context
        .map(|c| c.nearest_support)
        .filter(|price| *price > 0.0)
        .unwrap_or(setup.entry_price * 0.95);

    let mut s = String::from("## ❌ This trade is not recommended\n\n");
    s.push_str("### 📊 Analysis\n");
    s.push_str("| Metric | Value | Problem |\n|---|---|---|\n");
    s.push_str(&format!(
        "| Expected value | **{:+.2}%** | {} |\n",
        ev.expected_value,
        if ev.expected_value < 0.0 { "❌ negative" } else { "⚠️ too low" }
    ));
    s.push_str(&format!(
        "| Risk/reward | **1:{:.1}** | {} |\n",
        ev.risk_reward_ratio,
        if ev.risk_reward_ratio < 1.0 { "❌ unfavourable" } else { "⚠️ low" }
    ));
    s.push_str(&format!(
        "| Win probability | **{:.0}%** | {} |\n\n",
        ev.win_probability * 100.0,
        if ev.win_probability < 0.4 { "❌ low" } else { "" }
    ));

    s.push_str("### 🚫 Why not\n");
    s.push_str(&bullets(&ev.reasoning));
    s.push_str("\n### 💡 Alternatives\n");
    s.push_str(&format!(
        "1. **Wait for a better entry**: re-check if price pulls back to the {support:.2} support\n"
    ));
    s.push_str("2. **Improve the ratio**: tighter stop, further target\n");
    s.push_str("3. **Look elsewhere**: find a setup with clearly positive expected value\n\n");
    s.push_str("> Good traders do not take every trade. They take the ones with an edge.\n");
    s
}

fn render_wait(ev: &EvAnalysis) -> String {
    let mut s = String::from("## ⏸️ Wait until conditions improve\n\n");
    s.push_str("### 📊 Analysis\n");
    s.push_str("| Metric | Value | Status |\n|---|---|---|\n");
    s.push_str(&format!(
        "| Expected value | **{:+.2}%** | {} |\n",
        ev.expected_value,
        if ev.expected_value < 1.0 { "⚠️ low" } else { "✅" }
    ));
    s.push_str(&format!(
        "| Risk/reward | **1:{:.1}** | {} |\n",
        ev.risk_reward_ratio,
        if ev.risk_reward_ratio < 1.5 { "⚠️ needs work" } else { "✅" }
    ));
    s.push_str(&format!(
        "| Win probability | **{:.0}%** | {} |\n\n",
        ev.win_probability * 100.0,
        if ev.win_probability < 0.45 { "⚠️ low" } else { "✅" }
    ));

    s.push_str("### 📋 Why wait\n");
    s.push_str(&bullets(&ev.reasoning));
    s.push_str("\n### ⏰ Re-check when\n");
    s.push_str("1. RSI drops below 50\n");
    s.push_str("2. A price level offers at least 1:2 risk/reward\n");
    s.push_str("3. Price tests support on rising volume\n");
    s
}

fn render_analysis(context: Option<&MarketContext>) -> String {
    let mut s = String::from("## 📊 Market overview\n\n");
    match context {
        Some(context) => {
            s.push_str(&context.brief());
            s.push_str("\n\n");
            s.push_str(&bullets(&context.reasoning));
        }
        None => s.push_str("No market data.\n"),
    }
    s.push_str(
        "\n💡 Include an entry, a stop and a target price to get an expected-value verdict.\n",
    );
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Emotion;
    use chrono::{DateTime, Duration};
    use rust_decimal_macros::dec;

    fn advisor() -> RationalAdvisor {
        RationalAdvisor::new(PositionSizer::new(dec!(1_000_000), dec!(0.02)).unwrap()).unwrap()
    }

    /// +0.5% per hourly bar with thin wicks
    fn uptrend(n: usize) -> Vec<Candle> {
        let start = DateTime::from_timestamp(1_704_067_200, 0).unwrap();
        (0..n)
            .map(|i| {
                let open = 100.0 * 1.005_f64.powi(i as i32);
                let close = open * 1.005;
                let at = start + Duration::hours(i as i64);
                Candle::new(at, open, close * 1.002, open * 0.998, close, 1000.0)
            })
            .collect()
    }

    #[test]
    fn test_extracts_korean_setup() {
        let setup = advisor()
            .extract_trade_setup("BTC 진입 100,000,000원 손절 97,000,000원 목표 109,000,000원", "BTC")
            .unwrap();
        assert_eq!(setup.side, Side::Long);
        assert_eq!(setup.entry_price, 100_000_000.0);
        assert_eq!(setup.stop_loss, 97_000_000.0);
        assert_eq!(setup.take_profit, 109_000_000.0);
    }

    #[test]
    fn test_extracts_english_short_setup() {
        let setup = advisor()
            .extract_trade_setup("ETH Entry 3000, stop 3090.5, target 2820", "ETH")
            .unwrap();
        assert_eq!(setup.side, Side::Short);
        assert_eq!(setup.entry_price, 3000.0);
        assert_eq!(setup.stop_loss, 3090.5);
        assert_eq!(setup.take_profit, 2820.0);
    }

    #[test]
    fn test_incomplete_setup_is_none() {
        let advisor = advisor();
        assert!(advisor.extract_trade_setup("entry 3000 stop 2900", "ETH").is_none());
        assert!(advisor.extract_trade_setup("what about BTC?", "BTC").is_none());
        assert!(advisor.extract_trade_setup("entry 0 stop 10 target 20", "BTC").is_none());
    }

    #[test]
    fn test_rational_trade_is_evaluated_and_sized() {
        let advisor = advisor();
        let mut tracker = EmotionTracker::new();
        let request = AdvisorRequest::new("BTC 진입 100,000,000원 손절 97,000,000원 목표 109,000,000원")
            .with_symbol("BTC");

        let verdict = advisor.process(&mut tracker, &request);
        assert_eq!(verdict.kind(), "trade");
        assert!(!verdict.is_gated());

        let AdvisorVerdict::Trade { setup, analysis, context, plan } = &verdict else {
            panic!("expected a trade verdict");
        };
        assert_eq!(setup.symbol, "BTC");
        assert!(context.is_none());
        assert_eq!(analysis.recommendation, Recommendation::Enter);
        assert!(analysis.expected_value > 0.0);
        assert!(analysis.optimal_position_pct <= 5.0);

        let plan = plan.as_ref().unwrap();
        assert_eq!(plan.side, Side::Long);
        assert_eq!(plan.risk_amount, dec!(20000));
        assert!(plan.position_pct <= dec!(5));

        let body = verdict.render();
        assert!(body.contains("Trade recommended: BTC long"));
        assert!(body.contains("Max loss"));
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_losing_setup_is_skipped_without_plan() {
        let verdict = advisor().process(
            &mut EmotionTracker::new(),
            &AdvisorRequest::new("entry 100 stop 90 target 105").with_symbol("SOL"),
        );

        let AdvisorVerdict::Trade { analysis, plan, .. } = &verdict else {
            panic!("expected a trade verdict");
        };
        assert_eq!(analysis.recommendation, Recommendation::Skip);
        assert!(plan.is_none());

        let body = verdict.render();
        assert!(body.contains("not recommended"));
        // No context: support falls back to 5% under entry
        assert!(body.contains("95.00 support"));
    }

    #[test]
    fn test_question_without_setup_gets_analysis() {
        let advisor = advisor();
        let mut tracker = EmotionTracker::new();

        let bare = advisor.process(&mut tracker, &AdvisorRequest::new("how does BTC look?"));
        assert!(matches!(bare, AdvisorVerdict::Analysis { context: None }));
        assert!(bare.render().contains("No market data"));

        let request = AdvisorRequest::new("how does BTC look?").with_candles(uptrend(120));
        let verdict = advisor.process(&mut tracker, &request);
        let AdvisorVerdict::Analysis { context: Some(context) } = &verdict else {
            panic!("expected analysis with context");
        };
        assert!(context.bullish_score > context.bearish_score);
        assert!(verdict.render().contains("Regime:"));
    }

    #[test]
    fn test_candles_feed_the_evaluation() {
        let request = AdvisorRequest::new("entry 181 stop 175 target 199")
            .with_symbol("SOL")
            .with_candles(uptrend(120));

        let verdict = advisor().process(&mut EmotionTracker::new(), &request);
        let AdvisorVerdict::Trade { analysis, context, .. } = verdict else {
            panic!("expected a trade verdict");
        };
        assert!(context.is_some());
        assert_ne!(analysis.breakdown.trend_alignment, 0.5);
    }

    #[test]
    fn test_emotional_request_is_gated() {
        let advisor = advisor();
        let mut tracker = EmotionTracker::new();

        let verdict = advisor.process(
            &mut tracker,
            &AdvisorRequest::new("이건 무조건 간다 올인해야지 레버리지 20배로 entry 100 stop 95 target 120"),
        );
        let AdvisorVerdict::Emotional { emotion } = &verdict else {
            panic!("expected an emotional verdict");
        };
        assert_eq!(emotion.detected_emotions, vec![Emotion::Overconfidence]);
        assert!(verdict.is_gated());
        assert!(verdict.render().contains("Caution required"));
    }

    #[test]
    fn test_three_blocks_force_a_break() {
        let advisor = advisor();
        let mut tracker = EmotionTracker::new();
        let request = AdvisorRequest::new("무조건 올인 레버리지 20배 대박 한방 로또");

        for _ in 0..2 {
            let verdict = advisor.process(&mut tracker, &request);
            assert_eq!(verdict.kind(), "blocked");
            assert!(verdict.render().starts_with("🚫"));
        }

        let verdict = advisor.process(&mut tracker, &request);
        let AdvisorVerdict::ForceBreak { consecutive_blocks, .. } = &verdict else {
            panic!("expected a forced break");
        };
        assert_eq!(*consecutive_blocks, 3);
        assert!(verdict.render().contains("Time for a break"));

        // A calm request resets the streak
        let calm = advisor.process(&mut tracker, &AdvisorRequest::new("how does BTC look?"));
        assert_eq!(calm.kind(), "analysis");
        assert_eq!(tracker.consecutive_blocks(), 0);
    }

    #[test]
    fn test_verdict_serializes_with_kind_tag() {
        let verdict = advisor().process(&mut EmotionTracker::new(), &AdvisorRequest::new("hello"));
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["kind"], "analysis");
        assert!(json["context"].is_null());
    }
}

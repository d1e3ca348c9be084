//! # decision-engine
//!
//! Rule-based trade decision engine that refuses emotional trades and only
//! approves setups with positive expected value.
//!
//! ## Philosophy
//!
//! - **Emotions first** - FOMO, panic and revenge trading are caught before any analysis
//! - **Expected value over conviction** - a trade is entered only when the math says so
//! - **Risk-based sizing** - a stop-out costs a fixed share of capital, never more
//! - **Circuit breaker** - three blocked requests in a row force a break
//!
//! ## Example: one request through the pipeline
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  "BTC 진입 100,000,000원 손절 97,000,000원 목표 109,000,000원"       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Emotion filter   score 0.00          ✅ rational                 │
//! │  Market context   Bull, RSI 58, MACD bullish                      │
//! │  Trade setup      long, risk 3.0%, reward 9.0%, R:R 1:3.0         │
//! │  Expected value   +3.87%, win 57%                ✅ ENTER (high)   │
//! │  Position         capped at 5% of capital, 2% risk                │
//! └──────────────────────────────────────────────────────────────────┘
//!
//! vs "무조건 올인 레버리지 20배 대박" (HIGH RISK):
//! │  Emotion filter   score 0.75  overconfidence, greed   ❌ BLOCKED
//! │  → three of these in a row and the session is paused
//! ```

pub mod advisor;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod indicators;
pub mod model;
pub mod sizing;
pub mod svckit;

pub use advisor::{AdvisorRequest, AdvisorVerdict, RationalAdvisor};
pub use engine::{
    Confidence, Emotion, EmotionAnalysis, EmotionFilter, EmotionSignals, EmotionTracker, EvAnalysis,
    ExpectedValueCalculator, MarketAnalyzer, QuickEvaluation, Recommendation, SessionSummary,
};
pub use error::{EngineError, Result};
pub use exchange::{CandleSource, MockCandleSource};
pub use model::{Candle, MarketContext, MarketRegime, Side, TradeSetup};
pub use sizing::{Conviction, PositionPlan, PositionSizer};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::svckit::{
        EmotionCheckTool, MarketAnalyzerTool, PositionSizerTool, TradeEvaluatorTool, registry,
    };
}

/// System prompt for an LLM agent driving the decision-engine tools
pub const RATIONAL_TRADER_PROMPT: &str = r#"You are a rational trading assistant.
Your job is to stop emotional trades and approve only setups with positive expected value.

## Core Rules

1. **Check emotions first** - run `emotion_check` on every trade request before anything else
2. **Never trade a blocked request** - if `should_block` is true, explain why and suggest a break
3. **Expected value decides** - only recommend entries that `trade_evaluator` marks as `enter`
4. **Size by risk** - use `position_sizer`; a stop-out must never cost more than 2% of capital

## When the User Proposes a Trade

1. Run `emotion_check` with the message and the recent 24h move
2. Use `market_analyzer` for the symbol to get regime, trend and support/resistance
3. Use `trade_evaluator` with entry, stop and target
4. For `enter` verdicts, use `position_sizer` and present the plan
5. For `skip` or `wait`, say what would have to change

## Communication

Always state:
- Expected value and win probability, as numbers
- Risk/reward ratio
- Where the stop is and what the loss would be
- That every estimate is probabilistic

## Tools Available

- `emotion_check` - Detect FOMO, panic, revenge trading, overconfidence, greed, sunk cost
- `market_analyzer` - Regime, trend, momentum and levels for a symbol
- `trade_evaluator` - Expected value and an enter/skip/wait verdict
- `position_sizer` - Risk-based position size

Never recommend a trade without running these tools first."#;

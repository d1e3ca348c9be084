//! Decision Engine
//!
//! ```text
//! free text ──► EmotionFilter ──(rational)──► candles ──► MarketAnalyzer
//!                    │                                        │ MarketContext
//!                    ▼                                        ▼
//!              EmotionTracker              TradeSetup ──► ExpectedValueCalculator
//!                                                             │
//!                                                             ▼
//!                                                   EvAnalysis (ENTER/SKIP/WAIT)
//! ```

mod emotion_filter;
mod emotion_tracker;
mod expected_value;
mod market_analyzer;

pub use emotion_filter::{
    Emotion, EmotionAnalysis, EmotionFilter, EmotionSignals, MarketMove, TradeOutcome,
};
pub use emotion_tracker::{EmotionRecord, EmotionTracker, SessionSummary};
pub use expected_value::{
    Confidence, EvAnalysis, ExpectedValueCalculator, PatternKind, QuickEvaluation,
    Recommendation, WinProbabilityBreakdown,
};
pub use market_analyzer::MarketAnalyzer;

/// Closed interval used for every clamped score
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Bounds {
    pub lo: f64,
    pub hi: f64,
}

impl Bounds {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn clamp(self, value: f64) -> f64 {
        value.max(self.lo).min(self.hi)
    }
}

#[cfg(test)]
mod tests {
    use super::Bounds;

    #[test]
    fn test_bounds_clamp() {
        let b = Bounds::new(0.2, 0.8);
        assert_eq!(b.clamp(0.1), 0.2);
        assert_eq!(b.clamp(0.9), 0.8);
        assert_eq!(b.clamp(0.5), 0.5);
    }
}

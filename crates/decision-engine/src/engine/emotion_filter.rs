//! Emotion Filter
//!
//! Flags emotionally driven trade requests (FOMO, panic, revenge trading,
//! overconfidence, greed, averaging down) from the user's own words and
//! steers them toward a rational alternative.

use std::collections::BTreeMap;

use chrono::Duration;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const FOMO_PATTERNS: &[&str] = &[
    r"지금 안 사면",
    r"놓치",
    r"늦기 전에",
    r"다들 사",
    r"급등",
    r"폭등",
    r"더 오르기 전에",
    r"올라가는데",
    r"달리는데",
    r"펌핑",
    r"미친듯이 오르",
    r"지금 들어가야",
    r"기회를 놓",
    r"빨리 사",
    r"얼른 사",
    r"지금이 마지막",
    r"못 타",
    r"뒤늦게",
];

const FEAR_PATTERNS: &[&str] = &[
    r"폭락",
    r"급락",
    r"망했",
    r"다 팔아",
    r"전부 정리",
    r"더 떨어지기 전에",
    r"물렸",
    r"어떡해",
    r"손절해야",
    r"다 날아가",
    r"끝났",
    r"바닥이 없",
    r"무섭",
    r"공포",
    r"패닉",
    r"지옥",
    r"나락",
];

const REVENGE_PATTERNS: &[&str] = &[
    r"복구",
    r"원금 회복",
    r"만회",
    r"본전",
    r"다시 들어가",
    r"손실 메꾸",
    r"잃은 거 되찾",
    r"방금 손절.*다시",
    r"털리.*재진입",
    r"원금으로",
    r"찾아야",
];

const OVERCONFIDENCE_PATTERNS: &[&str] = &[
    r"올인",
    r"전재산",
    r"몰빵",
    r"레버리지",
    r"10배",
    r"20배",
    r"100배",
    r"확실",
    r"무조건",
    r"절대",
    r"100%",
    r"반드시",
    r"틀림없",
    r"무조건 오른다",
    r"무조건 간다",
];

const GREED_PATTERNS: &[&str] = &[
    r"10배",
    r"100배",
    r"대박",
    r"한방",
    r"인생역전",
    r"부자",
    r"떡상",
    r"달나라",
    r"억만장자",
    r"x100",
    r"x10",
    r"로또",
];

const SUNK_COST_PATTERNS: &[&str] = &[
    r"물타기",
    r"추가 매수.*-",
    r"평단.*낮추",
    r"물렸는데.*더 사",
    r"손실.*추가",
    r"평균 단가",
    r"비중 늘",
];

const LEVERAGE_PATTERN: &str = r"(레버리지|10배|20배|100배)";

/// Emotional bias category. Declaration order is the advice priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Fomo,
    Fear,
    Revenge,
    Overconfidence,
    Greed,
    SunkCost,
}

impl Emotion {
    /// Priority order
    pub const ALL: [Self; 6] = [
        Self::Fomo,
        Self::Fear,
        Self::Revenge,
        Self::Overconfidence,
        Self::Greed,
        Self::SunkCost,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fomo => "fomo",
            Self::Fear => "fear",
            Self::Revenge => "revenge",
            Self::Overconfidence => "overconfidence",
            Self::Greed => "greed",
            Self::SunkCost => "sunk_cost",
        }
    }

    /// Contribution of a saturated category to the emotion score
    pub const fn weight(self) -> f64 {
        match self {
            Self::Fomo | Self::Fear => 0.25,
            Self::Revenge => 0.30,
            Self::Overconfidence => 0.35,
            Self::Greed | Self::SunkCost => 0.20,
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Fomo => "FOMO (fear of missing out)",
            Self::Fear => "Fear (loss panic)",
            Self::Revenge => "Revenge trading",
            Self::Overconfidence => "Overconfidence",
            Self::Greed => "Greed",
            Self::SunkCost => "Sunk cost (averaging down)",
        }
    }

    const fn patterns(self) -> &'static [&'static str] {
        match self {
            Self::Fomo => FOMO_PATTERNS,
            Self::Fear => FEAR_PATTERNS,
            Self::Revenge => REVENGE_PATTERNS,
            Self::Overconfidence => OVERCONFIDENCE_PATTERNS,
            Self::Greed => GREED_PATTERNS,
            Self::SunkCost => SUNK_COST_PATTERNS,
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recent market movement
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMove {
    /// % change over 24h
    pub change_24h: f64,
}

/// Result of the user's previous trade
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub pnl: f64,
    #[serde(default)]
    pub pnl_pct: Option<f64>,
}

/// Context that corroborates what the text says
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmotionSignals {
    pub recent_market_move: Option<MarketMove>,
    pub last_trade: Option<TradeOutcome>,
    pub time_since_last_trade: Option<Duration>,
}

impl EmotionSignals {
    pub fn with_market_move(mut self, change_24h: f64) -> Self {
        self.recent_market_move = Some(MarketMove { change_24h });
        self
    }

    pub fn with_last_trade(mut self, pnl: f64, pnl_pct: Option<f64>) -> Self {
        self.last_trade = Some(TradeOutcome { pnl, pnl_pct });
        self
    }

    pub fn with_time_since_last_trade(mut self, elapsed: Duration) -> Self {
        self.time_since_last_trade = Some(elapsed);
        self
    }

    fn change_24h(&self) -> Option<f64> {
        self.recent_market_move.map(|m| m.change_24h)
    }
}

/// Outcome of [`EmotionFilter::analyze_request`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionAnalysis {
    pub detected_emotions: Vec<Emotion>,
    /// 0-1, higher is more emotional
    pub emotion_score: f64,
    pub is_rational: bool,
    pub warnings: Vec<String>,
    pub should_block: bool,
    pub alternative_advice: String,
    /// Per-category match score (0-1) for detected categories
    pub emotion_details: BTreeMap<Emotion, f64>,
}

impl EmotionAnalysis {
    /// Warning report, or a one-line acknowledgement for rational requests
    pub fn report(&self) -> String {
        if self.is_rational {
            return "✅ Request looks rational. Proceeding with analysis.".to_string();
        }

        let rule = "=".repeat(50);
        let mut lines = vec![
            rule.clone(),
            "⚠️ Emotional trading warning".to_string(),
            rule.clone(),
            String::new(),
            "📊 Detected emotions:".to_string(),
        ];

        for emotion in &self.detected_emotions {
            let score = self.emotion_details.get(emotion).copied().unwrap_or(0.0) * 100.0;
            lines.push(format!("   - {}: {score:.0}%", emotion.display_name()));
        }

        lines.push(String::new());
        lines.push(format!("📈 Overall emotion score: {:.0}/100", self.emotion_score * 100.0));
        let verdict = if self.should_block { "❌ Trade blocked" } else { "⚠️ Caution required" };
        lines.push(verdict.to_string());
        lines.push(String::new());

        if !self.warnings.is_empty() {
            lines.push("⚠️ Warnings:".to_string());
            lines.extend(self.warnings.iter().map(|w| format!("   {w}")));
            lines.push(String::new());
        }

        lines.push("💡 Recommended action:".to_string());
        lines.push(format!("   {}", self.alternative_advice));
        lines.push(String::new());
        lines.push(rule);

        lines.join("\n")
    }
}

/// Pattern-based emotion detector
///
/// Compiled once and shared; analysis takes `&self`.
#[derive(Clone, Debug)]
pub struct EmotionFilter {
    categories: Vec<(Emotion, RegexSet)>,
    leverage: Regex,
}

impl EmotionFilter {
    /// Below this score a request is rational
    pub const RATIONAL_THRESHOLD: f64 = 0.25;
    /// At or above this score a request is blocked
    pub const BLOCK_THRESHOLD: f64 = 0.6;
    /// Matches that saturate a category
    pub const SATURATION_MATCHES: usize = 3;

    pub fn new() -> Result<Self> {
        let categories = Emotion::ALL
            .iter()
            .map(|&emotion| Ok((emotion, RegexSet::new(emotion.patterns())?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            categories,
            leverage: Regex::new(LEVERAGE_PATTERN)?,
        })
    }

    pub fn analyze_request(&self, text: &str, signals: &EmotionSignals) -> EmotionAnalysis {
        let message = text.to_lowercase();
        let change_24h = signals.change_24h();

        let mut detected = Vec::new();
        let mut details = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut total = 0.0;

        for (emotion, set) in &self.categories {
            let score = Self::category_score(set, &message);
            if score <= 0.0 {
                continue;
            }

            detected.push(*emotion);
            details.insert(*emotion, score);
            total += score * emotion.weight();
            total += self.corroborate(*emotion, &message, signals, &mut warnings);
        }

        let emotion_score = total.min(1.0);
        let is_rational = emotion_score < Self::RATIONAL_THRESHOLD;
        let should_block = emotion_score >= Self::BLOCK_THRESHOLD;
        let alternative_advice = alternative_advice(&detected, emotion_score, change_24h);

        if should_block {
            tracing::warn!(emotion_score, emotions = ?detected, "emotional request blocked");
        } else {
            tracing::debug!(emotion_score, emotions = ?detected, "emotion analysis");
        }

        EmotionAnalysis {
            detected_emotions: detected,
            emotion_score,
            is_rational,
            warnings,
            should_block,
            alternative_advice,
            emotion_details: details,
        }
    }

    fn category_score(set: &RegexSet, message: &str) -> f64 {
        let matches = set.matches(message).iter().count();
        (matches as f64 / Self::SATURATION_MATCHES as f64).min(1.0)
    }

    /// Category warnings plus any score boost from corroborating signals
    fn corroborate(
        &self,
        emotion: Emotion,
        message: &str,
        signals: &EmotionSignals,
        warnings: &mut Vec<String>,
    ) -> f64 {
        let change = signals.change_24h();

        match emotion {
            Emotion::Fomo => match change {
                Some(c) if c > 10.0 => {
                    warnings.push(format!(
                        "🚨 FOMO detected: already up {c:.1}% in 24 hours. \
                         The risk of buying the top is very high."
                    ));
                    0.2
                }
                Some(c) if c > 5.0 => {
                    warnings.push(
                        "⚠️ FOMO caution: entering right after a pump is risky. \
                         Wait for a pullback."
                            .to_string(),
                    );
                    0.0
                }
                _ => 0.0,
            },
            Emotion::Fear => {
                warnings.push(
                    "🚨 Panic selling detected: selling into a crash is often the worst timing. \
                     Check the stop loss you originally planned."
                        .to_string(),
                );
                if let Some(c) = change.filter(|&c| c < -10.0) {
                    warnings.push(format!(
                        "   The market really is down {:.1}%, \
                         but selling at the bottom locks in the loss.",
                        c.abs()
                    ));
                }
                0.0
            }
            Emotion::Revenge => {
                let mut boost = 0.0;
                if let Some(trade) = signals.last_trade.filter(|t| t.pnl < 0.0) {
                    let loss = trade.pnl_pct.unwrap_or(trade.pnl).abs();
                    warnings.push(format!(
                        "🚨 Revenge trading detected: the last trade lost {loss:.1}%. \
                         An emotional re-entry can deepen the loss."
                    ));
                    boost += 0.25;
                }
                let recent = signals.time_since_last_trade.filter(|&t| t < Duration::hours(4));
                if let Some(elapsed) = recent {
                    let hours = elapsed.num_seconds() as f64 / 3600.0;
                    warnings.push(format!(
                        "   Only {hours:.1} hours since the last trade. \
                         Wait at least 4 hours before reviewing again."
                    ));
                    boost += 0.1;
                }
                boost
            }
            Emotion::Overconfidence => {
                warnings.push(
                    "🚨 Overconfidence detected: there is no such thing as a sure trade. \
                     Never risk more than 2% of capital."
                        .to_string(),
                );
                if self.leverage.is_match(message) {
                    warnings.push(
                        "   ⛔ Leverage magnifies losses. \
                         Professionals go bust with leverage too."
                            .to_string(),
                    );
                    0.2
                } else {
                    0.0
                }
            }
            Emotion::Greed => {
                warnings.push(
                    "⚠️ Greed detected: unrealistic return targets lead to excessive risk. \
                     Set a realistic goal (3-5% a month)."
                        .to_string(),
                );
                0.0
            }
            Emotion::SunkCost => {
                warnings.push(
                    "⚠️ Averaging-down caution: \
                     adding money to a losing position doubles the risk. \
                     Cutting the loss and looking for a new setup is better."
                        .to_string(),
                );
                0.0
            }
        }
    }
}

/// Advice for the highest-priority detected emotion, not the highest-scoring one
fn alternative_advice(detected: &[Emotion], score: f64, change_24h: Option<f64>) -> String {
    let first = Emotion::ALL.into_iter().find(|e| detected.contains(e));

    let advice = match first {
        Some(Emotion::Fomo) if change_24h.is_some_and(|c| c > 10.0) => {
            "💡 Alternative: instead of entering now, \
             set staggered buys for when RSI cools below 50. \
             Entries after a pullback average twice the return of entries after a pump. \
             Concretely, place limit buys at -5% and -10% from the current price."
        }
        Some(Emotion::Fomo) => {
            "💡 Alternative: instead of entering now, \
             set staggered buys for the next pullback (-5 to -10%). \
             Entries after a pullback average twice the return of entries after a pump."
        }
        Some(Emotion::Fear) => {
            "💡 Alternative: instead of selling everything, \
             close 50% and keep the rest until your original stop. \
             That preserves the chance of a rebound. Or scale out to raise your average exit price."
        }
        Some(Emotion::Revenge) => {
            "💡 Alternative: take today off and look at the market fresh tomorrow. \
             A 24-hour break after consecutive losses raises the win rate by 15%. \
             Revenge trades statistically win less than 35% of the time."
        }
        Some(Emotion::Overconfidence) => {
            "💡 Alternative: the stronger the conviction, the smaller the position. \
             Start at 50% of your usual size \
             and add once it is in profit. Accounts blow up on 'sure' trades. \
             Cap the risk at 2% of capital."
        }
        Some(Emotion::Greed) => {
            "💡 Alternative: set a realistic target (3-5% a month). Compounding steady gains beats \
             losing the principal while chasing 10x or 100x. Trust the power of compounding."
        }
        Some(Emotion::SunkCost) => {
            "💡 Alternative: instead of averaging down, \
             cut the loss and look for a new opportunity. \
             Adding to a losing position doubles the risk. That money has a higher expected value \
             in a better setup."
        }
        None if score > 0.5 => {
            "💡 Alternative: this is not the right state of mind to trade. \
             Close the charts for 30 minutes and do something else. \
             Then calculate expected value and risk/reward calmly before deciding."
        }
        None => "💡 Decide after calculating expected value from objective data.",
    };

    advice.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn filter() -> EmotionFilter {
        EmotionFilter::new().unwrap()
    }

    #[test]
    fn test_fomo_with_pump_is_not_rational() {
        let signals = EmotionSignals::default().with_market_move(15.0);
        let analysis = filter().analyze_request("비트코인 급등하는데 지금 안 사면 늦겠어!", &signals);

        assert_eq!(analysis.detected_emotions, vec![Emotion::Fomo]);
        // Two FOMO phrases plus the 24h pump boost
        assert!((analysis.emotion_details[&Emotion::Fomo] - 2.0 / 3.0).abs() < EPS);
        assert!((analysis.emotion_score - (2.0 / 3.0 * 0.25 + 0.2)).abs() < EPS);
        assert!(!analysis.is_rational);
        assert!(!analysis.should_block);
        assert!(analysis.warnings[0].contains("15.0%"));
        assert!(analysis.alternative_advice.contains("RSI cools below 50"));
    }

    #[test]
    fn test_plain_question_is_rational() {
        let analysis = filter().analyze_request(
            "BTC RSI가 35인데 지지선 근처에서 매수 검토해볼까?",
            &EmotionSignals::default(),
        );
        assert!(analysis.detected_emotions.is_empty());
        assert_eq!(analysis.emotion_score, 0.0);
        assert!(analysis.is_rational);
        assert!(!analysis.should_block);
        assert!(analysis.warnings.is_empty());
        assert_eq!(analysis.report(), "✅ Request looks rational. Proceeding with analysis.");
    }

    #[test]
    fn test_saturated_categories_contribute_their_weight() {
        let cases = [
            ("놓치 급등 폭등", Emotion::Fomo),
            ("폭락 급락 망했", Emotion::Fear),
            ("복구 만회 본전", Emotion::Revenge),
            ("올인 전재산 몰빵", Emotion::Overconfidence),
            ("대박 한방 로또", Emotion::Greed),
            ("물타기 평균 단가 비중 늘려", Emotion::SunkCost),
        ];
        let filter = filter();

        for (text, emotion) in cases {
            let analysis = filter.analyze_request(text, &EmotionSignals::default());
            assert_eq!(analysis.detected_emotions, vec![emotion], "{text}");
            assert!((analysis.emotion_details[&emotion] - 1.0).abs() < EPS);
            assert!((analysis.emotion_score - emotion.weight()).abs() < EPS, "{text}");
        }
    }

    #[test]
    fn test_leverage_terms_boost_overconfidence() {
        let analysis = filter().analyze_request(
            "이건 무조건 간다 올인해야지 레버리지 20배로",
            &EmotionSignals::default(),
        );
        assert_eq!(analysis.detected_emotions, vec![Emotion::Overconfidence]);
        assert!((analysis.emotion_score - 0.55).abs() < EPS);
        assert!(!analysis.should_block);
        assert!(analysis.warnings.iter().any(|w| w.contains("Leverage")));
    }

    #[test]
    fn test_revenge_after_recent_loss() {
        let signals = EmotionSignals::default()
            .with_last_trade(-50_000.0, Some(-5.0))
            .with_time_since_last_trade(Duration::hours(1));
        let analysis = filter().analyze_request("아까 손절했는데 다시 들어가서 원금 회복해야해", &signals);

        assert_eq!(analysis.detected_emotions, vec![Emotion::Revenge]);
        assert!((analysis.emotion_score - (2.0 / 3.0 * 0.30 + 0.25 + 0.1)).abs() < EPS);
        assert!(analysis.warnings[0].contains("lost 5.0%"));
        assert!(analysis.warnings[1].contains("1.0 hours"));
        assert!(analysis.alternative_advice.contains("take today off"));
    }

    #[test]
    fn test_combined_emotions_block_and_follow_priority() {
        let analysis = filter().analyze_request(
            "무조건 올인 레버리지 20배 대박 한방 로또",
            &EmotionSignals::default(),
        );
        assert_eq!(
            analysis.detected_emotions,
            vec![Emotion::Overconfidence, Emotion::Greed]
        );
        assert!((analysis.emotion_score - 0.75).abs() < EPS);
        assert!(analysis.should_block);
        assert!(analysis.alternative_advice.contains("stronger the conviction"));

        let report = analysis.report();
        assert!(report.contains("Emotional trading warning"));
        assert!(report.contains("Overconfidence: 100%"));
        assert!(report.contains("❌ Trade blocked"));
    }

    #[test]
    fn test_score_is_capped_at_one() {
        let analysis = filter().analyze_request(
            "지금 안 사면 급등 폭등 폭락 급락 망했 복구 만회 본전 올인 레버리지 무조건 대박 한방 로또 물타기 평균 단가 비중 늘",
            &EmotionSignals::default().with_market_move(20.0),
        );
        assert_eq!(analysis.detected_emotions.len(), 6);
        assert_eq!(analysis.emotion_score, 1.0);
        assert!(analysis.should_block);
        assert!(analysis.alternative_advice.contains("limit buys"));
    }

    #[test]
    fn test_fear_in_real_crash_adds_warning_only() {
        let signals = EmotionSignals::default().with_market_move(-12.0);
        let analysis = filter().analyze_request("망했다 폭락한다 다 팔아야겠어", &signals);
        assert_eq!(analysis.detected_emotions, vec![Emotion::Fear]);
        assert!((analysis.emotion_score - 0.25).abs() < EPS);
        assert_eq!(analysis.warnings.len(), 2);
        assert!(analysis.warnings[1].contains("12.0%"));
    }

    #[test]
    fn test_uppercase_latin_patterns_match() {
        let analysis = filter().analyze_request("X100 가즈아", &EmotionSignals::default());
        assert_eq!(analysis.detected_emotions, vec![Emotion::Greed]);
    }

    #[test]
    fn test_serializes_emotion_names() {
        let analysis = filter().analyze_request("물타기 해야겠어", &EmotionSignals::default());
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["detected_emotions"][0], "sunk_cost");
        assert!(json["emotion_details"]["sunk_cost"].is_number());
    }
}

//! Per-session emotion history with a consecutive-block circuit breaker.
//!
//! A tracker belongs to one session and has a single writer. Callers that
//! share trackers across tasks wrap them in a mutex.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::emotion_filter::{Emotion, EmotionAnalysis};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub timestamp: DateTime<Utc>,
    pub emotions: Vec<Emotion>,
    pub score: f64,
    pub blocked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub total_requests: usize,
    pub blocked_requests: usize,
    /// %
    pub block_rate: f64,
    pub avg_emotion_score: f64,
    pub most_common_emotion: Option<Emotion>,
    pub emotion_distribution: BTreeMap<Emotion, usize>,
}

#[derive(Clone, Debug)]
pub struct EmotionTracker {
    session_id: Uuid,
    history: Vec<EmotionRecord>,
    consecutive_blocks: u32,
}

impl Default for EmotionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EmotionTracker {
    /// Consecutive blocked requests that force a break
    pub const FORCE_BREAK_STREAK: u32 = 3;

    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub const fn with_id(session_id: Uuid) -> Self {
        Self {
            session_id,
            history: Vec::new(),
            consecutive_blocks: 0,
        }
    }

    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn history(&self) -> &[EmotionRecord] {
        &self.history
    }

    pub const fn consecutive_blocks(&self) -> u32 {
        self.consecutive_blocks
    }

    /// Append an analysis; a non-blocking result resets the streak
    pub fn record(&mut self, analysis: &EmotionAnalysis) {
        self.history.push(EmotionRecord {
            timestamp: Utc::now(),
            emotions: analysis.detected_emotions.clone(),
            score: analysis.emotion_score,
            blocked: analysis.should_block,
        });

        if analysis.should_block {
            self.consecutive_blocks += 1;
        } else {
            self.consecutive_blocks = 0;
        }

        if self.should_force_break() {
            tracing::warn!(
                session_id = %self.session_id,
                streak = self.consecutive_blocks,
                "consecutive emotional requests - forcing a break"
            );
        }
    }

    pub const fn should_force_break(&self) -> bool {
        self.consecutive_blocks >= Self::FORCE_BREAK_STREAK
    }

    pub fn session_summary(&self) -> SessionSummary {
        let total = self.history.len();
        let blocked = self.history.iter().filter(|r| r.blocked).count();

        let mut distribution = BTreeMap::new();
        for emotion in self.history.iter().flat_map(|r| &r.emotions) {
            *distribution.entry(*emotion).or_insert(0) += 1;
        }

        // Ascending key order is priority order, so the first maximum wins ties
        let most_common_emotion = distribution
            .iter()
            .fold(None, |best: Option<(Emotion, usize)>, (&emotion, &count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((emotion, count)),
            })
            .map(|(emotion, _)| emotion);

        let (block_rate, avg_emotion_score) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                blocked as f64 / total as f64 * 100.0,
                self.history.iter().map(|r| r.score).sum::<f64>() / total as f64,
            )
        };

        SessionSummary {
            session_id: self.session_id,
            total_requests: total,
            blocked_requests: blocked,
            block_rate,
            avg_emotion_score,
            most_common_emotion,
            emotion_distribution: distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analysis(emotions: &[Emotion], score: f64) -> EmotionAnalysis {
        EmotionAnalysis {
            detected_emotions: emotions.to_vec(),
            emotion_score: score,
            is_rational: score < 0.25,
            warnings: Vec::new(),
            should_block: score >= 0.6,
            alternative_advice: String::new(),
            emotion_details: BTreeMap::new(),
        }
    }

    #[test]
    fn test_force_break_after_three_blocks() {
        let mut tracker = EmotionTracker::new();
        let blocked = analysis(&[Emotion::Overconfidence], 0.8);

        tracker.record(&blocked);
        tracker.record(&blocked);
        assert!(!tracker.should_force_break());

        tracker.record(&blocked);
        assert!(tracker.should_force_break());
        assert_eq!(tracker.consecutive_blocks(), 3);

        tracker.record(&analysis(&[], 0.0));
        assert!(!tracker.should_force_break());
        assert_eq!(tracker.consecutive_blocks(), 0);
    }

    #[test]
    fn test_interrupted_streak_does_not_break() {
        let mut tracker = EmotionTracker::new();
        let blocked = analysis(&[Emotion::Greed], 0.7);
        let caution = analysis(&[Emotion::Greed], 0.4);

        for a in [&blocked, &blocked, &caution, &blocked, &blocked] {
            tracker.record(a);
        }
        assert!(!tracker.should_force_break());
        assert_eq!(tracker.consecutive_blocks(), 2);
    }

    #[test]
    fn test_session_summary() {
        let id = Uuid::new_v4();
        let mut tracker = EmotionTracker::with_id(id);
        tracker.record(&analysis(&[Emotion::Greed, Emotion::Fomo], 0.8));
        tracker.record(&analysis(&[Emotion::Greed], 0.4));
        tracker.record(&analysis(&[Emotion::Fomo], 0.3));
        tracker.record(&analysis(&[], 0.1));

        let summary = tracker.session_summary();
        assert_eq!(summary.session_id, id);
        assert_eq!(summary.total_requests, 4);
        assert_eq!(summary.blocked_requests, 1);
        assert!((summary.block_rate - 25.0).abs() < 1e-9);
        assert!((summary.avg_emotion_score - 0.4).abs() < 1e-9);
        // Tie between FOMO and greed resolves to the higher-priority FOMO
        assert_eq!(summary.most_common_emotion, Some(Emotion::Fomo));
        assert_eq!(summary.emotion_distribution[&Emotion::Greed], 2);
        assert_eq!(tracker.history().len(), 4);
    }

    #[test]
    fn test_empty_summary() {
        let summary = EmotionTracker::new().session_summary();
        assert_eq!(summary.total_requests, 0);
        assert_eq!(summary.block_rate, 0.0);
        assert!(summary.most_common_emotion.is_none());
        assert!(summary.emotion_distribution.is_empty());
    }
}

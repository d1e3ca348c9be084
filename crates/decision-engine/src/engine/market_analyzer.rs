//! Market Analyzer
//!
//! Turns an OHLCV series into a labeled [`MarketContext`]: regime, trend,
//! momentum signals, support/resistance, volatility, volume behaviour, and
//! bullish/bearish bias scores with a recommended strategy.

use crate::engine::Bounds;
use crate::indicators::{self, BollingerBand, MacdSeries};
use crate::model::{
    Candle, IndicatorSnapshot, MarketContext, MarketRegime, RsiSignal, Signal, Strategy,
    TrendDirection, TrendStrength, VolatilityRegime, VolumeTrend,
};

const SCORE_BOUNDS: Bounds = Bounds::new(0.0, 100.0);

/// Inputs to the regime rule table
#[derive(Clone, Copy, Debug)]
struct RegimeInputs {
    /// % distance of price from the long moving average
    distance: f64,
    rsi: f64,
    atr_percent: f64,
}

type RegimeRule = (fn(&RegimeInputs) -> bool, MarketRegime);

/// First match wins; no match is NEUTRAL
const REGIME_RULES: &[RegimeRule] = &[
    (|r: &RegimeInputs| r.atr_percent > 5.0, MarketRegime::HighVolatility),
    (|r: &RegimeInputs| r.distance > 15.0 && r.rsi > 55.0, MarketRegime::StrongBull),
    (|r: &RegimeInputs| r.distance > 0.0, MarketRegime::Bull),
    (|r: &RegimeInputs| r.distance < -15.0 && r.rsi < 45.0, MarketRegime::StrongBear),
    (|r: &RegimeInputs| r.distance < 0.0, MarketRegime::Bear),
];

/// Computed indicator series for one candle window
struct IndicatorSet {
    closes: Vec<f64>,
    sma20: Vec<Option<f64>>,
    sma50: Vec<Option<f64>>,
    sma200: Vec<Option<f64>>,
    ema12: Vec<f64>,
    ema26: Vec<f64>,
    rsi: Vec<f64>,
    macd: MacdSeries,
    atr: Vec<Option<f64>>,
    bollinger: Vec<Option<BollingerBand>>,
    volume_sma: Vec<Option<f64>>,
}

impl IndicatorSet {
    fn compute(candles: &[Candle]) -> Self {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

        Self {
            sma20: indicators::sma(&closes, 20),
            sma50: indicators::sma(&closes, 50),
            // Long average over whatever history is available, up to 200 bars
            sma200: indicators::sma(&closes, closes.len().min(200)),
            ema12: indicators::ema(&closes, 12),
            ema26: indicators::ema(&closes, 26),
            rsi: indicators::rsi(&closes, 14),
            macd: indicators::macd(&closes, 12, 26, 9),
            atr: indicators::atr(&highs, &lows, &closes, 14),
            bollinger: indicators::bollinger(&closes, 20, 2.0),
            volume_sma: indicators::sma(&volumes, 20),
            closes,
        }
    }

    fn snapshot(&self) -> IndicatorSnapshot {
        let band = indicators::last(&self.bollinger);
        IndicatorSnapshot {
            sma20: indicators::last(&self.sma20),
            sma50: indicators::last(&self.sma50),
            sma200: indicators::last(&self.sma200),
            ema12: self.ema12.last().copied(),
            ema26: self.ema26.last().copied(),
            macd: self.macd.line.last().copied(),
            macd_signal: self.macd.signal.last().copied(),
            macd_histogram: self.macd.histogram.last().copied(),
            atr: indicators::last(&self.atr),
            bollinger_upper: band.map(|b| b.upper),
            bollinger_middle: band.map(|b| b.middle),
            bollinger_lower: band.map(|b| b.lower),
            volume_sma: indicators::last(&self.volume_sma),
        }
    }
}

/// Builds [`MarketContext`] snapshots from candle series
#[derive(Clone, Copy, Debug, Default)]
pub struct MarketAnalyzer;

impl MarketAnalyzer {
    /// Shorter histories yield [`MarketContext::insufficient_data`]
    pub const MIN_CANDLES: usize = 50;

    pub const fn new() -> Self {
        Self
    }

    /// Analyze a time-ascending candle series
    pub fn analyze(&self, candles: &[Candle]) -> MarketContext {
        if candles.len() < Self::MIN_CANDLES {
            tracing::debug!(candles = candles.len(), "not enough candles for market analysis");
            return MarketContext::insufficient_data();
        }

        let ind = IndicatorSet::compute(candles);
        let snapshot = ind.snapshot();
        let price = ind.closes[ind.closes.len() - 1];

        let rsi = ind.rsi.last().copied().unwrap_or(50.0);
        let atr_percent = match snapshot.atr {
            Some(atr) if price > 0.0 => atr / price * 100.0,
            _ => 2.0,
        };

        let regime = classify_regime(&regime_inputs(price, &snapshot, rsi, atr_percent));
        let trend_direction = trend_direction(price, snapshot.sma20, snapshot.sma50);
        let trend_strength = trend_strength(candles);
        let macd_signal = macd_signal(&ind.macd);
        let ma_alignment = ma_alignment(price, snapshot.sma20, snapshot.sma50);

        let (support, resistance) = support_resistance(candles, price);
        let distance_to_support_pct = if support > 0.0 {
            (price - support) / price * 100.0
        } else {
            100.0
        };
        let distance_to_resistance_pct = if resistance > 0.0 {
            (resistance - price) / price * 100.0
        } else {
            100.0
        };

        let volatility_regime = VolatilityRegime::from_atr_percent(atr_percent);
        let (volume_trend, volume_anomaly) = volume_behaviour(candles, snapshot.volume_sma);

        let (bullish_score, bearish_score) =
            bias_scores(rsi, macd_signal, ma_alignment, trend_direction, volume_trend);

        let (recommended_strategy, reasoning) = recommend_strategy(&StrategyInputs {
            regime,
            trend_direction,
            trend_strength,
            bullish_score,
            bearish_score,
            price,
            support,
            resistance,
            volatility_regime,
        });

        tracing::debug!(
            regime = regime.label(),
            trend = trend_direction.as_str(),
            bullish_score,
            bearish_score,
            strategy = recommended_strategy.as_str(),
            "market analyzed"
        );

        MarketContext {
            regime,
            trend_direction,
            trend_strength,
            rsi,
            rsi_signal: RsiSignal::from_rsi(rsi),
            macd_signal,
            ma_alignment,
            nearest_support: support,
            nearest_resistance: resistance,
            distance_to_support_pct,
            distance_to_resistance_pct,
            atr_percent,
            volatility_regime,
            volume_trend,
            volume_anomaly,
            bullish_score,
            bearish_score,
            recommended_strategy,
            reasoning,
            current_price: price,
            indicators: snapshot,
        }
    }
}

fn regime_inputs(
    price: f64,
    snapshot: &IndicatorSnapshot,
    rsi: f64,
    atr_percent: f64,
) -> RegimeInputs {
    let reference = snapshot
        .sma200
        .filter(|&ma| ma > 0.0)
        .or(snapshot.sma50.filter(|&ma| ma > 0.0));

    let distance = reference.map_or(0.0, |ma| (price - ma) / ma * 100.0);

    RegimeInputs {
        distance,
        rsi,
        atr_percent,
    }
}

fn classify_regime(inputs: &RegimeInputs) -> MarketRegime {
    REGIME_RULES
        .iter()
        .find(|(applies, _)| applies(inputs))
        .map_or(MarketRegime::Neutral, |&(_, regime)| regime)
}

fn trend_direction(price: f64, sma20: Option<f64>, sma50: Option<f64>) -> TrendDirection {
    match (sma20, sma50) {
        (Some(s20), Some(s50)) if price > s20 && s20 > s50 => TrendDirection::Up,
        (Some(s20), Some(s50)) if price < s20 && s20 < s50 => TrendDirection::Down,
        _ => TrendDirection::Sideways,
    }
}

/// Share of the dominant candle colour over the last 20 bars
fn trend_strength(candles: &[Candle]) -> TrendStrength {
    const WINDOW: usize = 20;
    if candles.len() < WINDOW {
        return TrendStrength::Weak;
    }

    let up = candles[candles.len() - WINDOW..]
        .iter()
        .filter(|c| c.is_bullish())
        .count();
    let ratio = up.max(WINDOW - up) as f64 / WINDOW as f64;

    if ratio > 0.7 {
        TrendStrength::Strong
    } else if ratio > 0.55 {
        TrendStrength::Moderate
    } else if ratio > 0.45 {
        TrendStrength::Weak
    } else {
        TrendStrength::NoTrend
    }
}

/// Crossovers take priority over histogram momentum
fn macd_signal(macd: &MacdSeries) -> Signal {
    let n = macd.line.len();
    if n < 2 {
        return Signal::Neutral;
    }

    let (line, signal, hist) = (macd.line[n - 1], macd.signal[n - 1], macd.histogram[n - 1]);
    let (prev_line, prev_signal, prev_hist) =
        (macd.line[n - 2], macd.signal[n - 2], macd.histogram[n - 2]);

    if line > signal && prev_line <= prev_signal {
        return Signal::Bullish;
    }
    if line < signal && prev_line >= prev_signal {
        return Signal::Bearish;
    }

    if hist > 0.0 && hist > prev_hist {
        Signal::Bullish
    } else if hist < 0.0 && hist < prev_hist {
        Signal::Bearish
    } else {
        Signal::Neutral
    }
}

fn ma_alignment(price: f64, sma20: Option<f64>, sma50: Option<f64>) -> Signal {
    match trend_direction(price, sma20, sma50) {
        TrendDirection::Up => Signal::Bullish,
        TrendDirection::Down => Signal::Bearish,
        TrendDirection::Sideways => Signal::Neutral,
    }
}

/// Nearest low below and nearest high above the current price over the last
/// 50 bars, falling back to the window extremes
fn support_resistance(candles: &[Candle], price: f64) -> (f64, f64) {
    let recent = &candles[candles.len().saturating_sub(50)..];

    let lows = recent.iter().map(|c| c.low);
    let highs = recent.iter().map(|c| c.high);

    let support = lows
        .clone()
        .filter(|&low| low < price)
        .reduce(f64::max)
        .or_else(|| lows.reduce(f64::min))
        .unwrap_or(0.0);

    let resistance = highs
        .clone()
        .filter(|&high| high > price)
        .reduce(f64::min)
        .or_else(|| highs.reduce(f64::max))
        .unwrap_or(0.0);

    (support, resistance)
}

fn volume_behaviour(candles: &[Candle], volume_sma: Option<f64>) -> (VolumeTrend, bool) {
    let Some(avg) = volume_sma.filter(|&v| v > 0.0) else {
        return (VolumeTrend::Stable, false);
    };
    if candles.len() < 20 {
        return (VolumeTrend::Stable, false);
    }

    let recent: Vec<f64> = candles[candles.len() - 5..].iter().map(|c| c.volume).collect();
    let slope = indicators::linear_slope(&recent);
    let threshold = avg * 0.1;

    let trend = if slope > threshold {
        VolumeTrend::Increasing
    } else if slope < -threshold {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    };

    let current = candles[candles.len() - 1].volume;
    (trend, current > avg * 2.0)
}

/// Bullish and bearish scores, each starting at 50 and clamped to 0..=100
fn bias_scores(
    rsi: f64,
    macd: Signal,
    ma: Signal,
    trend: TrendDirection,
    volume: VolumeTrend,
) -> (f64, f64) {
    let mut bull = 50.0;
    let mut bear = 50.0;

    if rsi < 30.0 {
        bull += 20.0;
        bear -= 10.0;
    } else if rsi < 40.0 {
        bull += 10.0;
        bear -= 5.0;
    } else if rsi > 70.0 {
        bear += 20.0;
        bull -= 10.0;
    } else if rsi > 60.0 {
        bear += 10.0;
        bull -= 5.0;
    }

    match macd {
        Signal::Bullish => {
            bull += 15.0;
            bear -= 5.0;
        }
        Signal::Bearish => {
            bear += 15.0;
            bull -= 5.0;
        }
        Signal::Neutral => {}
    }

    match ma {
        Signal::Bullish => {
            bull += 15.0;
            bear -= 10.0;
        }
        Signal::Bearish => {
            bear += 15.0;
            bull -= 10.0;
        }
        Signal::Neutral => {}
    }

    match trend {
        TrendDirection::Up => bull += 10.0,
        TrendDirection::Down => bear += 10.0,
        TrendDirection::Sideways => {}
    }

    // Rising volume reinforces the prevailing direction
    if volume == VolumeTrend::Increasing {
        match trend {
            TrendDirection::Up => bull += 5.0,
            TrendDirection::Down => bear += 5.0,
            TrendDirection::Sideways => {}
        }
    }

    (SCORE_BOUNDS.clamp(bull), SCORE_BOUNDS.clamp(bear))
}

struct StrategyInputs {
    regime: MarketRegime,
    trend_direction: TrendDirection,
    trend_strength: TrendStrength,
    bullish_score: f64,
    bearish_score: f64,
    price: f64,
    support: f64,
    resistance: f64,
    volatility_regime: VolatilityRegime,
}

fn recommend_strategy(s: &StrategyInputs) -> (Strategy, Vec<String>) {
    let mut reasoning = Vec::new();

    if s.regime == MarketRegime::HighVolatility
        || s.volatility_regime == VolatilityRegime::Extreme
    {
        reasoning.push("⚠️ High-volatility market - reduce size or stay out".to_string());
        reasoning.push(format!("   Volatility: {}", s.volatility_regime.as_str()));
        return (Strategy::Wait, reasoning);
    }

    if s.trend_strength.is_indecisive() {
        reasoning.push("⏸️ No clear trend - wait until direction is confirmed".to_string());
        reasoning.push(format!("   Trend strength: {}", s.trend_strength.label()));
        reasoning.push(format!(
            "   Bullish score: {:.0}, bearish score: {:.0}",
            s.bullish_score, s.bearish_score
        ));
        return (Strategy::Wait, reasoning);
    }

    if s.trend_direction == TrendDirection::Up && s.bullish_score > 60.0 {
        reasoning.push(format!("✅ Uptrend confirmed (strength: {})", s.trend_strength.label()));
        reasoning.push(format!("✅ Bullish score: {:.0}/100", s.bullish_score));

        let to_support = if s.price > 0.0 {
            (s.price - s.support) / s.price * 100.0
        } else {
            100.0
        };
        if to_support < 3.0 {
            reasoning.push(format!("✅ Near support ({to_support:.1}% above)"));
        } else {
            reasoning.push(format!(
                "ℹ️ {to_support:.1}% above support - consider waiting for a pullback"
            ));
        }
        return (Strategy::Long, reasoning);
    }

    if s.trend_direction == TrendDirection::Down && s.bearish_score > 60.0 {
        reasoning.push(format!("✅ Downtrend confirmed (strength: {})", s.trend_strength.label()));
        reasoning.push(format!("✅ Bearish score: {:.0}/100", s.bearish_score));

        let to_resistance = if s.price > 0.0 {
            (s.resistance - s.price) / s.price * 100.0
        } else {
            100.0
        };
        if to_resistance < 3.0 {
            reasoning.push(format!("✅ Near resistance ({to_resistance:.1}% below)"));
        }
        return (Strategy::Short, reasoning);
    }

    let gap = s.bullish_score - s.bearish_score;
    if gap > 20.0 {
        reasoning.push(format!("📈 Bullish bias (score gap: {gap:.0})"));
        return (Strategy::Long, reasoning);
    }
    if -gap > 20.0 {
        reasoning.push(format!("📉 Bearish bias (score gap: {:.0})", -gap));
        return (Strategy::Short, reasoning);
    }

    reasoning.push("ℹ️ Conditions not met - wait for a better opportunity".to_string());
    reasoning.push(format!(
        "   Bullish score: {:.0}, bearish score: {:.0}",
        s.bullish_score, s.bearish_score
    ));
    (Strategy::Wait, reasoning)
}

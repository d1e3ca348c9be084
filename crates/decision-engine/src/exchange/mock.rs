//! Mock Candle Source
//!
//! Deterministic random walk per symbol, for tests and demos. The same symbol
//! and limit always yield the same candles.

use async_trait::async_trait;
use chrono::{DateTime, Duration};

use super::CandleSource;
use crate::error::{EngineError, Result};
use crate::model::Candle;

/// 2024-01-01T00:00:00Z
const ANCHOR_SECS: i64 = 1_704_067_200;

/// Upper bound on one request
const MAX_CANDLES: usize = 1000;

/// Synthetic hourly candles around a static base price
#[derive(Clone, Debug)]
pub struct MockCandleSource {
    /// Mean % return per candle
    drift_percent: f64,

    /// Max % deviation from the drift per candle
    volatility_percent: f64,
}

impl Default for MockCandleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCandleSource {
    pub const fn new() -> Self {
        Self {
            drift_percent: 0.0,
            volatility_percent: 1.5,
        }
    }

    /// Trending walk, e.g. `0.3` for +0.3% per candle
    pub const fn with_drift(mut self, drift_percent: f64) -> Self {
        self.drift_percent = drift_percent;
        self
    }

    pub const fn with_volatility(mut self, volatility_percent: f64) -> Self {
        self.volatility_percent = volatility_percent;
        self
    }

    pub fn supports(symbol: &str) -> bool {
        base_price(&normalize_symbol(symbol)).is_some()
    }

    fn generate(&self, base: f64, seed: u64, limit: usize) -> Vec<Candle> {
        let mut rng = Lcg(seed);
        let anchor = DateTime::from_timestamp(ANCHOR_SECS, 0).unwrap_or_default();
        let drift = self.drift_percent / 100.0;
        let vol = self.volatility_percent / 100.0;

        let mut close = base;
        (0..limit)
            .map(|i| {
                let open = close;
                close = open * (1.0 + drift + (rng.next_unit() - 0.5) * 2.0 * vol);
                let wick = rng.next_unit() * vol / 2.0;

                Candle::new(
                    anchor + Duration::hours(i as i64),
                    open,
                    open.max(close) * (1.0 + wick),
                    open.min(close) * (1.0 - wick),
                    close,
                    1000.0 * (0.5 + rng.next_unit()),
                )
            })
            .collect()
    }
}

#[async_trait]
impl CandleSource for MockCandleSource {
    async fn fetch_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>> {
        let normalized = normalize_symbol(symbol);
        let base = base_price(&normalized)
            .ok_or_else(|| EngineError::UnsupportedSymbol(symbol.to_string()))?;

        Ok(self.generate(base, seed_for(&normalized), limit.min(MAX_CANDLES)))
    }

    fn name(&self) -> &str {
        "MockCandles"
    }
}

/// `BTC`, `btc/krw`, `KRW-BTC` and `BTCUSDT` all resolve to `BTC`
fn normalize_symbol(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();

    let base = match upper.split_once(['/', '-']) {
        Some(("KRW" | "USDT" | "USD", base)) if !base.is_empty() => base,
        Some((base, _)) => base,
        None => upper.as_str(),
    };

    ["USDT", "KRW", "USD"]
        .iter()
        .find_map(|quote| base.strip_suffix(quote).filter(|b| !b.is_empty()))
        .unwrap_or(base)
        .to_string()
}

fn base_price(symbol: &str) -> Option<f64> {
    let price = match symbol {
        "BTC" => 97_500.0,
        "ETH" => 3_450.0,
        "SOL" => 195.0,
        "XRP" => 2.35,
        "ADA" => 0.95,
        "DOGE" => 0.38,
        "AVAX" => 42.0,
        "DOT" => 7.2,
        "LINK" => 24.5,
        "LTC" => 105.0,
        _ => return None,
    };
    Some(price)
}

/// FNV-1a over the symbol
fn seed_for(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// 64-bit LCG, uniform in [0, 1)
struct Lcg(u64);

impl Lcg {
    fn next_unit(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deterministic_per_symbol() {
        let source = MockCandleSource::new();
        let a = source.fetch_candles("BTC", 100).await.unwrap();
        let b = source.fetch_candles("btc/krw", 100).await.unwrap();
        let eth = source.fetch_candles("ETH", 100).await.unwrap();

        assert_eq!(a.len(), 100);
        assert_eq!(a, b);
        assert_ne!(a[10].close / a[0].open, eth[10].close / eth[0].open);
    }

    #[tokio::test]
    async fn test_candles_are_well_formed() {
        let candles = MockCandleSource::new().fetch_candles("SOL", 200).await.unwrap();
        for pair in candles.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
            assert!((pair[1].open - pair[0].close).abs() < 1e-9);
        }
        for c in &candles {
            assert!(c.high >= c.open.max(c.close));
            assert!(c.low <= c.open.min(c.close));
            assert!(c.low > 0.0 && c.volume > 0.0);
        }
    }

    #[tokio::test]
    async fn test_drift_and_market_move() {
        let source = MockCandleSource::new().with_drift(1.0).with_volatility(0.5);
        let candles = source.fetch_candles("ETH", 30).await.unwrap();
        assert!(candles.iter().all(Candle::is_bullish));

        let change = source.market_move("ETH").await.unwrap();
        assert!(change.change_24h > 24.0 * 0.5);
    }

    #[tokio::test]
    async fn test_unsupported_symbol() {
        let result = MockCandleSource::new().fetch_candles("NOTREAL", 10).await;
        assert!(matches!(result, Err(EngineError::UnsupportedSymbol(s)) if s == "NOTREAL"));
        assert!(!MockCandleSource::supports("NOTREAL"));
    }

    #[test]
    fn test_symbol_normalization() {
        assert_eq!(normalize_symbol("KRW-BTC"), "BTC");
        assert_eq!(normalize_symbol("eth/usdt"), "ETH");
        assert_eq!(normalize_symbol("SOLUSDT"), "SOL");
        assert_eq!(normalize_symbol(" xrp "), "XRP");
    }
}

//! Market Data
//!
//! Candle sources feeding the analyzers. Live exchange connectors implement
//! [`CandleSource`]; the mock serves deterministic synthetic data.

mod mock;

pub use mock::MockCandleSource;

use async_trait::async_trait;

use crate::engine::MarketMove;
use crate::error::{EngineError, Result};
use crate::model::Candle;

/// Provider of time-ascending OHLCV candles
///
/// Implement this for each venue: Upbit, Binance, CSV replays, etc.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// The latest `limit` hourly candles, oldest first
    async fn fetch_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>>;

    /// 24h % change from hourly candles
    async fn market_move(&self, symbol: &str) -> Result<MarketMove> {
        let candles = self.fetch_candles(symbol, 25).await?;
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            return Err(EngineError::DataSource(format!("no candles for {symbol}")));
        };
        if candles.len() < 25 || first.close <= 0.0 {
            return Err(EngineError::DataSource(format!(
                "not enough history for a 24h change on {symbol}"
            )));
        }

        Ok(MarketMove {
            change_24h: (last.close - first.close) / first.close * 100.0,
        })
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn name(&self) -> &str;
}

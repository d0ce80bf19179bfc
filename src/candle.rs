//! Daily OHLCV candles.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// One trading day.
///
/// A non-finite field value marks a missing observation. The feature engine
/// forward-fills those before computing indicators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Build a candle from its fields.
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// True when every OHLCV field holds a finite value.
    pub fn is_complete(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Reject sequences that are not strictly ascending by date.
///
/// Gaps between dates (weekends, holidays) are expected and accepted.
pub fn ensure_ascending(candles: &[Candle]) -> Result<(), ForecastError> {
    for pair in candles.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(ForecastError::DataUnavailable(format!(
                "candles not strictly ascending: {} followed by {}",
                pair[0].date, pair[1].date
            )));
        }
    }
    Ok(())
}

/// Last `n` complete candles, oldest first.
pub fn last_complete(candles: &[Candle], n: usize) -> Vec<Candle> {
    let complete: Vec<Candle> = candles.iter().filter(|c| c.is_complete()).copied().collect();
    let start = complete.len().saturating_sub(n);
    complete[start..].to_vec()
}

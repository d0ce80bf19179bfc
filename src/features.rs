//! Technical-indicator feature engineering over daily candles.
//!
//! **Critical for correctness**: the model and scaler were calibrated on exactly
//! these formulas. Any change here is train/serve skew, even when the new
//! formula is "better" (for instance a Wilder-smoothed ATR).
//!
//! All rolling indicators use trailing windows and stay undefined (NaN) until the
//! window is full of defined values. Rows holding any undefined value are dropped
//! at the end; nothing is zero-filled.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::candle::Candle;
use crate::error::ForecastError;
use crate::window::RollingWindow;

/// Moving-average windows on close, in rows.
pub const MA_WINDOWS: [usize; 3] = [7, 21, 50];
/// Fast EMA span for MACD.
pub const EMA_FAST_SPAN: usize = 12;
/// Slow EMA span for MACD.
pub const EMA_SLOW_SPAN: usize = 26;
/// EMA span of the MACD signal line.
pub const MACD_SIGNAL_SPAN: usize = 9;
/// Averaging window of gains and losses for RSI.
pub const RSI_WINDOW: usize = 14;
/// Window of the Bollinger middle band and its std.
pub const BOLLINGER_WINDOW: usize = 20;
/// Band distance from the middle, in standard deviations.
pub const BOLLINGER_WIDTH: f64 = 2.0;
/// Volume moving-average window.
pub const VOLUME_MA_WINDOW: usize = 7;
/// Rolling close std window of the `Volatility` column.
pub const VOLATILITY_WINDOW: usize = 20;

/// Longest trailing window of any indicator; rows before it are warm-up.
pub const LONGEST_WINDOW: usize = 50;

/// Every column the engine can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureColumn {
    Open,
    High,
    Low,
    Close,
    Volume,
    #[serde(rename = "MA_7")]
    Ma7,
    #[serde(rename = "MA_21")]
    Ma21,
    #[serde(rename = "MA_50")]
    Ma50,
    #[serde(rename = "EMA_12")]
    Ema12,
    #[serde(rename = "EMA_26")]
    Ema26,
    #[serde(rename = "MACD")]
    Macd,
    #[serde(rename = "MACD_Signal")]
    MacdSignal,
    #[serde(rename = "RSI")]
    Rsi,
    #[serde(rename = "BB_Middle")]
    BbMiddle,
    #[serde(rename = "BB_Upper")]
    BbUpper,
    #[serde(rename = "BB_Lower")]
    BbLower,
    #[serde(rename = "Volume_MA_7")]
    VolumeMa7,
    #[serde(rename = "Price_Change")]
    PriceChange,
    #[serde(rename = "High_Low_Pct")]
    HighLowPct,
    Volatility,
    #[serde(rename = "ATR")]
    Atr,
}

impl FeatureColumn {
    /// All columns in the order the engine emits them.
    pub const ALL: [FeatureColumn; 21] = [
        FeatureColumn::Open,
        FeatureColumn::High,
        FeatureColumn::Low,
        FeatureColumn::Close,
        FeatureColumn::Volume,
        FeatureColumn::Ma7,
        FeatureColumn::Ma21,
        FeatureColumn::Ma50,
        FeatureColumn::Ema12,
        FeatureColumn::Ema26,
        FeatureColumn::Macd,
        FeatureColumn::MacdSignal,
        FeatureColumn::Rsi,
        FeatureColumn::BbMiddle,
        FeatureColumn::BbUpper,
        FeatureColumn::BbLower,
        FeatureColumn::VolumeMa7,
        FeatureColumn::PriceChange,
        FeatureColumn::HighLowPct,
        FeatureColumn::Volatility,
        FeatureColumn::Atr,
    ];

    /// Column name as stored in the frozen feature list.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::High => "High",
            Self::Low => "Low",
            Self::Close => "Close",
            Self::Volume => "Volume",
            Self::Ma7 => "MA_7",
            Self::Ma21 => "MA_21",
            Self::Ma50 => "MA_50",
            Self::Ema12 => "EMA_12",
            Self::Ema26 => "EMA_26",
            Self::Macd => "MACD",
            Self::MacdSignal => "MACD_Signal",
            Self::Rsi => "RSI",
            Self::BbMiddle => "BB_Middle",
            Self::BbUpper => "BB_Upper",
            Self::BbLower => "BB_Lower",
            Self::VolumeMa7 => "Volume_MA_7",
            Self::PriceChange => "Price_Change",
            Self::HighLowPct => "High_Low_Pct",
            Self::Volatility => "Volatility",
            Self::Atr => "ATR",
        }
    }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureColumn {
    type Err = ForecastError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        FeatureColumn::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| {
                ForecastError::SchemaMismatch(format!(
                    "feature engine cannot produce column {name:?}"
                ))
            })
    }
}

/// Column-oriented table of engineered features keyed by [`FeatureColumn`].
#[derive(Debug, Clone, Default)]
pub struct FeatureFrame {
    dates: Vec<NaiveDate>,
    columns: IndexMap<FeatureColumn, Vec<f64>>,
}

impl FeatureFrame {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True when no row survived.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Row dates, oldest first.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Columns present, in emission order.
    pub fn column_names(&self) -> impl Iterator<Item = FeatureColumn> + '_ {
        self.columns.keys().copied()
    }

    /// Values of one column, or `None` if it is absent.
    pub fn column(&self, column: FeatureColumn) -> Option<&[f64]> {
        self.columns.get(&column).map(Vec::as_slice)
    }

    /// Single cell lookup.
    pub fn value(&self, row: usize, column: FeatureColumn) -> Option<f64> {
        self.column(column).and_then(|values| values.get(row).copied())
    }

    /// Remove a column, returning its values if it was present.
    pub fn drop_column(&mut self, column: FeatureColumn) -> Option<Vec<f64>> {
        self.columns.shift_remove(&column)
    }

    fn insert(&mut self, column: FeatureColumn, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.dates.len());
        self.columns.insert(column, values);
    }

    /// Keep only rows where every column is defined.
    fn drop_undefined_rows(self) -> Self {
        let keep: Vec<bool> = (0..self.dates.len())
            .map(|i| self.columns.values().all(|values| !values[i].is_nan()))
            .collect();

        let dates = self
            .dates
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(d, _)| *d)
            .collect();
        let columns = self
            .columns
            .into_iter()
            .map(|(name, values)| {
                let kept = values
                    .into_iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| v)
                    .collect();
                (name, kept)
            })
            .collect();

        Self { dates, columns }
    }
}

/// Replace NaN with the last non-NaN value.
///
/// Leading NaNs stay NaN. Infinite values are data, not gaps, and are kept.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if !v.is_nan() {
                last = v;
            }
            last
        })
        .collect()
}

/// Trailing simple moving average.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let mut rolling = RollingWindow::new(window);
    values
        .iter()
        .map(|&v| {
            rolling.push(v);
            rolling.mean()
        })
        .collect()
}

/// Trailing sample standard deviation.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    let mut rolling = RollingWindow::new(window);
    values
        .iter()
        .map(|&v| {
            rolling.push(v);
            rolling.sample_std()
        })
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`.
///
/// Non-adjusted recursive form seeded by the first defined value:
/// `y[0] = x[0]`, `y[t] = (1 - alpha) * y[t-1] + alpha * x[t]`.
/// An undefined input after seeding carries the previous average forward.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut prev: Option<f64> = None;
    values
        .iter()
        .map(|&x| {
            let next = match (prev, x.is_nan()) {
                (None, true) => return f64::NAN,
                (None, false) => x,
                (Some(p), true) => p,
                (Some(p), false) => (1.0 - alpha) * p + alpha * x,
            };
            prev = Some(next);
            next
        })
        .collect()
}

/// First difference, NaN at index 0.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] - values[i - 1];
    }
    out
}

/// Fractional change versus the previous value, NaN at index 0.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for i in 1..values.len() {
        out[i] = values[i] / values[i - 1] - 1.0;
    }
    out
}

/// Relative strength index from simple trailing means of gains and losses.
///
/// An undefined delta counts as neither gain nor loss. Zero mean loss with a
/// positive mean gain gives an infinite ratio and therefore 100; zero for both
/// gives 0/0 and an undefined row.
pub fn rsi(close: &[f64], window: usize) -> Vec<f64> {
    let delta = diff(close);
    let gains: Vec<f64> = delta.iter().map(|&d| if d > 0.0 { d } else { 0.0 }).collect();
    let losses: Vec<f64> = delta.iter().map(|&d| if d < 0.0 { -d } else { 0.0 }).collect();

    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| {
            let ratio = g / l;
            100.0 - 100.0 / (1.0 + ratio)
        })
        .collect()
}

/// Build the full indicator table and drop rows with undefined values.
///
/// Never fails: a series shorter than the warm-up simply yields an empty frame.
pub fn engineer_features(candles: &[Candle]) -> FeatureFrame {
    let open = forward_fill(&candles.iter().map(|c| c.open).collect::<Vec<_>>());
    let high = forward_fill(&candles.iter().map(|c| c.high).collect::<Vec<_>>());
    let low = forward_fill(&candles.iter().map(|c| c.low).collect::<Vec<_>>());
    let close = forward_fill(&candles.iter().map(|c| c.close).collect::<Vec<_>>());
    let volume = forward_fill(&candles.iter().map(|c| c.volume).collect::<Vec<_>>());

    let ema_fast = ema(&close, EMA_FAST_SPAN);
    let ema_slow = ema(&close, EMA_SLOW_SPAN);
    let macd: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let macd_signal = ema(&macd, MACD_SIGNAL_SPAN);

    let bb_middle = rolling_mean(&close, BOLLINGER_WINDOW);
    let bb_std = rolling_std(&close, BOLLINGER_WINDOW);
    let bb_upper = bb_middle
        .iter()
        .zip(&bb_std)
        .map(|(m, s)| m + s * BOLLINGER_WIDTH)
        .collect();
    let bb_lower = bb_middle
        .iter()
        .zip(&bb_std)
        .map(|(m, s)| m - s * BOLLINGER_WIDTH)
        .collect();

    let high_low_pct = high
        .iter()
        .zip(&low)
        .zip(&close)
        .map(|((h, l), c)| (h - l) / c)
        .collect();
    let atr = high.iter().zip(&low).map(|(h, l)| h - l).collect();

    let columns = [
        (FeatureColumn::Ma7, rolling_mean(&close, MA_WINDOWS[0])),
        (FeatureColumn::Ma21, rolling_mean(&close, MA_WINDOWS[1])),
        (FeatureColumn::Ma50, rolling_mean(&close, MA_WINDOWS[2])),
        (FeatureColumn::Ema12, ema_fast),
        (FeatureColumn::Ema26, ema_slow),
        (FeatureColumn::Macd, macd),
        (FeatureColumn::MacdSignal, macd_signal),
        (FeatureColumn::Rsi, rsi(&close, RSI_WINDOW)),
        (FeatureColumn::BbMiddle, bb_middle),
        (FeatureColumn::BbUpper, bb_upper),
        (FeatureColumn::BbLower, bb_lower),
        (FeatureColumn::VolumeMa7, rolling_mean(&volume, VOLUME_MA_WINDOW)),
        (FeatureColumn::PriceChange, pct_change(&close)),
        (FeatureColumn::HighLowPct, high_low_pct),
        (FeatureColumn::Volatility, rolling_std(&close, VOLATILITY_WINDOW)),
        (FeatureColumn::Atr, atr),
    ];

    let mut frame = FeatureFrame {
        dates: candles.iter().map(|c| c.date).collect(),
        columns: IndexMap::with_capacity(FeatureColumn::ALL.len()),
    };
    frame.insert(FeatureColumn::Open, open);
    frame.insert(FeatureColumn::High, high);
    frame.insert(FeatureColumn::Low, low);
    frame.insert(FeatureColumn::Close, close);
    frame.insert(FeatureColumn::Volume, volume);
    for (column, values) in columns {
        frame.insert(column, values);
    }

    frame.drop_undefined_rows()
}

//! Tabular market-data response and its normalization to [`Candle`]s.
//!
//! Providers may label columns either flat (`"Close"`) or with several levels
//! (`("Close", "SPY")`). Normalization keys on the first level only.

use chrono::NaiveDate;

use crate::candle::Candle;
use crate::error::ForecastError;

/// Columns every response must carry after normalization.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Column label of a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Flat(String),
    Multi(Vec<String>),
}

impl ColumnLabel {
    /// Single-level label.
    pub fn flat(name: &str) -> Self {
        ColumnLabel::Flat(name.to_string())
    }

    /// Multi-level label, outermost level first.
    pub fn multi(levels: &[&str]) -> Self {
        ColumnLabel::Multi(levels.iter().map(|s| s.to_string()).collect())
    }

    /// First level of the label.
    pub fn top_level(&self) -> Option<&str> {
        match self {
            ColumnLabel::Flat(name) => Some(name.as_str()),
            ColumnLabel::Multi(levels) => levels.first().map(String::as_str),
        }
    }
}

/// One dated row; `None` marks a missing or non-numeric cell.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub date: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Daily table as returned by a provider, indexed by date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFrame {
    pub columns: Vec<ColumnLabel>,
    pub rows: Vec<RawRow>,
}

impl RawFrame {
    /// Empty frame with the given columns.
    pub fn new(columns: Vec<ColumnLabel>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row; `values` follow the column order.
    pub fn push_row(&mut self, date: NaiveDate, values: Vec<Option<f64>>) {
        self.rows.push(RawRow { date, values });
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the provider returned no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|label| label.top_level() == Some(name))
    }

    /// Convert to candles in row order.
    ///
    /// Fails with `DataUnavailable` when the frame has no rows, lacks any of
    /// [`REQUIRED_COLUMNS`] or holds a non-positive price or negative volume.
    /// Missing cells become NaN for the feature engine to forward-fill.
    pub fn normalize(&self) -> Result<Vec<Candle>, ForecastError> {
        if self.rows.is_empty() {
            return Err(ForecastError::DataUnavailable(
                "market data source returned no rows".to_string(),
            ));
        }

        let positions: Vec<Option<usize>> =
            REQUIRED_COLUMNS.iter().map(|c| self.position_of(c)).collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .zip(&positions)
            .filter(|(_, p)| p.is_none())
            .map(|(c, _)| *c)
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::DataUnavailable(format!(
                "market data lacks columns {missing:?}"
            )));
        }
        let idx: Vec<usize> = positions.into_iter().flatten().collect();

        let cell = |row: &RawRow, i: usize| -> f64 {
            row.values
                .get(idx[i])
                .copied()
                .flatten()
                .unwrap_or(f64::NAN)
        };

        let candles: Vec<Candle> = self
            .rows
            .iter()
            .map(|row| Candle {
                date: row.date,
                open: cell(row, 0),
                high: cell(row, 1),
                low: cell(row, 2),
                close: cell(row, 3),
                volume: cell(row, 4),
            })
            .collect();

        for candle in &candles {
            check_ranges(candle)?;
        }
        Ok(candles)
    }
}

/// Present prices must be finite and positive, present volume finite and
/// non-negative. NaN cells are gaps and pass through.
fn check_ranges(candle: &Candle) -> Result<(), ForecastError> {
    let prices = [
        ("Open", candle.open),
        ("High", candle.high),
        ("Low", candle.low),
        ("Close", candle.close),
    ];
    for (name, value) in prices {
        if !value.is_nan() && !(value.is_finite() && value > 0.0) {
            return Err(ForecastError::DataUnavailable(format!(
                "{name} on {} is {value}, expected a positive price",
                candle.date
            )));
        }
    }
    let volume = candle.volume;
    if !volume.is_nan() && !(volume.is_finite() && volume >= 0.0) {
        return Err(ForecastError::DataUnavailable(format!(
            "Volume on {} is {volume}, expected a non-negative count",
            candle.date
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn test_flat_layout() {
        let mut frame = RawFrame::new(
            ["Close", "High", "Low", "Open", "Volume", "Dividends"]
                .iter()
                .map(|c| ColumnLabel::flat(c))
                .collect(),
        );
        frame.push_row(day(1), vec![Some(10.0), Some(11.0), Some(9.0), Some(9.5), Some(1e6), None]);

        let candles = frame.normalize().unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0], Candle::new(day(1), 9.5, 11.0, 9.0, 10.0, 1e6));
    }

    #[test]
    fn test_multi_level_layout() {
        let mut frame = RawFrame::new(vec![
            ColumnLabel::multi(&["Open", "SPY"]),
            ColumnLabel::multi(&["High", "SPY"]),
            ColumnLabel::multi(&["Low", "SPY"]),
            ColumnLabel::multi(&["Close", "SPY"]),
            ColumnLabel::multi(&["Volume", "SPY"]),
        ]);
        frame.push_row(day(2), vec![Some(1.0), Some(2.0), Some(0.5), Some(1.5), Some(100.0)]);
        frame.push_row(day(3), vec![Some(1.5), Some(2.5), Some(1.0), None, Some(120.0)]);

        let candles = frame.normalize().unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 1.5);
        assert!(candles[1].close.is_nan());
        assert_eq!(candles[1].volume, 120.0);
    }

    #[test]
    fn test_empty_frame_is_data_unavailable() {
        let frame = RawFrame::new(REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect());
        assert!(matches!(
            frame.normalize(),
            Err(ForecastError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_zero_close_is_data_unavailable() {
        let mut frame = RawFrame::new(REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect());
        frame.push_row(day(1), vec![Some(10.0), Some(11.0), Some(9.0), Some(10.5), Some(1e6)]);
        frame.push_row(day(2), vec![Some(10.0), Some(11.0), Some(9.0), Some(0.0), Some(1e6)]);

        match frame.normalize() {
            Err(ForecastError::DataUnavailable(msg)) => assert!(msg.contains("Close")),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_or_infinite_values_are_rejected() {
        let columns: Vec<ColumnLabel> = REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect();

        let mut frame = RawFrame::new(columns.clone());
        frame.push_row(day(1), vec![Some(10.0), Some(11.0), Some(9.0), Some(10.5), Some(-5.0)]);
        assert!(matches!(frame.normalize(), Err(ForecastError::DataUnavailable(_))));

        let mut frame = RawFrame::new(columns);
        frame.push_row(day(1), vec![Some(f64::INFINITY), Some(11.0), Some(9.0), Some(10.5), Some(1e6)]);
        assert!(matches!(frame.normalize(), Err(ForecastError::DataUnavailable(_))));
    }

    #[test]
    fn test_zero_volume_and_gaps_are_accepted() {
        let mut frame = RawFrame::new(REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect());
        frame.push_row(day(1), vec![Some(10.0), None, Some(9.0), Some(10.5), Some(0.0)]);

        let candles = frame.normalize().unwrap();
        assert_eq!(candles[0].volume, 0.0);
        assert!(candles[0].high.is_nan());
    }

    #[test]
    fn test_missing_column_is_data_unavailable() {
        let mut frame = RawFrame::new(
            ["Open", "High", "Low", "Close"]
                .iter()
                .map(|c| ColumnLabel::flat(c))
                .collect(),
        );
        frame.push_row(day(1), vec![Some(1.0); 4]);

        match frame.normalize() {
            Err(ForecastError::DataUnavailable(msg)) => assert!(msg.contains("Volume")),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }
}

//! Model input assembly: schema-ordered column selection over the last
//! `lookback` rows of a [`FeatureFrame`].

use ndarray::Array3;

use crate::error::ForecastError;
use crate::features::{FeatureColumn, FeatureFrame};

/// Number of most recent rows fed to the model per prediction.
pub const DEFAULT_LOOKBACK: usize = 60;

/// Frozen, ordered list of feature columns the model was trained on.
///
/// Built once from the artifact's column names. Unknown names are rejected at
/// construction so drift surfaces at load time rather than mid-request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    /// Create a schema from typed columns.
    ///
    /// Fails with `SchemaMismatch` on an empty list or a repeated column.
    pub fn new(columns: Vec<FeatureColumn>) -> Result<Self, ForecastError> {
        if columns.is_empty() {
            return Err(ForecastError::SchemaMismatch(
                "feature list is empty".to_string(),
            ));
        }
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(ForecastError::SchemaMismatch(format!(
                    "feature list repeats column {column}"
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Parse column names, failing on the first name the engine cannot produce.
    ///
    /// # Example
    /// ```
    /// use close_forecast::{FeatureColumn, FeatureSchema};
    ///
    /// let schema = FeatureSchema::from_names(&["Close", "RSI", "MA_7"]).unwrap();
    /// assert_eq!(schema.len(), 3);
    /// assert_eq!(schema.index_of(FeatureColumn::Close), Some(0));
    /// assert!(FeatureSchema::from_names(&["Close", "Sentiment"]).is_err());
    /// ```
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ForecastError> {
        let columns = names
            .iter()
            .map(|name| name.as_ref().parse::<FeatureColumn>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(columns)
    }

    /// Every column the engine produces, in emission order.
    pub fn full() -> Self {
        Self {
            columns: FeatureColumn::ALL.to_vec(),
        }
    }

    /// Columns in trained order.
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Number of features per row.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false for a constructed schema.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Schema position of a column.
    pub fn index_of(&self, column: FeatureColumn) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    /// Column names in trained order.
    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(FeatureColumn::as_str).collect()
    }
}

/// Builds the (1, lookback, features) window the model consumes.
#[derive(Debug, Clone, Copy)]
pub struct SequenceBuilder<'a> {
    schema: &'a FeatureSchema,
    lookback: usize,
}

impl<'a> SequenceBuilder<'a> {
    /// Create a builder.
    ///
    /// # Arguments
    /// * `schema` - Columns to select, in model order
    /// * `lookback` - Rows per window
    pub fn new(schema: &'a FeatureSchema, lookback: usize) -> Self {
        Self { schema, lookback }
    }

    /// Rows per window.
    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Select schema columns from the chronologically last `lookback` rows.
    ///
    /// Rows stay oldest to newest; columns follow schema order. Extra history
    /// beyond the window is ignored.
    pub fn build(&self, frame: &FeatureFrame) -> Result<Array3<f64>, ForecastError> {
        if frame.len() < self.lookback {
            return Err(ForecastError::InsufficientHistory {
                required: self.lookback,
                actual: frame.len(),
            });
        }

        let missing: Vec<&str> = self
            .schema
            .columns()
            .iter()
            .filter(|c| frame.column(**c).is_none())
            .map(FeatureColumn::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::SchemaMismatch(format!(
                "engineered rows lack columns {missing:?}"
            )));
        }

        let start = frame.len() - self.lookback;
        let mut window = Array3::<f64>::zeros((1, self.lookback, self.schema.len()));
        for (col, column) in self.schema.columns().iter().enumerate() {
            let values = frame.column(*column).unwrap_or_default();
            for (row, value) in values[start..].iter().enumerate() {
                window[[0, row, col]] = *value;
            }
        }

        Ok(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candle::Candle;
    use crate::features::engineer_features;
    use chrono::{Days, NaiveDate};

    /// Engineered frame with exactly `rows` usable rows.
    fn frame_with_rows(rows: usize) -> FeatureFrame {
        let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
        let n = rows + 49;
        let candles: Vec<Candle> = (0..n)
            .map(|i| {
                let c = 50.0 + (i as f64 * 0.2).cos() * 3.0 + i as f64 * 0.05;
                Candle::new(start + Days::new(i as u64), c, c + 1.0, c - 1.0, c, 500.0)
            })
            .collect();
        let frame = engineer_features(&candles);
        assert_eq!(frame.len(), rows);
        frame
    }

    #[test]
    fn test_schema_rejects_unknown_name() {
        let result = FeatureSchema::from_names(&["Close", "Open_Interest"]);
        assert!(matches!(result, Err(ForecastError::SchemaMismatch(_))));
    }

    #[test]
    fn test_schema_rejects_duplicates_and_empty() {
        assert!(FeatureSchema::from_names(&["Close", "Close"]).is_err());
        assert!(FeatureSchema::from_names::<&str>(&[]).is_err());
    }

    #[test]
    fn test_schema_index_of() {
        let schema = FeatureSchema::from_names(&["RSI", "Close", "MA_7"]).unwrap();
        assert_eq!(schema.index_of(FeatureColumn::Close), Some(1));
        assert_eq!(schema.index_of(FeatureColumn::Atr), None);
        assert_eq!(schema.names(), vec!["RSI", "Close", "MA_7"]);
    }

    #[test]
    fn test_shape_independent_of_extra_history() {
        let schema = FeatureSchema::from_names(&["Close", "Volume", "RSI"]).unwrap();
        let builder = SequenceBuilder::new(&schema, DEFAULT_LOOKBACK);

        for rows in [60, 61, 150] {
            let window = builder.build(&frame_with_rows(rows)).unwrap();
            assert_eq!(window.dim(), (1, DEFAULT_LOOKBACK, 3));
        }
    }

    #[test]
    fn test_uses_last_rows_in_schema_order() {
        let frame = frame_with_rows(75);
        let schema = FeatureSchema::from_names(&["RSI", "Close"]).unwrap();
        let window = SequenceBuilder::new(&schema, 60).build(&frame).unwrap();

        let closes = frame.column(FeatureColumn::Close).unwrap();
        let rsi = frame.column(FeatureColumn::Rsi).unwrap();
        assert_eq!(window[[0, 0, 1]], closes[15]);
        assert_eq!(window[[0, 59, 1]], closes[74]);
        assert_eq!(window[[0, 59, 0]], rsi[74]);
    }

    #[test]
    fn test_lookback_boundary() {
        let schema = FeatureSchema::full();
        let builder = SequenceBuilder::new(&schema, 60);

        match builder.build(&frame_with_rows(59)) {
            Err(ForecastError::InsufficientHistory { required, actual }) => {
                assert_eq!(required, 60);
                assert_eq!(actual, 59);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }

        assert!(builder.build(&frame_with_rows(60)).is_ok());
    }

    #[test]
    fn test_removed_column_is_schema_mismatch() {
        let mut frame = frame_with_rows(60);
        frame.drop_column(FeatureColumn::BbUpper);

        let schema = FeatureSchema::full();
        let err = SequenceBuilder::new(&schema, 60).build(&frame).unwrap_err();
        match err {
            ForecastError::SchemaMismatch(msg) => assert!(msg.contains("BB_Upper")),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }
}

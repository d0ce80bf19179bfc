//! Frozen per-column scaler and the adapter that wraps model input/output.
//!
//! Only column-independent affine scalers are supported. The inverse path
//! rebuilds a full-width row around the single predicted value, which is only
//! valid when each column is denormalized on its own.

use ndarray::{Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::features::FeatureColumn;
use crate::sequence::FeatureSchema;

/// A fitted per-column normalizer.
///
/// Field names follow the fitted attributes of the usual min-max and standard
/// scalers, so `min_`/`scale_`/`mean_` are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scaler {
    /// `scaled = x * scale + min`
    MinMax {
        #[serde(alias = "min_")]
        min: Vec<f64>,
        #[serde(alias = "scale_")]
        scale: Vec<f64>,
    },
    /// `scaled = (x - mean) / scale`
    Standard {
        #[serde(alias = "mean_")]
        mean: Vec<f64>,
        #[serde(alias = "scale_")]
        scale: Vec<f64>,
    },
}

impl Scaler {
    /// Pass-through scaler of the given width.
    pub fn identity(width: usize) -> Self {
        Scaler::MinMax {
            min: vec![0.0; width],
            scale: vec![1.0; width],
        }
    }

    /// Number of columns the scaler was fitted on.
    pub fn width(&self) -> usize {
        match self {
            Scaler::MinMax { scale, .. } | Scaler::Standard { scale, .. } => scale.len(),
        }
    }

    /// Check internal consistency: matching parameter widths, finite values and
    /// a non-zero scale everywhere.
    pub fn validate(&self) -> Result<(), String> {
        let (offset, scale) = match self {
            Scaler::MinMax { min, scale } => (min, scale),
            Scaler::Standard { mean, scale } => (mean, scale),
        };
        if offset.len() != scale.len() {
            return Err(format!(
                "scaler parameter widths differ: {} offsets vs {} scales",
                offset.len(),
                scale.len()
            ));
        }
        if let Some(i) = offset.iter().position(|v| !v.is_finite()) {
            return Err(format!("scaler offset for column {i} is not finite"));
        }
        if let Some(i) = scale.iter().position(|v| !v.is_finite() || *v == 0.0) {
            return Err(format!("scaler scale for column {i} is zero or not finite"));
        }
        Ok(())
    }

    fn ensure_width(&self, columns: usize) -> Result<(), ForecastError> {
        if columns != self.width() {
            return Err(ForecastError::SchemaMismatch(format!(
                "scaler covers {} columns, input has {columns}",
                self.width()
            )));
        }
        Ok(())
    }

    /// Apply the forward transform to every row of `(rows, columns)` data.
    pub fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, ForecastError> {
        self.ensure_width(data.ncols())?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = match self {
                    Scaler::MinMax { min, scale } => *v * scale[j] + min[j],
                    Scaler::Standard { mean, scale } => (*v - mean[j]) / scale[j],
                };
            }
        }
        Ok(out)
    }

    /// Undo [`Scaler::transform`] row by row.
    pub fn inverse_transform(
        &self,
        data: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, ForecastError> {
        self.ensure_width(data.ncols())?;
        let mut out = data.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = match self {
                    Scaler::MinMax { min, scale } => (*v - min[j]) / scale[j],
                    Scaler::Standard { mean, scale } => *v * scale[j] + mean[j],
                };
            }
        }
        Ok(out)
    }
}

/// Scaler bound to the schema it was fitted on.
#[derive(Debug, Clone, Copy)]
pub struct ScalerAdapter<'a> {
    scaler: &'a Scaler,
    width: usize,
    close_index: usize,
}

impl<'a> ScalerAdapter<'a> {
    /// Fails with `SchemaMismatch` when the schema has no `Close` column or its
    /// width differs from the scaler's.
    pub fn new(scaler: &'a Scaler, schema: &FeatureSchema) -> Result<Self, ForecastError> {
        let close_index = schema.index_of(FeatureColumn::Close).ok_or_else(|| {
            ForecastError::SchemaMismatch("feature list has no Close column".to_string())
        })?;
        scaler.ensure_width(schema.len())?;
        Ok(Self {
            scaler,
            width: schema.len(),
            close_index,
        })
    }

    /// Schema position of `Close`.
    pub fn close_index(&self) -> usize {
        self.close_index
    }

    /// Scale a `(batch, lookback, features)` window and cast it for the model.
    pub fn forward(&self, window: &Array3<f64>) -> Result<Array3<f32>, ForecastError> {
        let (batch, lookback, features) = window.dim();
        let flat = window
            .to_shape((batch * lookback, features))
            .map_err(|e| ForecastError::InferenceFailure(format!("window reshape failed: {e}")))?;
        let scaled = self.scaler.transform(flat.view())?;
        scaled
            .mapv(|v| v as f32)
            .into_shape_with_order((batch, lookback, features))
            .map_err(|e| ForecastError::InferenceFailure(format!("window reshape failed: {e}")))
    }

    /// Denormalize a scaled close prediction back to price units.
    pub fn inverse_close(&self, scaled: f64) -> Result<f64, ForecastError> {
        let mut dummy = Array2::<f64>::zeros((1, self.width));
        dummy[[0, self.close_index]] = scaled;
        let unscaled = self.scaler.inverse_transform(dummy.view())?;
        Ok(unscaled[[0, self.close_index]])
    }
}

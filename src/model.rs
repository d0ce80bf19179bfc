//! Frozen sequence-to-one regressor.
//!
//! The pipeline only relies on the [`SequenceModel`] contract: a
//! `(1, lookback, features)` float32 tensor in, one scaled scalar out.
//! [`OnnxModel`] runs an exported network through ONNX Runtime.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use ndarray::Array3;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

/// Interface for the frozen forecasting model.
pub trait SequenceModel: Send + Sync {
    /// Predict the scaled next close for one window.
    fn predict(&self, input: &Array3<f32>) -> anyhow::Result<f32>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// ONNX Runtime backed model.
///
/// The session is behind a mutex because running it needs exclusive access;
/// requests still share one loaded graph.
pub struct OnnxModel {
    session: Mutex<Session>,
    name: String,
}

impl OnnxModel {
    /// Load an ONNX model file.
    ///
    /// # Example
    /// ```no_run
    /// use close_forecast::OnnxModel;
    /// use std::path::Path;
    ///
    /// let model = OnnxModel::load(Path::new("data/lstm_stock_model.onnx")).unwrap();
    /// ```
    pub fn load(model_path: &Path) -> anyhow::Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(model_path)
            .with_context(|| format!("loading ONNX model from {}", model_path.display()))?;

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self {
            session: Mutex::new(session),
            name,
        })
    }
}

impl SequenceModel for OnnxModel {
    fn predict(&self, input: &Array3<f32>) -> anyhow::Result<f32> {
        let input_tensor = Value::from_array(input.clone())?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("ONNX session lock poisoned"))?;
        let outputs = session.run(ort::inputs![input_tensor])?;

        let (_, data) = outputs[0].try_extract_tensor::<f32>()?;
        let prediction = data.first().copied();
        prediction.ok_or_else(|| anyhow::anyhow!("model output tensor is empty"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

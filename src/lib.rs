//! Next-day closing-price forecasts from a frozen sequence model.
//!
//! Daily candles go through a fixed indicator pipeline, the trailing window is
//! scaled with the training scaler, an ONNX model predicts the scaled close and
//! the result is mapped back to a price.

pub mod artifacts;
pub mod candle;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod scaler;
pub mod sequence;
pub mod server;
pub mod source;
pub mod window;

pub use artifacts::{ArtifactBundle, ArtifactCache, ArtifactLoader, ArtifactPaths, FsArtifactLoader};
pub use candle::Candle;
pub use config::{PipelineConfig, ServiceConfig};
pub use error::ForecastError;
pub use features::{engineer_features, FeatureColumn, FeatureFrame};
pub use model::{OnnxModel, SequenceModel};
pub use pipeline::{predict_next_close, Forecast, Forecaster, History};
pub use scaler::{Scaler, ScalerAdapter};
pub use sequence::{FeatureSchema, SequenceBuilder};
pub use window::RollingWindow;

/// Library-wide result type.
pub type Result<T, E = ForecastError> = std::result::Result<T, E>;

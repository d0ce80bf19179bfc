//! Service configuration.
//!
//! [`PipelineConfig`] holds the inference knobs and is serde-friendly.
//! [`ServiceConfig::from_env`] reads everything else from `FORECAST_*`
//! environment variables, falling back to defaults for unset or unparsable
//! values.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::artifacts::ArtifactPaths;
use crate::sequence::DEFAULT_LOOKBACK;

/// Configuration of the inference pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rows per model window
    pub lookback: usize,

    /// Calendar days of history requested for a forecast (before buffering)
    pub forecast_days_back: u32,

    /// Calendar days of history requested for the history operation
    pub history_days_back: u32,

    /// Multiplier on the day counts to cover weekends and holidays
    pub buffer_factor: f64,

    /// Candles returned by the history operation
    pub history_len: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback: DEFAULT_LOOKBACK,
            forecast_days_back: 300,
            history_days_back: 200,
            buffer_factor: 1.5,
            history_len: 100,
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address
    pub bind: String,
    pub port: u16,
    /// Path prefix of the versioned API routes.
    pub api_prefix: String,
    /// Directory holding the default artifact files
    pub data_dir: PathBuf,
    pub artifacts: ArtifactPaths,
    /// Upper bound on one market-data request
    pub fetch_timeout: Duration,
    pub pipeline: PipelineConfig,
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or(default)
}

impl ServiceConfig {
    /// Read configuration from `FORECAST_*` environment variables.
    ///
    /// Unset, blank or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        let data_dir = env_path("FORECAST_DATA_DIR", PathBuf::from("data"));
        let defaults = ArtifactPaths::in_dir(&data_dir);
        let artifacts = ArtifactPaths {
            model_path: env_path("FORECAST_MODEL_PATH", defaults.model_path),
            preprocessor_path: env_path("FORECAST_PREPROCESSOR_PATH", defaults.preprocessor_path),
        };

        let base = PipelineConfig::default();
        let pipeline = PipelineConfig {
            lookback: env_parse("FORECAST_LOOKBACK", base.lookback),
            forecast_days_back: env_parse("FORECAST_DAYS_BACK", base.forecast_days_back),
            history_days_back: env_parse("FORECAST_HISTORY_DAYS_BACK", base.history_days_back),
            buffer_factor: env_parse("FORECAST_BUFFER_FACTOR", base.buffer_factor),
            history_len: env_parse("FORECAST_HISTORY_LEN", base.history_len),
        };

        Self {
            bind: env_str("FORECAST_BIND", "0.0.0.0"),
            port: env_parse("FORECAST_PORT", 8000),
            api_prefix: env_str("FORECAST_API_PREFIX", "/api/v1"),
            data_dir,
            artifacts,
            fetch_timeout: Duration::from_secs(env_parse("FORECAST_FETCH_TIMEOUT_SECS", 15)),
            pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.lookback, 60);
        assert_eq!(config.forecast_days_back, 300);
        assert_eq!(config.history_days_back, 200);
        assert_eq!(config.history_len, 100);
        assert!((config.buffer_factor - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pipeline_config_from_json() {
        let json = r#"{"lookback": 30, "forecast_days_back": 180, "history_days_back": 120,
                       "buffer_factor": 2.0, "history_len": 50}"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.lookback, 30);
        assert_eq!(config.history_len, 50);
        assert!((config.buffer_factor - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_env_parse_falls_back() {
        assert_eq!(env_parse("FORECAST_TEST_UNSET_VARIABLE", 42u16), 42);
    }

    #[test]
    fn test_artifact_paths_in_data_dir() {
        let paths = ArtifactPaths::in_dir(&PathBuf::from("/srv/forecast"));
        assert_eq!(paths.model_path, PathBuf::from("/srv/forecast/lstm_stock_model.onnx"));
        assert_eq!(
            paths.preprocessor_path,
            PathBuf::from("/srv/forecast/preprocessor.json")
        );
    }
}

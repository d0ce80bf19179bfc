//! Typed failure outcomes of the forecast pipeline.

use thiserror::Error;

/// Every way a forecast or history request can fail.
///
/// Each pipeline stage raises the most specific variant it can determine. Callers
/// use [`ForecastError::is_client_error`] to tell bad input apart from a broken
/// deployment.
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Model, scaler or feature list missing or corrupt.
    #[error("model artifacts unavailable: {0}")]
    ArtifactUnavailable(String),

    /// Upstream market data empty or malformed, or the ticker is invalid.
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// Too few rows survived feature engineering to fill one lookback window.
    #[error(
        "insufficient history after feature engineering: need at least {required} rows, got {actual}"
    )]
    InsufficientHistory { required: usize, actual: usize },

    /// The feature list references columns the engine cannot produce.
    #[error("feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The model invocation itself failed.
    #[error("inference failed: {0}")]
    InferenceFailure(String),
}

impl ForecastError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ArtifactUnavailable(_) => "artifact_unavailable",
            Self::DataUnavailable(_) => "data_unavailable",
            Self::InsufficientHistory { .. } => "insufficient_history",
            Self::SchemaMismatch(_) => "schema_mismatch",
            Self::InferenceFailure(_) => "inference_failure",
        }
    }

    /// True when the request itself is at fault (bad ticker, too little history).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable(_) | Self::InsufficientHistory { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_vs_server_errors() {
        assert!(ForecastError::DataUnavailable("x".into()).is_client_error());
        assert!(ForecastError::InsufficientHistory {
            required: 60,
            actual: 10
        }
        .is_client_error());
        assert!(!ForecastError::ArtifactUnavailable("x".into()).is_client_error());
        assert!(!ForecastError::SchemaMismatch("x".into()).is_client_error());
        assert!(!ForecastError::InferenceFailure("x".into()).is_client_error());
    }

    #[test]
    fn test_insufficient_history_message_carries_counts() {
        let err = ForecastError::InsufficientHistory {
            required: 60,
            actual: 59,
        };
        let msg = err.to_string();
        assert!(msg.contains("60"));
        assert!(msg.contains("59"));
        assert_eq!(err.kind(), "insufficient_history");
    }
}

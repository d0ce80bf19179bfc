//! Inference orchestration: fetch → engineer → select → scale → predict →
//! unscale.
//!
//! [`Forecaster`] holds no per-request state. It reads the shared artifact
//! bundle through [`ArtifactCache`] and never retries a failed stage.

use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::artifacts::{ArtifactBundle, ArtifactCache};
use crate::candle::{last_complete, Candle};
use crate::config::PipelineConfig;
use crate::error::ForecastError;
use crate::features::engineer_features;
use crate::scaler::ScalerAdapter;
use crate::sequence::SequenceBuilder;
use crate::source::{fetch_candles, lookback_range, CandleSource};

/// Predicted close for the day after the last observed candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub ticker: String,
    pub predicted_close: f64,
    pub target_date: NaiveDate,
}

/// Most recent usable candles for a ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub ticker: String,
    pub history: Vec<Candle>,
}

/// Run the frozen model over `candles` and return the unscaled next close.
///
/// Synchronous core of the pipeline, independent of how the candles and the
/// bundle were obtained.
pub fn predict_next_close(
    bundle: &ArtifactBundle,
    candles: &[Candle],
    lookback: usize,
) -> Result<f64, ForecastError> {
    let frame = engineer_features(candles);
    tracing::debug!(
        input_rows = candles.len(),
        usable_rows = frame.len(),
        "engineered features"
    );

    let window = SequenceBuilder::new(&bundle.schema, lookback).build(&frame)?;
    let adapter = ScalerAdapter::new(&bundle.scaler, &bundle.schema)?;
    let input = adapter.forward(&window)?;

    let scaled = bundle
        .model
        .predict(&input)
        .map_err(|e| ForecastError::InferenceFailure(format!("{e:#}")))?;
    if !scaled.is_finite() {
        return Err(ForecastError::InferenceFailure(format!(
            "model {} returned non-finite output {scaled}",
            bundle.model.name()
        )));
    }

    adapter.inverse_close(f64::from(scaled))
}

/// Target date for a forecast: one calendar day after the last candle.
///
/// Weekends and holidays are not skipped.
pub fn next_target_date(last: NaiveDate) -> Result<NaiveDate, ForecastError> {
    last.checked_add_days(Days::new(1)).ok_or_else(|| {
        ForecastError::DataUnavailable(format!("no calendar day after {last}"))
    })
}

fn normalize_ticker(ticker: &str) -> Result<String, ForecastError> {
    let ticker = ticker.trim();
    if ticker.is_empty() {
        return Err(ForecastError::DataUnavailable(
            "ticker must not be empty".to_string(),
        ));
    }
    Ok(ticker.to_ascii_uppercase())
}

/// Forecast and history operations over a market-data source.
pub struct Forecaster {
    artifacts: Arc<ArtifactCache>,
    source: Arc<dyn CandleSource>,
    config: PipelineConfig,
}

impl Forecaster {
    /// Create a forecaster.
    ///
    /// # Arguments
    /// * `artifacts` - Shared cache holding the model bundle
    /// * `source` - Market-data source for daily candles
    /// * `config` - Lookback and fetch-window settings
    pub fn new(
        artifacts: Arc<ArtifactCache>,
        source: Arc<dyn CandleSource>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            artifacts,
            source,
            config,
        }
    }

    /// Artifact cache backing this forecaster.
    pub fn artifacts(&self) -> &Arc<ArtifactCache> {
        &self.artifacts
    }

    /// Pipeline settings in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Eagerly load artifacts at startup.
    ///
    /// A failure is logged and swallowed; the next forecast retries the load.
    pub async fn warm_up(&self) -> bool {
        match self.artifacts.get_or_load().await {
            Ok(bundle) => {
                tracing::info!(
                    model = bundle.model.name(),
                    features = bundle.schema.len(),
                    "artifacts ready"
                );
                true
            }
            Err(e) => {
                tracing::warn!("artifact preload failed, will retry on first request: {e}");
                false
            }
        }
    }

    /// Forecast the next close using history up to today (UTC).
    pub async fn forecast(&self, ticker: &str) -> Result<Forecast, ForecastError> {
        self.forecast_as_of(ticker, Utc::now().date_naive()).await
    }

    /// Forecast using history fetched up to `today`.
    pub async fn forecast_as_of(
        &self,
        ticker: &str,
        today: NaiveDate,
    ) -> Result<Forecast, ForecastError> {
        let ticker = normalize_ticker(ticker)?;
        let bundle = self.artifacts.get_or_load().await?;

        let (start, end) = lookback_range(
            today,
            self.config.forecast_days_back,
            self.config.buffer_factor,
        );
        let candles = fetch_candles(self.source.as_ref(), &ticker, start, end).await?;
        let last_date = match candles.last() {
            Some(c) => c.date,
            None => {
                return Err(ForecastError::DataUnavailable(format!(
                    "{ticker}: no candles"
                )))
            }
        };

        // feature engineering and the ONNX run are CPU-bound
        let lookback = self.config.lookback;
        let predicted_close = tokio::task::spawn_blocking(move || {
            predict_next_close(&bundle, &candles, lookback)
        })
        .await
        .map_err(|e| ForecastError::InferenceFailure(format!("inference task failed: {e}")))??;
        let target_date = next_target_date(last_date)?;

        tracing::info!(
            ticker = %ticker,
            predicted_close,
            %target_date,
            "served forecast"
        );
        Ok(Forecast {
            ticker,
            predicted_close,
            target_date,
        })
    }

    /// Last `history_len` complete candles up to today (UTC).
    pub async fn history(&self, ticker: &str) -> Result<History, ForecastError> {
        self.history_as_of(ticker, Utc::now().date_naive()).await
    }

    /// History fetched up to `today`.
    pub async fn history_as_of(
        &self,
        ticker: &str,
        today: NaiveDate,
    ) -> Result<History, ForecastError> {
        let ticker = normalize_ticker(ticker)?;
        let (start, end) = lookback_range(
            today,
            self.config.history_days_back,
            self.config.buffer_factor,
        );
        let candles = fetch_candles(self.source.as_ref(), &ticker, start, end).await?;
        let history = last_complete(&candles, self.config.history_len);

        tracing::debug!(ticker = %ticker, rows = history.len(), "served history");
        Ok(History { ticker, history })
    }
}

//! Market-data source abstraction.
//!
//! [`CandleSource`] is the seam to whatever vendor supplies daily candles. The
//! pipeline only sees normalized [`Candle`]s; every provider failure becomes
//! `DataUnavailable`.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use chrono::NaiveDate;
//! use close_forecast::source::{CandleSource, ProviderError, RawFrame};
//!
//! struct EmptySource;
//!
//! #[async_trait]
//! impl CandleSource for EmptySource {
//!     async fn fetch_daily(
//!         &self,
//!         _ticker: &str,
//!         _start: NaiveDate,
//!         _end: NaiveDate,
//!     ) -> Result<RawFrame, ProviderError> {
//!         Ok(RawFrame::default())
//!     }
//! }
//! ```

pub mod frame;
pub mod yahoo;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use thiserror::Error;

use crate::candle::{ensure_ascending, Candle};
use crate::error::ForecastError;

pub use frame::{ColumnLabel, RawFrame, RawRow, REQUIRED_COLUMNS};
pub use yahoo::YahooChartSource;

/// Errors that can occur within a `CandleSource` implementation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// An error during the HTTP request (network failure, timeout).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with an error message (unknown ticker, rate limit).
    #[error("provider error: {0}")]
    Api(String),

    /// The request parameters were rejected before sending.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The response could not be interpreted.
    #[error("malformed response: {0}")]
    Internal(String),
}

/// Supplier of daily candles for one ticker over `[start, end)`.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError>;
}

/// Calendar range ending `today` that covers `days_back` days, widened by
/// `buffer_factor` for weekends and holidays.
pub fn lookback_range(today: NaiveDate, days_back: u32, buffer_factor: f64) -> (NaiveDate, NaiveDate) {
    let span = (f64::from(days_back) * buffer_factor).round().max(0.0) as u64;
    let start = today.checked_sub_days(Days::new(span)).unwrap_or(NaiveDate::MIN);
    (start, today)
}

/// Fetch and normalize candles for `ticker`.
pub async fn fetch_candles(
    source: &dyn CandleSource,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Candle>, ForecastError> {
    let frame = source
        .fetch_daily(ticker, start, end)
        .await
        .map_err(|e| ForecastError::DataUnavailable(format!("{ticker}: {e}")))?;

    let candles = frame.normalize()?;
    ensure_ascending(&candles)?;

    tracing::debug!(
        ticker,
        rows = candles.len(),
        %start,
        %end,
        "fetched daily candles"
    );
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl CandleSource for FailingSource {
        async fn fetch_daily(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<RawFrame, ProviderError> {
            Err(ProviderError::Api("No data found, symbol may be delisted".into()))
        }
    }

    struct EmptySource;

    #[async_trait]
    impl CandleSource for EmptySource {
        async fn fetch_daily(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<RawFrame, ProviderError> {
            Ok(RawFrame::new(
                REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect(),
            ))
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
    }

    #[test]
    fn test_lookback_range_applies_buffer() {
        let (start, end) = lookback_range(today(), 300, 1.5);
        assert_eq!(end, today());
        assert_eq!((end - start).num_days(), 450);
    }

    #[tokio::test]
    async fn test_provider_error_is_data_unavailable() {
        let result = fetch_candles(&FailingSource, "XXXX", today(), today()).await;
        match result {
            Err(ForecastError::DataUnavailable(msg)) => assert!(msg.contains("XXXX")),
            other => panic!("expected DataUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_rows_is_data_unavailable() {
        let result = fetch_candles(&EmptySource, "SPY", today(), today()).await;
        assert!(matches!(result, Err(ForecastError::DataUnavailable(_))));
    }
}

//! Daily candles from the Yahoo Finance chart API.
//!
//! Prices are auto-adjusted: open, high, low and close are rescaled by the
//! ratio of adjusted to raw close, volume is left as reported.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::Client;
use serde::Deserialize;

use crate::source::frame::{ColumnLabel, RawFrame, REQUIRED_COLUMNS};
use crate::source::{CandleSource, ProviderError};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; close-forecast/0.1)";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl ChartError {
    fn message(&self) -> String {
        match (&self.code, &self.description) {
            (Some(code), Some(desc)) => format!("{code}: {desc}"),
            (None, Some(desc)) => desc.clone(),
            (Some(code), None) => code.clone(),
            (None, None) => "unknown chart error".to_string(),
        }
    }
}

/// HTTP client for the chart endpoint.
pub struct YahooChartSource {
    client: Client,
    base_url: String,
}

impl YahooChartSource {
    /// Build a source whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }
}

fn validate_ticker(ticker: &str) -> Result<(), ProviderError> {
    let valid = !ticker.is_empty()
        && ticker.len() <= 16
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if valid {
        Ok(())
    } else {
        Err(ProviderError::Validation(format!("invalid ticker {ticker:?}")))
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

/// Turn a decoded chart payload into a flat, auto-adjusted frame.
fn chart_to_frame(response: ChartResponse) -> Result<RawFrame, ProviderError> {
    if let Some(err) = response.chart.error {
        return Err(ProviderError::Api(err.message()));
    }
    let mut frame = RawFrame::new(REQUIRED_COLUMNS.iter().map(|c| ColumnLabel::flat(c)).collect());

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(frame);
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    for (i, &ts) in result.timestamp.iter().enumerate() {
        let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .ok_or_else(|| ProviderError::Internal(format!("timestamp {ts} out of range")))?
            .date_naive();

        let close = at(&quote.close, i);
        let ratio = match (close, at(&adjclose, i)) {
            (Some(c), Some(adj)) if c != 0.0 => adj / c,
            _ => 1.0,
        };
        let adjust = |v: Option<f64>| v.map(|v| v * ratio);

        frame.push_row(
            date,
            vec![
                adjust(at(&quote.open, i)),
                adjust(at(&quote.high, i)),
                adjust(at(&quote.low, i)),
                adjust(close),
                at(&quote.volume, i),
            ],
        );
    }

    Ok(frame)
}

#[async_trait]
impl CandleSource for YahooChartSource {
    async fn fetch_daily(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RawFrame, ProviderError> {
        validate_ticker(ticker)?;

        let url = format!("{}/{}", self.base_url, ticker);
        let query = [
            ("period1", unix_midnight(start).to_string()),
            ("period2", unix_midnight(end).to_string()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];

        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<ChartResponse>(&body) {
            Ok(chart) => chart_to_frame(chart),
            Err(_) if !status.is_success() => Err(ProviderError::Api(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            ))),
            Err(e) => Err(ProviderError::Internal(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"currency": "USD", "symbol": "SPY", "gmtoffset": -18000},
                "timestamp": [1704205800, 1704292200],
                "indicators": {
                    "quote": [{
                        "open": [476.25, 470.43],
                        "high": [476.36, 471.19],
                        "low": [470.53, 468.17],
                        "close": [472.65, null],
                        "volume": [123623700, 103585900]
                    }],
                    "adjclose": [{"adjclose": [466.0, null]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_chart_to_frame_adjusts_prices() {
        let chart: ChartResponse = serde_json::from_str(SAMPLE).unwrap();
        let frame = chart_to_frame(chart).unwrap();
        let candles = frame.normalize().unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(candles[1].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());

        let ratio = 466.0 / 472.65;
        assert!((candles[0].close - 466.0).abs() < 1e-9);
        assert!((candles[0].open - 476.25 * ratio).abs() < 1e-9);
        assert_eq!(candles[0].volume, 123623700.0);

        // missing close: no adjustment, close stays missing
        assert!(candles[1].close.is_nan());
        assert_eq!(candles[1].open, 470.43);
    }

    #[test]
    fn test_chart_error_is_api_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let chart: ChartResponse = serde_json::from_str(body).unwrap();
        match chart_to_frame(chart) {
            Err(ProviderError::Api(msg)) => assert!(msg.contains("delisted")),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn test_result_without_timestamps_is_empty() {
        let body = r#"{"chart": {"result": [{"meta": {}, "indicators": {"quote": [{}]}}], "error": null}}"#;
        let chart: ChartResponse = serde_json::from_str(body).unwrap();
        let frame = chart_to_frame(chart).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn test_validate_ticker() {
        assert!(validate_ticker("SPY").is_ok());
        assert!(validate_ticker("BRK-B").is_ok());
        assert!(validate_ticker("^GSPC").is_ok());
        assert!(validate_ticker("").is_err());
        assert!(validate_ticker("SPY/../x").is_err());
    }
}

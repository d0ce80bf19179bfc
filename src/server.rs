//! HTTP surface: liveness probe, history and forecast routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::error::ForecastError;
use crate::pipeline::{Forecast, Forecaster, History};

/// Ticker used when a request names none.
pub const DEFAULT_TICKER: &str = "SPY";

fn default_ticker() -> String {
    DEFAULT_TICKER.to_string()
}

/// Query string of the history route.
#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    #[serde(default = "default_ticker")]
    pub ticker: String,
}

/// JSON body of the predict route.
#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_ticker")]
    pub ticker: String,
}

impl IntoResponse for ForecastError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{self}");
        } else {
            tracing::warn!(kind = self.kind(), "{self}");
        }

        let body = json!({ "error": self.kind(), "detail": self.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Shared state of every handler.
pub type AppState = Arc<Forecaster>;

/// Build the service router with the versioned routes under `prefix`.
pub fn router(state: AppState, prefix: &str) -> Router {
    let api = Router::new()
        .route("/history", get(history))
        .route("/predict", post(predict));

    let app = Router::new().route("/health", get(health));
    let app = if prefix.is_empty() || prefix == "/" {
        app.merge(api)
    } else {
        app.nest(prefix, api)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET {prefix}/history?ticker=`
pub async fn history(
    State(forecaster): State<AppState>,
    Query(query): Query<TickerQuery>,
) -> Result<Json<History>, ForecastError> {
    forecaster.history(&query.ticker).await.map(Json)
}

/// `POST {prefix}/predict` with `{"ticker": ...}`
pub async fn predict(
    State(forecaster): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Forecast>, ForecastError> {
    forecaster.forecast(&request.ticker).await.map(Json)
}

//! Operational HTTP endpoints.
//!
//! - `/`        : static page linking the others
//! - `/health`  : JSON liveness
//! - `/metrics` : text exposition of the latest sample

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

use hostprobe_core::metrics::{encode_text, TEXT_CONTENT_TYPE};

use crate::app_state::AppState;
use crate::obs::metrics::SCRAPE_ERRORS_TOTAL;

const INDEX_HTML: &str = r#"<html>
  <head><title>hostprobe exporter</title></head>
  <body>
    <h1>hostprobe: process and container exporter</h1>
    <p><a href="/metrics">Metrics</a></p>
    <p><a href="/health">Health Check</a></p>
  </body>
</html>
"#;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.health_check() {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "unhealthy", "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// Render the registry as it stands. Never triggers a sampling pass.
pub async fn metrics(State(state): State<AppState>) -> Response {
    let registry = state.registry();
    match registry.snapshot().and_then(|snap| encode_text(&snap)) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, code = e.code().as_str(), "scrape failed");
            if let Err(count_err) = registry.increment(SCRAPE_ERRORS_TOTAL, &[], 1.0) {
                tracing::warn!(error = %count_err, "scrape error not counted");
            }
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

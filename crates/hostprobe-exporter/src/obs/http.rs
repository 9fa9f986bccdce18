//! Request instrumentation middleware.
//!
//! Every request bumps `http_requests_in_flight` for its lifetime and, on
//! completion, records one `http_requests_total` increment and one
//! `http_request_duration_seconds` observation labeled by method, route
//! template, and status code.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use hostprobe_core::metrics::Registry;

use crate::app_state::AppState;
use crate::obs::metrics::{HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION};

/// Holds one unit of `http_requests_in_flight`; released on drop, so the
/// decrement also runs when the handler panics or the request is cancelled.
pub struct InFlight {
    registry: Arc<Registry>,
}

impl InFlight {
    pub fn enter(registry: Arc<Registry>) -> Self {
        if let Err(e) = registry.add(HTTP_REQUESTS_IN_FLIGHT, &[], 1.0) {
            tracing::warn!(error = %e, "in-flight increment failed");
        }
        Self { registry }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if let Err(e) = self.registry.add(HTTP_REQUESTS_IN_FLIGHT, &[], -1.0) {
            tracing::warn!(error = %e, "in-flight decrement failed");
        }
    }
}

/// Route label: the matched template, or the raw path when nothing matched.
fn route_label(req: &Request) -> String {
    match req.extensions().get::<MatchedPath>() {
        Some(matched) => matched.as_str().to_owned(),
        None => {
            // Unmatched paths are client-controlled: unbounded label cardinality.
            let raw = req.uri().path().to_owned();
            tracing::debug!(path = %raw, "request matched no route; labeling with raw path");
            raw
        }
    }
}

pub async fn track_http(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let registry = state.registry();
    let method = req.method().as_str().to_owned();
    let route = route_label(&req);

    let _in_flight = InFlight::enter(Arc::clone(&registry));
    let started = Instant::now();
    let response = next.run(req).await;
    let elapsed = started.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();
    let labels = [method.as_str(), route.as_str(), status.as_str()];
    let recorded = registry.transaction(|tx| {
        tx.increment(HTTP_REQUESTS_TOTAL, &labels, 1.0)?;
        tx.observe(HTTP_REQUEST_DURATION, &labels, elapsed)
    });
    if let Err(e) = recorded {
        tracing::warn!(error = %e, code = e.code().as_str(), "request metrics not recorded");
    }

    response
}

//! Axum router wiring.
//!
//! `/`, `/health`, and `/metrics`, all wrapped by the request instrumentation
//! layer. The explicit fallback keeps 404s inside the layer too.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, obs, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ops::index))
        .route("/health", get(ops::health))
        .route("/metrics", get(ops::metrics))
        .fallback(ops::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            obs::http::track_http,
        ))
        .with_state(state)
}

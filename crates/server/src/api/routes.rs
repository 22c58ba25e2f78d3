use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::middleware::{make_request_span, metrics_middleware};
use super::{handlers, redirect, stremio};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // The catalog client drops stream responses without CORS headers.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/config", get(handlers::get_config))
        .route("/{credential}/manifest.json", get(stremio::manifest))
        .route(
            "/{credential}/stream/{media_type}/{id}",
            get(stremio::streams),
        )
        .route("/redirect/{ticket_id}", get(redirect::follow))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .with_state(state)
}

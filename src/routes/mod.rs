pub mod api;
pub mod sse;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeader,
    trace::TraceLayer,
};

use crate::AppState;

/// JSON body of every failed pull request and of the stream's `error` event.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn build_router(state: AppState) -> Router {
    // Compression is only safe for complete responses, never for the event stream.
    let pull = Router::new()
        .route("/api/cluster", get(api::handle_cluster))
        .route("/api/nodes", get(api::handle_nodes))
        .route("/api/pods", get(api::handle_pods))
        .layer(CompressionLayer::new());

    let push = Router::new().route("/api/overview/stream", get(sse::handle_overview_stream));

    let static_dir = state.config.static_dir.clone();
    let index = SetResponseHeader::overriding(
        ServeFile::new(static_dir.join("index.html")),
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );

    Router::new()
        .merge(pull)
        .merge(push)
        .route("/healthz", get(api::handle_healthz))
        .nest_service("/assets", ServeDir::new(static_dir.join("assets")))
        .route_service("/favicon.svg", ServeFile::new(static_dir.join("favicon.svg")))
        // Client-side routes resolve to the SPA entry point.
        .fallback_service(index)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

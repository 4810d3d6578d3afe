use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use super::ErrorBody;
use crate::AppState;
use crate::clients::ClientError;

fn overview_response<T: Serialize>(what: &str, result: Result<T, ClientError>) -> Response {
    match result {
        Ok(overview) => Json(overview).into_response(),
        Err(e) => {
            warn!("{} failed: {}", what, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

pub async fn handle_cluster(State(state): State<AppState>) -> Response {
    overview_response("cluster overview", state.aggregator.cluster_overview().await)
}

pub async fn handle_nodes(State(state): State<AppState>) -> Response {
    overview_response("node overview", state.aggregator.node_overview().await)
}

pub async fn handle_pods(State(state): State<AppState>) -> Response {
    overview_response("pod overview", state.aggregator.pod_overview().await)
}

pub async fn handle_healthz() -> &'static str {
    "ok\n"
}

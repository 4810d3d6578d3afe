use axum::{
    extract::State,
    http::{HeaderName, HeaderValue},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::StreamExt;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, error};

use super::ErrorBody;
use crate::AppState;
use crate::clients::broadcaster::OverviewEvent;

fn json_event(name: &str, data: &impl Serialize) -> Event {
    Event::default().event(name).json_data(data).unwrap_or_else(|e| {
        error!("encoding {} event: {}", name, e);
        Event::default()
            .event("error")
            .data(r#"{"error":"failed to encode overview"}"#)
    })
}

fn to_sse(event: OverviewEvent) -> Event {
    match event {
        OverviewEvent::Snapshot(snapshot) => json_event("message", &*snapshot),
        OverviewEvent::Error(error) => json_event("error", &ErrorBody { error }),
    }
}

/// Pushes `{cluster, nodes, pods}` every interval until the client goes away
/// or an aggregation fails, in which case one `error` event ends the stream.
pub async fn handle_overview_stream(State(state): State<AppState>) -> Response {
    debug!("overview stream subscriber connected");

    let events = state
        .broadcaster
        .subscribe()
        .map(|event| Ok::<_, Infallible>(to_sse(event)));

    (
        [(
            HeaderName::from_static("x-accel-buffering"),
            HeaderValue::from_static("no"),
        )],
        Sse::new(events).keep_alive(KeepAlive::default().interval(Duration::from_secs(15))),
    )
        .into_response()
}

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::StreamExt;

use rover::sink::HistogramSnapshot;

use crate::AppState;

/// How often the SSE stream pushes a snapshot.
const STREAM_TICK: Duration = Duration::from_secs(1);

// ─── GET /api/metrics ────────────────────────────────────────────

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<HistogramSnapshot> {
    Json(state.metrics.snapshot())
}

// ─── POST /api/metrics/reset ─────────────────────────────────────

pub async fn reset_metrics(State(state): State<Arc<AppState>>) -> StatusCode {
    state.metrics.reset();
    StatusCode::NO_CONTENT
}

// ─── GET /api/metrics/stream ─────────────────────────────────────

/// Server-Sent Events: one `HistogramSnapshot` as JSON per tick.
pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = IntervalStream::new(tokio::time::interval(STREAM_TICK)).map(move |_| {
        let event = Event::default()
            .event("snapshot")
            .json_data(state.metrics.snapshot())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to encode metrics snapshot");
                Event::default().comment("encode error")
            });
        Ok(event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

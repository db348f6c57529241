use thiserror::Error;

/// Failure reported by a [`MetricsSink`](crate::sink::MetricsSink).
///
/// The timing middleware only ever logs these; they never reach the client.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("emission queue is full")]
    QueueFull,
    #[error("sink is closed")]
    Closed,
}

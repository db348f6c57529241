//! Where timing samples go.
//!
//! Sinks implement [`MetricsSink`] and are handed to [`crate::Rover`] as a
//! [`SinkHandle`]. The middleware treats every sink as fire-and-forget.

pub mod background;
pub mod histogram;
pub mod percentiles;

use std::sync::Arc;
use std::time::Duration;

use crate::error::SinkError;

pub use background::BackgroundSink;
pub use histogram::{HistogramSink, HistogramSnapshot};

/// One timing observation, emitted once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSample {
    /// e.g. "get.list_users.timing" or "/api/users/42"
    pub identity: String,
    pub duration: Duration,
    pub tags: Vec<String>,
    pub sample_rate: f64,
}

/// Destination for timing samples (statsd client, in-process histogram, ...).
///
/// Implementations should return quickly; anything slow belongs behind a
/// [`BackgroundSink`].
pub trait MetricsSink: Send + Sync {
    fn timing(&self, sample: TimingSample) -> Result<(), SinkError>;
}

/// Shared handle to a sink.
pub type SinkHandle = Arc<dyn MetricsSink>;

/// Accepts and drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn timing(&self, _sample: TimingSample) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Create a no-op sink handle.
#[inline]
pub fn noop_sink() -> SinkHandle {
    Arc::new(NoopSink)
}

impl<S: MetricsSink + ?Sized> MetricsSink for Arc<S> {
    fn timing(&self, sample: TimingSample) -> Result<(), SinkError> {
        (**self).timing(sample)
    }
}

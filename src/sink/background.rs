use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use super::{MetricsSink, SinkHandle, TimingSample};
use crate::error::SinkError;

/// Moves emission off the request path.
///
/// `timing()` only does a non-blocking `try_send` onto a bounded channel; a
/// spawned task drains the channel into the wrapped sink. When the channel is
/// full the sample is dropped and `SinkError::QueueFull` is returned.
#[derive(Debug, Clone)]
pub struct BackgroundSink {
    tx: mpsc::Sender<TimingSample>,
}

impl BackgroundSink {
    /// Spawns the drain task on the current tokio runtime.
    ///
    /// The task exits once every clone of the returned sink is dropped and
    /// the queue is empty; await the handle for a clean shutdown.
    pub fn spawn(inner: SinkHandle, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<TimingSample>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                let identity = sample.identity.clone();
                if let Err(e) = inner.timing(sample) {
                    tracing::warn!(%identity, error = %e, "background sink dropped sample");
                }
            }
            tracing::debug!("background sink drained");
        });

        (Self { tx }, handle)
    }
}

impl MetricsSink for BackgroundSink {
    fn timing(&self, sample: TimingSample) -> Result<(), SinkError> {
        self.tx.try_send(sample).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::QueueFull,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

use std::collections::{BTreeMap, VecDeque};
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::{MetricsSink, TimingSample};
use crate::error::SinkError;

// ─── Configuration ───────────────────────────────────────────────

/// How many individual samples we keep for the live feed
const MAX_RECENT_SAMPLES: usize = 200;

/// Aggregate timeline resolution (one point per window)
const TIMELINE_WINDOW_MS: u64 = 500;

/// Distinct identities tracked before new ones are folded into
/// [`OVERFLOW_IDENTITY`]. Each one owns a full histogram.
pub const MAX_IDENTITIES: usize = 256;

/// Bucket for samples whose identity arrived after the cap was reached.
pub const OVERFLOW_IDENTITY: &str = "other";

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

// ─── Public types ────────────────────────────────────────────────

/// In-process sink: one HdrHistogram per identity plus an overall one.
///
/// Meant for development and for serving `/api/metrics`; a production
/// deployment would point [`crate::Rover`] at a real backend instead.
pub struct HistogramSink {
    inner: Mutex<Inner>,
}

/// A single entry in the live sample feed.
#[derive(Debug, Clone, Serialize)]
pub struct SampleRecord {
    pub timestamp_ms: u64,
    pub identity: String,
    pub duration_us: u64,
    pub tags: Vec<String>,
}

/// Percentiles for one identity.
#[derive(Debug, Clone, Serialize)]
pub struct IdentityStats {
    pub identity: String,
    pub latency_us: PercentileSet,
}

/// One aggregated point on the timeline (per 500 ms window).
#[derive(Debug, Clone, Serialize)]
pub struct TimelinePoint {
    pub timestamp_ms: u64,
    pub avg_us: f64,
    pub count: u64,
}

/// Read-only view of everything the sink has seen since the last reset.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    pub overall: PercentileSet,
    /// Sorted by identity.
    pub identities: Vec<IdentityStats>,
    pub total_samples: u64,
    /// Samples recorded under [`OVERFLOW_IDENTITY`] because the identity cap
    /// was reached.
    pub folded_samples: u64,
    pub samples_per_sec: f64,
    pub elapsed_secs: f64,
    pub recent_samples: Vec<SampleRecord>,
    pub timeline: Vec<TimelinePoint>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    overall: Histogram<u64>,
    per_identity: BTreeMap<String, Histogram<u64>>,
    total_samples: u64,
    folded_samples: u64,
    recent_samples: VecDeque<SampleRecord>,
    timeline: Vec<TimelinePoint>,
    current_window: Option<WindowAccumulator>,
    // Wall-clock anchor for elapsed time
    start_time: Option<Instant>,
}

struct WindowAccumulator {
    window_start_ms: u64,
    sum_us: u64,
    count: u64,
}

impl WindowAccumulator {
    fn point(&self) -> TimelinePoint {
        TimelinePoint {
            timestamp_ms: self.window_start_ms,
            avg_us: self.sum_us as f64 / self.count as f64,
            count: self.count,
        }
    }
}

fn new_histogram() -> Histogram<u64> {
    Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
        .expect("constant histogram bounds are valid")
}

// ─── HistogramSink impl ──────────────────────────────────────────

impl HistogramSink {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::new()),
        }
    }

    /// Wipe all data.
    pub fn reset(&self) {
        *self.inner.lock() = Inner::new();
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Default for HistogramSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for HistogramSink {
    fn timing(&self, sample: TimingSample) -> Result<(), SinkError> {
        self.inner.lock().record(sample);
        Ok(())
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

impl Inner {
    fn new() -> Self {
        Self {
            overall: new_histogram(),
            per_identity: BTreeMap::new(),
            total_samples: 0,
            folded_samples: 0,
            recent_samples: VecDeque::with_capacity(MAX_RECENT_SAMPLES + 1),
            timeline: Vec::new(),
            current_window: None,
            start_time: None,
        }
    }

    fn record(&mut self, sample: TimingSample) {
        let start = *self.start_time.get_or_insert_with(Instant::now);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Clamp to ≥ 1 μs and ≤ the histogram ceiling
        let us = (sample.duration.as_micros() as u64).clamp(HIST_LOW, HIST_HIGH);

        self.total_samples += 1;
        let _ = self.overall.record(us);
        let _ = self.identity_histogram(&sample.identity).record(us);

        self.push_to_timeline(elapsed_ms, us);

        self.recent_samples.push_back(SampleRecord {
            timestamp_ms: elapsed_ms,
            identity: sample.identity,
            duration_us: us,
            tags: sample.tags,
        });
        if self.recent_samples.len() > MAX_RECENT_SAMPLES {
            self.recent_samples.pop_front();
        }
    }

    /// Histogram for `identity`, or the overflow bucket once
    /// `MAX_IDENTITIES` distinct names are tracked.
    fn identity_histogram(&mut self, identity: &str) -> &mut Histogram<u64> {
        let key = if self.per_identity.contains_key(identity)
            || self.per_identity.len() < MAX_IDENTITIES
        {
            identity
        } else {
            if self.folded_samples == 0 {
                tracing::warn!(
                    limit = MAX_IDENTITIES,
                    %identity,
                    overflow = OVERFLOW_IDENTITY,
                    "identity limit reached; folding new identities"
                );
            }
            self.folded_samples += 1;
            OVERFLOW_IDENTITY
        };
        self.per_identity
            .entry(key.to_owned())
            .or_insert_with(new_histogram)
    }

    fn push_to_timeline(&mut self, elapsed_ms: u64, us: u64) {
        let window_start = (elapsed_ms / TIMELINE_WINDOW_MS) * TIMELINE_WINDOW_MS;

        match &mut self.current_window {
            Some(w) if w.window_start_ms == window_start => {
                w.sum_us += us;
                w.count += 1;
                return;
            }
            Some(w) => self.timeline.push(w.point()),
            None => {}
        }
        self.current_window = Some(WindowAccumulator {
            window_start_ms: window_start,
            sum_us: us,
            count: 1,
        });
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let elapsed_secs = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);

        let samples_per_sec = if elapsed_secs > 0.0 {
            self.total_samples as f64 / elapsed_secs
        } else {
            0.0
        };

        // Include the current (partial) window
        let mut timeline = self.timeline.clone();
        if let Some(w) = &self.current_window {
            timeline.push(w.point());
        }

        HistogramSnapshot {
            overall: PercentileSet::from_histogram(&self.overall),
            identities: self
                .per_identity
                .iter()
                .map(|(identity, hist)| IdentityStats {
                    identity: identity.clone(),
                    latency_us: PercentileSet::from_histogram(hist),
                })
                .collect(),
            total_samples: self.total_samples,
            folded_samples: self.folded_samples,
            samples_per_sec,
            elapsed_secs,
            recent_samples: self.recent_samples.iter().cloned().collect(),
            timeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sample(identity: &str, ms: u64) -> TimingSample {
        TimingSample {
            identity: identity.into(),
            duration: Duration::from_millis(ms),
            tags: vec!["http:method:GET".into()],
            sample_rate: 1.0,
        }
    }

    #[test]
    fn groups_by_identity() {
        let sink = HistogramSink::new();
        sink.timing(sample("/users", 2)).unwrap();
        sink.timing(sample("/users", 4)).unwrap();
        sink.timing(sample("get.list_users.timing", 1)).unwrap();

        let snap = sink.snapshot();
        assert_eq!(snap.total_samples, 3);
        assert_eq!(snap.overall.count, 3);

        let names: Vec<_> = snap.identities.iter().map(|s| s.identity.as_str()).collect();
        assert_eq!(names, ["/users", "get.list_users.timing"]);
        assert_eq!(snap.identities[0].latency_us.count, 2);
        assert_eq!(snap.identities[1].latency_us.count, 1);
    }

    #[test]
    fn distinct_identities_are_capped() {
        let sink = HistogramSink::new();
        for i in 0..(MAX_IDENTITIES + 500) {
            sink.timing(sample(&format!("/nope/{i}"), 1)).unwrap();
        }
        // Identities seen before the cap keep their own histogram.
        sink.timing(sample("/nope/0", 1)).unwrap();

        let snap = sink.snapshot();
        assert_eq!(snap.identities.len(), MAX_IDENTITIES + 1);
        assert_eq!(snap.folded_samples, 500);
        assert_eq!(snap.total_samples, (MAX_IDENTITIES + 501) as u64);

        let other = snap
            .identities
            .iter()
            .find(|s| s.identity == OVERFLOW_IDENTITY)
            .unwrap();
        assert_eq!(other.latency_us.count, 500);
        let first = snap.identities.iter().find(|s| s.identity == "/nope/0").unwrap();
        assert_eq!(first.latency_us.count, 2);
    }

    #[test]
    fn zero_duration_is_clamped() {
        let sink = HistogramSink::new();
        sink.timing(sample("/fast", 0)).unwrap();

        let snap = sink.snapshot();
        assert_eq!(snap.recent_samples[0].duration_us, 1);
        assert_eq!(snap.overall.min, 1);
    }

    #[test]
    fn recent_feed_is_bounded_and_reset_clears() {
        let sink = HistogramSink::new();
        for _ in 0..(MAX_RECENT_SAMPLES + 10) {
            sink.timing(sample("/users", 1)).unwrap();
        }
        let snap = sink.snapshot();
        assert_eq!(snap.recent_samples.len(), MAX_RECENT_SAMPLES);
        assert!(!snap.timeline.is_empty());

        sink.reset();
        let snap = sink.snapshot();
        assert_eq!(snap.total_samples, 0);
        assert_eq!(snap.folded_samples, 0);
        assert!(snap.identities.is_empty());
        assert!(!snap.overall.has_data());
    }
}

use hdrhistogram::Histogram;
use serde::Serialize;

/// Latency summary (μs) for one identity, or for all of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileSet {
    pub count: u64,
    pub min: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl PercentileSet {
    /// Zeroed when the histogram is empty.
    pub fn from_histogram(hist: &Histogram<u64>) -> Self {
        if hist.len() == 0 {
            return Self::default();
        }

        let at = |q: f64| hist.value_at_quantile(q);
        Self {
            count: hist.len(),
            min: hist.min(),
            mean: hist.mean(),
            p50: at(0.50),
            p90: at(0.90),
            p99: at(0.99),
            p999: at(0.999),
            max: hist.max(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}

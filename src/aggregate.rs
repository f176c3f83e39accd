use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::sampler::TrialRevenue;

/// Number of equal-width histogram buckets spanning `[min, max]`.
pub const NUM_BUCKETS: usize = 20;

/// Revenue at fixed ranks of the sorted trial sequence (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p10: u64,
    pub p25: u64,
    pub p50: u64,
    pub p75: u64,
    pub p90: u64,
}

impl Percentiles {
    fn flat(value: u64) -> Self {
        Self { p10: value, p25: value, p50: value, p75: value, p90: value }
    }

    pub fn as_array(&self) -> [u64; 5] {
        [self.p10, self.p25, self.p50, self.p75, self.p90]
    }
}

/// Summary of one completed forecast. All revenue figures are cents.
///
/// `distribution[i]` is the count of trials in bucket `i` divided by the count
/// of the fullest bucket, so the mode reads exactly 1.0. `buckets[i]` is that
/// bucket's lower bound; the two vectors always have [`NUM_BUCKETS`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub expected_revenue: f64,
    pub min_revenue: u64,
    pub max_revenue: u64,
    pub percentiles: Percentiles,
    pub distribution: Vec<f64>,
    pub buckets: Vec<f64>,
}

impl SimulationResult {
    /// The result of a run whose every trial realized `value`: all statistics
    /// collapse onto it and the whole mass sits in bucket 0.
    pub fn degenerate(value: u64) -> Self {
        let mut distribution = vec![0.0; NUM_BUCKETS];
        distribution[0] = 1.0;
        Self {
            expected_revenue: value as f64,
            min_revenue: value,
            max_revenue: value,
            percentiles: Percentiles::flat(value),
            distribution,
            buckets: vec![value as f64; NUM_BUCKETS],
        }
    }

    /// Width of each histogram bucket in cents. Zero for a degenerate result.
    pub fn bucket_width(&self) -> f64 {
        (self.max_revenue - self.min_revenue) as f64 / NUM_BUCKETS as f64
    }
}

/// Element at index `floor(n * k)` of an ascending slice. Index by truncation,
/// no interpolation; ties are kept as they are.
fn rank(sorted: &[u64], k: f64) -> u64 {
    let n = sorted.len();
    let idx = ((n as f64) * k).floor() as usize;
    sorted[idx.min(n - 1)]
}

/// Reduce a batch of trial revenues to expected value, extrema, percentiles
/// and a normalized 20-bucket histogram.
pub fn summarize(trial_revenues: &[TrialRevenue]) -> Result<SimulationResult> {
    if trial_revenues.is_empty() {
        return Err(ForecastError::EmptyTrialSet);
    }

    let mut sorted = trial_revenues.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();

    let expected_revenue = sorted.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let min_revenue = sorted[0];
    let max_revenue = sorted[n - 1];

    let percentiles = Percentiles {
        p10: rank(&sorted, 0.1),
        p25: rank(&sorted, 0.25),
        p50: rank(&sorted, 0.5),
        p75: rank(&sorted, 0.75),
        p90: rank(&sorted, 0.9),
    };

    let min = min_revenue as f64;
    let bucket_size = (max_revenue - min_revenue) as f64 / NUM_BUCKETS as f64;
    let buckets: Vec<f64> = (0..NUM_BUCKETS).map(|i| min + i as f64 * bucket_size).collect();

    let mut counts = [0u64; NUM_BUCKETS];
    for &v in &sorted {
        // A zero-width range would divide by zero; every trial shares the one value.
        let idx = if bucket_size == 0.0 {
            0
        } else {
            (((v as f64 - min) / bucket_size).floor() as usize).min(NUM_BUCKETS - 1)
        };
        counts[idx] += 1;
    }

    // n > 0, so at least one bucket is non-empty.
    let max_count = counts.iter().copied().max().unwrap_or(1) as f64;
    let distribution = counts.iter().map(|&c| c as f64 / max_count).collect();

    Ok(SimulationResult {
        expected_revenue,
        min_revenue,
        max_revenue,
        percentiles,
        distribution,
        buckets,
    })
}

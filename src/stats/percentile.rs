//! Percentile and aggregate calculations over response times.

use crate::policy::AggregationMethod;

/// Nearest-rank percentile of `samples`.
///
/// The samples are sorted ascending and the value at index
/// `floor(len * p / 100)`, clamped to the last element, is returned. No
/// interpolation is done. Returns 0 for an empty slice.
pub fn compute_percentile(samples: &[f64], p: u8) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let index = (sorted.len() * p as usize) / 100;
    sorted[index.min(sorted.len() - 1)]
}

/// Reduce `samples` to one value with the given method. Returns 0 for an empty slice.
pub fn aggregate(samples: &[f64], method: AggregationMethod, percentile: u8) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    match method {
        AggregationMethod::Max => samples.iter().copied().fold(f64::MIN, f64::max),
        AggregationMethod::Min => samples.iter().copied().fold(f64::MAX, f64::min),
        AggregationMethod::Avg => samples.iter().sum::<f64>() / samples.len() as f64,
        AggregationMethod::Percentile => compute_percentile(samples, percentile),
    }
}

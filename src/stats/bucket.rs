//! Time bucketing of history for the response-time graph.

use crate::api::HistoryRecord;
use crate::policy::PolicyConfig;

use super::aggregate;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One chart point: a contiguous run of records reduced to a single latency.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketData {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub aggregated_latency: f64,
    pub sample_count: usize,
    pub status_code_counts: BTreeMap<u16, u64>,
    /// Any record in the run had a code `>= 400` or `0`.
    pub has_errors: bool,
    #[serde(skip)]
    pub source_records: Vec<HistoryRecord>,
}

/// Group `history` into at most `max_buckets` time-ordered buckets.
///
/// Records are sorted by time first. Every bucket holds
/// `ceil(len / max_buckets)` records except possibly the last one.
pub fn bucketize(history: &[HistoryRecord], max_buckets: usize, policy: &PolicyConfig) -> Vec<BucketData> {
    if history.is_empty() || max_buckets == 0 {
        return Vec::new();
    }

    let mut sorted = history.to_vec();
    sorted.sort_by_key(|r| r.date_time);

    let bucket_size = sorted.len().div_ceil(max_buckets);

    sorted
        .chunks(bucket_size)
        .map(|run| {
            let latencies: Vec<f64> = run.iter().map(|r| r.response_time_ms).collect();

            let mut status_code_counts = BTreeMap::new();
            for r in run {
                *status_code_counts.entry(r.status_code).or_insert(0) += 1;
            }

            BucketData {
                start_time: run[0].date_time,
                end_time: run[run.len() - 1].date_time,
                aggregated_latency: aggregate(
                    &latencies,
                    policy.graph_aggregation_method,
                    policy.percentile,
                ),
                sample_count: run.len(),
                status_code_counts,
                has_errors: run.iter().any(HistoryRecord::is_error),
                source_records: run.to_vec(),
            }
        })
        .collect()
}

/// Value range of a bucket series and where the latency thresholds fall in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartBounds {
    pub min_latency: f64,
    pub max_latency: f64,
    pub first_time: DateTime<Utc>,
    pub last_time: DateTime<Utc>,
    pub warning_in_range: bool,
    pub critical_in_range: bool,
}

impl ChartBounds {
    /// Bounds of `buckets`, or `None` when there are none.
    pub fn from_buckets(buckets: &[BucketData], policy: &PolicyConfig) -> Option<Self> {
        let first = buckets.first()?;
        let last = buckets.last()?;

        let (min_latency, max_latency) = buckets.iter().fold((f64::MAX, f64::MIN), |(lo, hi), b| {
            (lo.min(b.aggregated_latency), hi.max(b.aggregated_latency))
        });
        let in_range = |v: f64| v >= min_latency && v <= max_latency;

        Some(Self {
            min_latency,
            max_latency,
            first_time: first.start_time,
            last_time: last.end_time,
            warning_in_range: in_range(policy.warning_latency_ms),
            critical_in_range: in_range(policy.critical_latency_ms),
        })
    }
}

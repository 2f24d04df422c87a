//! Recomputing history summaries for a filtered view.

use crate::api::{HistoryRecord, HistorySummary, ResponseTimeSummary};
use crate::policy::HistoryFilter;

use std::collections::BTreeMap;

/// The time-sorted suffix of `history` selected by `filter`.
pub fn filter_history(history: &[HistoryRecord], filter: HistoryFilter) -> Vec<HistoryRecord> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|r| r.date_time);

    match filter {
        HistoryFilter::All => sorted,
        HistoryFilter::Last(n) => {
            let skip = sorted.len().saturating_sub(n);
            sorted.split_off(skip)
        }
    }
}

/// Build a summary over exactly `records`.
///
/// The result always satisfies `sum(status_summary) == record_count == records.len()`.
pub fn summarize(watch_name: &str, records: &[HistoryRecord]) -> HistorySummary {
    let mut status_summary = BTreeMap::new();
    for r in records {
        *status_summary.entry(r.status_code).or_insert(0) += 1;
    }

    let response_time = if records.is_empty() {
        ResponseTimeSummary::default()
    } else {
        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut sum = 0.0;
        for r in records {
            min = min.min(r.response_time_ms);
            max = max.max(r.response_time_ms);
            sum += r.response_time_ms;
        }
        ResponseTimeSummary {
            min,
            max,
            avg: sum / records.len() as f64,
        }
    };

    HistorySummary {
        watch_name: watch_name.to_string(),
        record_count: records.len() as u64,
        first_event_time: records.iter().map(|r| r.date_time).min(),
        last_event_time: records.iter().map(|r| r.date_time).max(),
        response_time,
        status_summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(minute: i64, status_code: u16, response_time_ms: f64) -> HistoryRecord {
        HistoryRecord {
            date_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
            status_code,
            response_time_ms,
        }
    }

    #[test]
    fn test_filter_takes_latest() {
        let history = vec![
            record(4, 200, 4.0),
            record(0, 200, 0.0),
            record(3, 500, 3.0),
            record(1, 200, 1.0),
            record(2, 200, 2.0),
        ];

        let last = filter_history(&history, HistoryFilter::Last(2));
        let times: Vec<f64> = last.iter().map(|r| r.response_time_ms).collect();
        assert_eq!(times, vec![3.0, 4.0]);

        assert_eq!(filter_history(&history, HistoryFilter::Last(50)).len(), 5);
        let all = filter_history(&history, HistoryFilter::All);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].response_time_ms, 0.0);
    }

    #[test]
    fn test_summarize_consistent() {
        let history: Vec<HistoryRecord> = (0..40)
            .map(|i| record(i, if i % 4 == 0 { 503 } else { 200 }, 10.0 * i as f64))
            .collect();

        for filter in [HistoryFilter::Last(7), HistoryFilter::Last(30), HistoryFilter::All] {
            let subset = filter_history(&history, filter);
            let summary = summarize("api", &subset);
            let total: u64 = summary.status_summary.values().sum();
            assert_eq!(total, summary.record_count);
            assert_eq!(summary.record_count as usize, subset.len());
        }

        let summary = summarize("api", &filter_history(&history, HistoryFilter::Last(4)));
        assert_eq!(summary.response_time.min, 360.0);
        assert_eq!(summary.response_time.max, 390.0);
        assert!((summary.response_time.avg - 375.0).abs() < 1e-9);
        assert_eq!(summary.status_summary, BTreeMap::from([(200, 3), (503, 1)]));
        assert_eq!(summary.first_event_time, Some(record(36, 0, 0.0).date_time));
        assert_eq!(summary.last_event_time, Some(record(39, 0, 0.0).date_time));
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize("api", &[]);
        assert_eq!(summary.record_count, 0);
        assert!(summary.status_summary.is_empty());
        assert_eq!(summary.response_time, ResponseTimeSummary::default());
        assert!(summary.first_event_time.is_none());
    }
}

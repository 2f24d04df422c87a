//! Scoped per-watch views.
//!
//! A viewer looks at a watch through a history filter ("last 90 records").
//! The stoplight, the min/avg/max metrics and the watch's contribution to
//! global health each pick, through the policy, whether they follow the
//! complete history or only the filtered records.

use super::{classify, StoplightStatus, WatchStatusResult};
use crate::api::{HistoryRecord, HistorySummary, ResponseTimeSummary};
use crate::policy::{DataScope, GlobalStatusScope, HistoryFilter, PolicyConfig};
use crate::stats::{filter_history, summarize};

use serde::Serialize;

/// Record count and response times shown on a watch card.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchMetrics {
    pub record_count: u64,
    pub response_time: ResponseTimeSummary,
}

impl From<&HistorySummary> for WatchMetrics {
    fn from(summary: &HistorySummary) -> Self {
        Self {
            record_count: summary.record_count,
            response_time: summary.response_time,
        }
    }
}

/// A watch classified over both the complete and the filtered history.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchAssessment {
    /// Status over the complete history.
    pub total: WatchStatusResult,
    /// Status over the filtered records.
    pub filtered: WatchStatusResult,
    pub total_metrics: Option<WatchMetrics>,
    pub filtered_metrics: Option<WatchMetrics>,
    /// The filtered records, time-ordered.
    pub records: Vec<HistoryRecord>,
}

impl WatchAssessment {
    /// The stoplight to show, per `watchStatusScope`.
    pub fn status<'a>(&'a self, policy: &PolicyConfig) -> &'a WatchStatusResult {
        match policy.watch_status_scope {
            DataScope::Total => &self.total,
            DataScope::Filtered => &self.filtered,
        }
    }

    /// The metrics to show, per `summaryMetricsScope`.
    pub fn metrics(&self, policy: &PolicyConfig) -> Option<WatchMetrics> {
        match policy.summary_metrics_scope {
            DataScope::Total => self.total_metrics,
            DataScope::Filtered => self.filtered_metrics,
        }
    }

    /// The status this watch contributes to global health, per `globalStatusScope`.
    pub fn global_status(&self, policy: &PolicyConfig) -> StoplightStatus {
        match policy.global_status_scope {
            GlobalStatusScope::Default => self.total.status,
            GlobalStatusScope::Filtered => self.filtered.status,
        }
    }
}

/// Classify a watch over its complete history and over the records selected by `filter`.
///
/// The filtered figures are recomputed from the history itself. Without
/// history they fall back to the complete-history figures; without a summary
/// everything is grey.
pub fn assess(
    summary: Option<&HistorySummary>,
    history: Option<&[HistoryRecord]>,
    filter: HistoryFilter,
    policy: &PolicyConfig,
) -> WatchAssessment {
    let Some(summary) = summary else {
        return WatchAssessment {
            total: WatchStatusResult::no_data(),
            filtered: WatchStatusResult::no_data(),
            total_metrics: None,
            filtered_metrics: None,
            records: Vec::new(),
        };
    };

    let total = classify(Some(summary), history, policy);
    let total_metrics = Some(WatchMetrics::from(summary));

    match history {
        Some(history) => {
            let records = filter_history(history, filter);
            let subset_summary = summarize(&summary.watch_name, &records);
            WatchAssessment {
                total,
                filtered: classify(Some(&subset_summary), Some(records.as_slice()), policy),
                total_metrics,
                filtered_metrics: Some(WatchMetrics::from(&subset_summary)),
                records,
            }
        }
        None => WatchAssessment {
            filtered: total.clone(),
            total,
            total_metrics,
            filtered_metrics: total_metrics,
            records: Vec::new(),
        },
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

    /// 60 old failures followed by 30 fast successes.
    fn recovering_history() -> Vec<HistoryRecord> {
        (0..90)
            .map(|i| if i < 60 { record(i, 503, 4000.0) } else { record(i, 200, 50.0) })
            .collect()
    }

    #[test]
    fn test_total_and_filtered_differ() {
        let policy = PolicyConfig::default();
        let history = recovering_history();
        let summary = summarize("api", &history);

        let a = assess(Some(&summary), Some(history.as_slice()), HistoryFilter::Last(30), &policy);
        assert_eq!(a.total.status, StoplightStatus::Red);
        assert_eq!(a.filtered.status, StoplightStatus::Green);
        assert_eq!(a.records.len(), 30);
        assert_eq!(a.total_metrics.unwrap().record_count, 90);
        assert_eq!(a.filtered_metrics.unwrap().record_count, 30);
        assert_eq!(a.filtered_metrics.unwrap().response_time.max, 50.0);
    }

    #[test]
    fn test_scopes_are_independent() {
        let history = recovering_history();
        let summary = summarize("api", &history);

        let policy = PolicyConfig {
            watch_status_scope: DataScope::Total,
            summary_metrics_scope: DataScope::Filtered,
            ..Default::default()
        };
        let a = assess(Some(&summary), Some(history.as_slice()), HistoryFilter::Last(30), &policy);
        assert_eq!(a.status(&policy).status, StoplightStatus::Red);
        assert_eq!(a.metrics(&policy).unwrap().record_count, 30);

        let policy = PolicyConfig {
            watch_status_scope: DataScope::Filtered,
            summary_metrics_scope: DataScope::Total,
            ..Default::default()
        };
        assert_eq!(a.status(&policy).status, StoplightStatus::Green);
        assert_eq!(a.metrics(&policy).unwrap().record_count, 90);
    }

    #[test]
    fn test_global_scope() {
        let history = recovering_history();
        let summary = summarize("api", &history);
        let a = assess(Some(&summary), Some(history.as_slice()), HistoryFilter::Last(30), &PolicyConfig::default());

        let policy = PolicyConfig {
            global_status_scope: GlobalStatusScope::Default,
            watch_status_scope: DataScope::Filtered,
            ..Default::default()
        };
        assert_eq!(a.global_status(&policy), StoplightStatus::Red);

        let policy = PolicyConfig {
            global_status_scope: GlobalStatusScope::Filtered,
            ..Default::default()
        };
        assert_eq!(a.global_status(&policy), StoplightStatus::Green);
    }

    #[test]
    fn test_missing_data() {
        let policy = PolicyConfig::default();
        let a = assess(None, None, HistoryFilter::All, &policy);
        assert_eq!(a.total.status, StoplightStatus::Grey);
        assert_eq!(a.filtered.status, StoplightStatus::Grey);
        assert!(a.metrics(&policy).is_none());

        let summary = summarize("api", &[record(0, 200, 1500.0)]);
        let a = assess(Some(&summary), None, HistoryFilter::Last(30), &policy);
        assert_eq!(a.total.status, StoplightStatus::Yellow);
        assert_eq!(a.filtered, a.total);
        assert_eq!(a.filtered_metrics, a.total_metrics);
    }
}

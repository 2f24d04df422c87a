//! Per-watch classification.

use super::{StoplightStatus, WatchStatusResult};
use crate::api::{is_error_code, HistoryRecord, HistorySummary};
use crate::policy::PolicyConfig;
use crate::stats::aggregate;

/// Classify one watch from its summary and (optionally) its raw history.
///
/// Rules are checked in order and the first match wins:
///
/// 1. no summary, or zero records: grey
/// 2. a status code in an override list: that list's colour (red > yellow > green)
/// 3. any code `>= 400` or `0`: red
/// 4. latency at or above the critical threshold: red
/// 5. latency at or above the warning threshold: yellow
/// 6. both 2xx and non-2xx codes present: yellow
/// 7. otherwise green
///
/// The latency is the policy's aggregate over the history, or the summary
/// average when no history is available.
pub fn classify(
    summary: Option<&HistorySummary>,
    history: Option<&[HistoryRecord]>,
    policy: &PolicyConfig,
) -> WatchStatusResult {
    let summary = match summary {
        Some(s) if s.record_count > 0 => s,
        _ => return WatchStatusResult::no_data(),
    };

    let latency = match history {
        Some(records) if !records.is_empty() => {
            let samples: Vec<f64> = records.iter().map(|r| r.response_time_ms).collect();
            aggregate(&samples, policy.graph_aggregation_method, policy.percentile)
        }
        _ => summary.response_time.avg,
    };

    let result = |status: StoplightStatus, reason: String| WatchStatusResult {
        status,
        representative_latency: Some(latency),
        reason,
    };
    let latency_reason = || format!("{}: {} ms", policy.latency_label(), latency.round() as i64);

    // BTreeMap keys: ascending and unique.
    let codes: Vec<u16> = summary.status_summary.keys().copied().collect();

    let overrides = &policy.status_code_overrides;
    for (status, list) in [
        (StoplightStatus::Red, &overrides.red),
        (StoplightStatus::Yellow, &overrides.yellow),
        (StoplightStatus::Green, &overrides.green),
    ] {
        let matched: Vec<u16> = codes.iter().copied().filter(|c| list.contains(c)).collect();
        if !matched.is_empty() {
            return result(status, format!("Status override: {}", join_codes(&matched)));
        }
    }

    let failed: Vec<u16> = codes.iter().copied().filter(|&c| is_error_code(c)).collect();
    if !failed.is_empty() {
        return result(
            StoplightStatus::Red,
            format!("Error responses: {}", join_codes(&failed)),
        );
    }

    if latency >= policy.critical_latency_ms {
        return result(StoplightStatus::Red, latency_reason());
    }

    if latency >= policy.warning_latency_ms {
        return result(StoplightStatus::Yellow, latency_reason());
    }

    if has_mixed_status_codes(&codes) {
        return result(StoplightStatus::Yellow, "Mixed status codes".to_string());
    }

    result(StoplightStatus::Green, latency_reason())
}

fn is_success(code: u16) -> bool {
    (200..300).contains(&code)
}

fn has_mixed_status_codes(codes: &[u16]) -> bool {
    codes.iter().any(|&c| is_success(c)) && codes.iter().any(|&c| !is_success(c))
}

fn join_codes(codes: &[u16]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

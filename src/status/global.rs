//! System-wide health from many watch statuses.

use super::StoplightStatus;
use crate::policy::{PolicyConfig, StrobeTarget};

use serde::Serialize;
use std::collections::BTreeMap;

/// The most severe status present; grey when empty or all grey.
pub fn aggregate_global(statuses: &[StoplightStatus]) -> StoplightStatus {
    statuses.iter().copied().max().unwrap_or(StoplightStatus::Grey)
}

/// Number of watches in each status. All four statuses are always present.
pub fn count_by_status(statuses: &[StoplightStatus]) -> BTreeMap<StoplightStatus, usize> {
    let mut counts: BTreeMap<StoplightStatus, usize> =
        StoplightStatus::ALL.iter().map(|&s| (s, 0)).collect();
    for status in statuses {
        *counts.entry(*status).or_insert(0) += 1;
    }
    counts
}

/// One watch as seen by the global summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalEntry {
    pub active: bool,
    pub status: StoplightStatus,
}

/// Global stoplight and the per-status breakdown behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalHealth {
    pub status: StoplightStatus,
    pub label: &'static str,
    pub counts: BTreeMap<StoplightStatus, usize>,
    /// Watches that took part, after inactive filtering.
    pub included: usize,
    pub strobe: bool,
}

impl GlobalHealth {
    /// Reduce `entries`, dropping inactive watches as the policy says.
    ///
    /// `show_inactive` is the viewer's toggle, consulted only for `dynamic` inclusion.
    pub fn from_entries(entries: &[GlobalEntry], policy: &PolicyConfig, show_inactive: bool) -> Self {
        let statuses: Vec<StoplightStatus> = entries
            .iter()
            .filter(|e| policy.inactive_watch_inclusion.includes(e.active, show_inactive))
            .map(|e| e.status)
            .collect();

        let status = aggregate_global(&statuses);
        Self {
            status,
            label: status.label(),
            counts: count_by_status(&statuses),
            included: statuses.len(),
            strobe: policy.strobe.strobes(status, StrobeTarget::Summary),
        }
    }
}

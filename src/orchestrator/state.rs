//! Cached dashboard state and the views derived from it.

use crate::api::{ApiError, HistoryRecord, HistorySummary, Watch};
use crate::policy::{HistoryFilter, PolicyConfig, StrobeTarget};
use crate::status::{assess, GlobalEntry, GlobalHealth, StoplightStatus, WatchAssessment, WatchMetrics};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// History and summary fetched for one watch.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchPayload {
    pub summary: HistorySummary,
    pub history: Vec<HistoryRecord>,
}

/// A watch whose data could not be fetched. Classified as absent data.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("failed to fetch data for {watch}: {error}")]
pub struct FetchFailure {
    pub watch: String,
    pub error: ApiError,
}

/// One watch in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEntry {
    pub watch: Watch,
    /// `None` while the fetch is still in flight.
    pub data: Option<Result<WatchPayload, FetchFailure>>,
}

impl WatchEntry {
    pub fn loading(watch: Watch) -> Self {
        Self { watch, data: None }
    }

    pub fn resolved(watch: Watch, data: Result<WatchPayload, FetchFailure>) -> Self {
        Self {
            watch,
            data: Some(data),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.data.is_none()
    }

    pub fn payload(&self) -> Option<&WatchPayload> {
        self.data.as_ref().and_then(|d| d.as_ref().ok())
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        self.data.as_ref().and_then(|d| d.as_ref().err())
    }

    /// Classify this watch through a viewer's history filter.
    pub fn assess(&self, filter: HistoryFilter, policy: &PolicyConfig) -> WatchAssessment {
        let payload = self.payload();
        assess(
            payload.map(|p| &p.summary),
            payload.map(|p| p.history.as_slice()),
            filter,
            policy,
        )
    }
}

/// Snapshot of everything the dashboard knows.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    /// The last watch listing succeeded.
    pub connected: bool,
    pub last_error: Option<String>,
    /// Completion time of the last refresh that was not superseded.
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Generation of the refresh that produced `watches`.
    pub generation: u64,
    pub watches: Vec<WatchEntry>,
}

/// A watch card as served to the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchView {
    pub name: String,
    pub url: String,
    pub interval_minutes: u32,
    pub active: bool,
    pub loading: bool,
    pub status: StoplightStatus,
    pub reason: String,
    pub representative_latency: Option<f64>,
    pub metrics: Option<WatchMetrics>,
    pub strobe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DashboardState {
    pub fn find(&self, name: &str) -> Option<&WatchEntry> {
        self.watches.iter().find(|e| e.watch.name == name)
    }

    /// Per-watch views through the given history filter.
    pub fn watch_views(&self, filter: HistoryFilter, policy: &PolicyConfig) -> Vec<WatchView> {
        self.watches
            .iter()
            .map(|entry| {
                let assessment = entry.assess(filter, policy);
                let status = assessment.status(policy);
                let loading = entry.is_loading();
                WatchView {
                    name: entry.watch.name.clone(),
                    url: entry.watch.url.clone(),
                    interval_minutes: entry.watch.interval_minutes,
                    active: entry.watch.active,
                    loading,
                    status: status.status,
                    reason: status.reason.clone(),
                    representative_latency: status.representative_latency,
                    metrics: assessment.metrics(policy),
                    strobe: !loading && policy.strobe.strobes(status.status, StrobeTarget::Watch),
                    error: entry.failure().map(|f| f.error.to_string()),
                }
            })
            .collect()
    }

    /// Global health through the given history filter.
    pub fn global_health(
        &self,
        filter: HistoryFilter,
        policy: &PolicyConfig,
        show_inactive: bool,
    ) -> GlobalHealth {
        let entries: Vec<GlobalEntry> = self
            .watches
            .iter()
            .map(|entry| GlobalEntry {
                active: entry.watch.active,
                status: entry.assess(filter, policy).global_status(policy),
            })
            .collect();
        GlobalHealth::from_entries(&entries, policy, show_inactive)
    }
}

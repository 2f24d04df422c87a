//! HTTP request handlers.

use super::AppState;
use crate::api::{AddWatchRequest, ApiError, UpdateWatchRequest, Watch, WatchApi};
use crate::orchestrator::WatchView;
use crate::policy::{HistoryFilter, PolicyConfig, PolicyError, HISTORY_FILTER_OPTIONS};
use crate::stats::{bucketize, BucketData, ChartBounds};
use crate::status::{code_status, GlobalHealth, StoplightStatus};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum number of points on a response-time graph.
pub const GRAPH_MAX_BUCKETS: usize = 90;

// ============================================================================
// Templates (simple string replacement)
// ============================================================================

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");
const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");

// ============================================================================
// Query parameters and errors
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub filter: Option<String>,
    pub show_inactive: Option<bool>,
}

impl ViewQuery {
    /// The requested history filter, or the policy default when absent.
    pub fn history_filter(&self, policy: &PolicyConfig) -> Result<HistoryFilter, Response> {
        match self.filter.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(s) => s
                .parse()
                .map_err(|e: PolicyError| (StatusCode::BAD_REQUEST, e.to_string()).into_response()),
            None => Ok(policy.default_history_filter),
        }
    }

    pub fn show_inactive(&self) -> bool {
        self.show_inactive.unwrap_or(false)
    }
}

/// Status code a failed remote call is reported with.
pub fn api_error_status(e: &ApiError) -> StatusCode {
    match e {
        ApiError::MissingWatchName => StatusCode::BAD_REQUEST,
        ApiError::Status { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn api_error_response(e: &ApiError) -> Response {
    (api_error_status(e), e.to_string()).into_response()
}

fn not_found(name: &str) -> Response {
    (StatusCode::NOT_FOUND, format!("Watch not found: {}", name)).into_response()
}

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard<A: WatchApi>(
    State(state): State<AppState<A>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let policy = state.orchestrator.policy();
    let filter = match query.history_filter(policy) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let show_inactive = query.show_inactive();

    let snapshot = state.orchestrator.snapshot().await;
    let health = snapshot.global_health(filter, policy, show_inactive);
    let views: Vec<WatchView> = snapshot
        .watch_views(filter, policy)
        .into_iter()
        .filter(|v| v.active || show_inactive)
        .collect();

    let connection = if !state.config.api_key.is_empty() && snapshot.connected {
        match snapshot.refreshed_at {
            Some(t) => format!("Connected, refreshed {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "Connected".to_string(),
        }
    } else {
        match &snapshot.last_error {
            Some(e) => format!("Not connected: {}", escape_html(e)),
            None => "Not connected".to_string(),
        }
    };

    let content = DASHBOARD_TEMPLATE
        .replace("{{global_status}}", health.status.as_str())
        .replace("{{global_label}}", health.label)
        .replace("{{global_strobe}}", strobe_class(health.strobe))
        .replace("{{global_counts}}", &render_counts(&health))
        .replace("{{connection}}", &connection)
        .replace("{{filter_options}}", &render_filter_options(filter))
        .replace("{{show_inactive_checked}}", if show_inactive { "checked" } else { "" })
        .replace("{{strobe_speed}}", &policy.strobe.speed_seconds.to_string())
        .replace("{{latency_label}}", &policy.latency_label())
        .replace("{{rows}}", &render_rows(&views));

    let page = LAYOUT_TEMPLATE
        .replace("{{title}}", "BOCH Dashboard")
        .replace("{{content}}", &content);

    Html(page).into_response()
}

fn strobe_class(strobe: bool) -> &'static str {
    if strobe {
        "strobe"
    } else {
        ""
    }
}

fn render_counts(health: &GlobalHealth) -> String {
    health
        .counts
        .iter()
        .map(|(status, count)| format!("<span class=\"count {}\">{} {}</span>", status, count, status.label()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_filter_options(selected: HistoryFilter) -> String {
    let mut options = HISTORY_FILTER_OPTIONS.to_vec();
    if !options.contains(&selected) {
        options.push(selected);
    }
    options
        .iter()
        .map(|f| {
            let label = match f {
                HistoryFilter::All => "All records".to_string(),
                HistoryFilter::Last(n) => format!("Last {}", n),
            };
            let sel = if *f == selected { " selected" } else { "" };
            format!("<option value=\"{}\"{}>{}</option>", f, sel, label)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_rows(views: &[WatchView]) -> String {
    if views.is_empty() {
        return "<tr><td colspan=\"6\">No watches</td></tr>".to_string();
    }

    views
        .iter()
        .map(|v| {
            let reason = if v.loading { "Loading..." } else { v.reason.as_str() };
            let metrics = match &v.metrics {
                Some(m) => format!(
                    "{} records, min {:.0} / avg {:.0} / max {:.0} ms",
                    m.record_count, m.response_time.min, m.response_time.avg, m.response_time.max
                ),
                None => "-".to_string(),
            };
            format!(
                "<tr class=\"{}\"><td><span class=\"light {} {}\"></span></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                if v.active { "active" } else { "inactive" },
                v.status,
                strobe_class(v.strobe),
                escape_html(&v.name),
                escape_html(&v.url),
                escape_html(reason),
                metrics,
                if v.active { "Active" } else { "Inactive" },
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ============================================================================
// API: Views
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchesResponse {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub filter: HistoryFilter,
    pub filter_options: Vec<HistoryFilter>,
    pub watches: Vec<WatchView>,
}

pub async fn handle_get_watches<A: WatchApi>(
    State(state): State<AppState<A>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let policy = state.orchestrator.policy();
    let filter = match query.history_filter(policy) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let show_inactive = query.show_inactive();

    let snapshot = state.orchestrator.snapshot().await;
    let watches = snapshot
        .watch_views(filter, policy)
        .into_iter()
        .filter(|v| v.active || show_inactive)
        .collect();

    Json(WatchesResponse {
        connected: snapshot.connected,
        last_error: snapshot.last_error,
        refreshed_at: snapshot.refreshed_at,
        filter,
        filter_options: HISTORY_FILTER_OPTIONS.to_vec(),
        watches,
    })
    .into_response()
}

pub async fn handle_get_health<A: WatchApi>(
    State(state): State<AppState<A>>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let policy = state.orchestrator.policy();
    let filter = match query.history_filter(policy) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let snapshot = state.orchestrator.snapshot().await;
    Json(snapshot.global_health(filter, policy, query.show_inactive())).into_response()
}

/// One graph point with the colour of each status code seen in it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphBucket {
    #[serde(flatten)]
    pub bucket: BucketData,
    /// Worst colour among the bucket's status codes.
    pub status: StoplightStatus,
    pub code_colors: BTreeMap<u16, StoplightStatus>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphResponse {
    pub watch_name: String,
    pub filter: HistoryFilter,
    pub loading: bool,
    pub latency_label: String,
    pub warning_latency_ms: f64,
    pub critical_latency_ms: f64,
    pub buckets: Vec<GraphBucket>,
    pub bounds: Option<ChartBounds>,
}

pub async fn handle_get_graph<A: WatchApi>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
    Query(query): Query<ViewQuery>,
) -> Response {
    let policy = state.orchestrator.policy();
    let filter = match query.history_filter(policy) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let snapshot = state.orchestrator.snapshot().await;
    let entry = match snapshot.find(&name) {
        Some(e) => e,
        None => return not_found(&name),
    };

    let assessment = entry.assess(filter, policy);
    let buckets = bucketize(&assessment.records, GRAPH_MAX_BUCKETS, policy);
    let bounds = ChartBounds::from_buckets(&buckets, policy);

    let buckets = buckets
        .into_iter()
        .map(|bucket| {
            let code_colors: BTreeMap<u16, StoplightStatus> = bucket
                .status_code_counts
                .keys()
                .map(|&code| (code, code_status(code, &policy.status_code_overrides)))
                .collect();
            GraphBucket {
                status: code_colors.values().copied().max().unwrap_or(StoplightStatus::Grey),
                code_colors,
                bucket,
            }
        })
        .collect();

    Json(GraphResponse {
        watch_name: entry.watch.name.clone(),
        filter,
        loading: entry.is_loading(),
        latency_label: policy.latency_label(),
        warning_latency_ms: policy.warning_latency_ms,
        critical_latency_ms: policy.critical_latency_ms,
        buckets,
        bounds,
    })
    .into_response()
}

pub async fn handle_get_policy<A: WatchApi>(State(state): State<AppState<A>>) -> impl IntoResponse {
    Json(state.orchestrator.policy().clone())
}

// ============================================================================
// API: Mutations
// ============================================================================

pub async fn handle_create_watch<A: WatchApi>(
    State(state): State<AppState<A>>,
    Json(req): Json<AddWatchRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Watch name is required").into_response();
    }
    if req.interval_minutes == 0 {
        return (StatusCode::BAD_REQUEST, "Interval must be at least one minute").into_response();
    }

    match state.orchestrator.create_watch(&req).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => api_error_response(&e),
    }
}

pub async fn handle_update_watch<A: WatchApi>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateWatchRequest>,
) -> Response {
    // Fields equal to the cached watch are not sent.
    let req = match state.orchestrator.snapshot().await.find(&name) {
        Some(entry) => {
            let current = &entry.watch;
            let edited = Watch {
                name: req.name.clone().unwrap_or_else(|| current.name.clone()),
                url: req.url.clone().unwrap_or_else(|| current.url.clone()),
                custom_headers: req.custom_headers.clone().or_else(|| current.custom_headers.clone()),
                interval_minutes: req.interval_minutes.unwrap_or(current.interval_minutes),
                active: req.active.unwrap_or(current.active),
            };
            UpdateWatchRequest::diff(current, &edited)
        }
        None => req,
    };

    if req.is_empty() {
        return (StatusCode::BAD_REQUEST, "No changes").into_response();
    }

    match state.orchestrator.update_watch(&name, &req).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => api_error_response(&e),
    }
}

pub async fn handle_toggle_watch<A: WatchApi>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
) -> Response {
    let watch = match state.orchestrator.snapshot().await.find(&name) {
        Some(e) => e.watch.clone(),
        None => return not_found(&name),
    };

    match state.orchestrator.toggle_watch(&watch).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => api_error_response(&e),
    }
}

pub async fn handle_delete_watch<A: WatchApi>(
    State(state): State<AppState<A>>,
    Path(name): Path<String>,
) -> Response {
    match state.orchestrator.delete_watch(&name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => api_error_response(&e),
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub watches: usize,
}

pub async fn handle_refresh<A: WatchApi>(State(state): State<AppState<A>>) -> Response {
    match state.orchestrator.refresh().await {
        Ok(watches) => Json(RefreshResponse { watches }).into_response(),
        Err(e) => api_error_response(&e),
    }
}

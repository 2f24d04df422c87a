//! Wire types of the BOCH API.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// A monitored endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// JSON-encoded header map, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<String>,
    pub interval_minutes: u32,
    #[serde(default)]
    pub active: bool,
}

/// One probe result. The remote `peekResponseContent` field is dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub date_time: DateTime<Utc>,
    /// HTTP status code; `0` means the request failed below HTTP.
    pub status_code: u16,
    pub response_time_ms: f64,
}

impl HistoryRecord {
    /// Whether this record counts as a failed response.
    pub fn is_error(&self) -> bool {
        is_error_code(self.status_code)
    }
}

/// `>= 400`, or `0` for timeouts and connection failures.
pub fn is_error_code(code: u16) -> bool {
    code >= 400 || code == 0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    #[serde(default)]
    pub watch_name: String,
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
}

/// Min/max/avg response time in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeSummary {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Aggregate statistics over a watch's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    #[serde(default)]
    pub watch_name: String,
    // Misspelled by the remote API.
    #[serde(rename = "histroyRecordCount", alias = "recordCount", default)]
    pub record_count: u64,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub first_event_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub last_event_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub response_time: ResponseTimeSummary,
    /// Status code -> number of records with that code.
    #[serde(default)]
    pub status_summary: BTreeMap<u16, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWatchRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<String>,
    pub interval_minutes: u32,
}

/// Partial update; only the fields that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWatchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_headers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl UpdateWatchRequest {
    /// Build an update holding only the fields where `edited` differs from `original`.
    pub fn diff(original: &Watch, edited: &Watch) -> Self {
        Self {
            name: (edited.name != original.name).then(|| edited.name.clone()),
            url: (edited.url != original.url).then(|| edited.url.clone()),
            custom_headers: (edited.custom_headers.as_deref().unwrap_or_default()
                != original.custom_headers.as_deref().unwrap_or_default())
            .then(|| edited.custom_headers.clone().unwrap_or_default()),
            interval_minutes: (edited.interval_minutes != original.interval_minutes)
                .then_some(edited.interval_minutes),
            active: (edited.active != original.active).then_some(edited.active),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Parse an RFC 3339 timestamp, or a naive one taken to be UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let s = String::deserialize(d)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s)))
}

fn deserialize_optional_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let s = Option::<String>::deserialize(d)?;
    match s.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => parse_timestamp(text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", text))),
    }
}

//! Stoplight status derivation.
//!
//! Turns watch summaries and history into a four-valued health status, and
//! reduces many watch statuses into one global status.

mod classify;
mod codes;
mod global;
mod view;

pub use classify::*;
pub use codes::*;
pub use global::*;
pub use view::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Traffic-light health of a watch or of the whole system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoplightStatus {
    Green,
    Yellow,
    Red,
    /// No data.
    Grey,
}

impl StoplightStatus {
    pub const ALL: [StoplightStatus; 4] = [
        StoplightStatus::Green,
        StoplightStatus::Yellow,
        StoplightStatus::Red,
        StoplightStatus::Grey,
    ];

    /// Rank used for global reduction: red > yellow > green > grey.
    pub fn severity(self) -> u8 {
        match self {
            StoplightStatus::Grey => 0,
            StoplightStatus::Green => 1,
            StoplightStatus::Yellow => 2,
            StoplightStatus::Red => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoplightStatus::Green => "green",
            StoplightStatus::Yellow => "yellow",
            StoplightStatus::Red => "red",
            StoplightStatus::Grey => "grey",
        }
    }

    /// Human label shown next to the global stoplight.
    pub fn label(self) -> &'static str {
        match self {
            StoplightStatus::Green => "Healthy",
            StoplightStatus::Yellow => "Degraded",
            StoplightStatus::Red => "Failing",
            StoplightStatus::Grey => "No Data",
        }
    }
}

// Ordered by severity, so `max()` picks the worst status.
impl Ord for StoplightStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.severity().cmp(&other.severity())
    }
}

impl PartialOrd for StoplightStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for StoplightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one watch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchStatusResult {
    pub status: StoplightStatus,
    /// Latency the thresholds were compared against, absent without data.
    pub representative_latency: Option<f64>,
    pub reason: String,
}

impl WatchStatusResult {
    pub fn no_data() -> Self {
        Self {
            status: StoplightStatus::Grey,
            representative_latency: None,
            reason: "No data".to_string(),
        }
    }
}

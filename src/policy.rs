//! Stoplight policy.
//!
//! Everything that decides how raw history turns into a status colour lives
//! here as plain data. A `PolicyConfig` is built once at start-up and passed
//! by reference into every classification and aggregation call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::status::StoplightStatus;

/// Policy error types.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("percentile must be between 1 and 100, got {0}")]
    Percentile(u8),
    #[error("{name} must be a finite, non-negative number of milliseconds, got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("criticalLatencyMs ({critical}) must be greater than warningLatencyMs ({warning})")]
    InvertedThresholds { critical: f64, warning: f64 },
    #[error("invalid history filter: {0}")]
    HistoryFilter(String),
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How a set of response times is reduced to a single number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMethod {
    Max,
    Min,
    Avg,
    Percentile,
}

/// Which records a watch-level figure is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataScope {
    /// The complete history of the watch.
    #[default]
    Total,
    /// Only the records selected by the viewer's history filter.
    Filtered,
}

/// Which per-watch status feeds the global stoplight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalStatusScope {
    /// Status over the complete history, unaffected by history filters.
    #[default]
    Default,
    /// Status over the filtered records.
    Filtered,
}

/// Whether inactive watches take part in the global health summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InactiveWatchInclusion {
    Always,
    #[default]
    Never,
    /// Follow the viewer's "show inactive" toggle.
    Dynamic,
}

impl InactiveWatchInclusion {
    /// Whether a watch with the given `active` flag counts towards global health.
    pub fn includes(self, active: bool, show_inactive: bool) -> bool {
        match self {
            InactiveWatchInclusion::Always => true,
            InactiveWatchInclusion::Never => active,
            InactiveWatchInclusion::Dynamic => active || show_inactive,
        }
    }
}

/// Status codes forced to a fixed colour. Priority is red > yellow > green.
///
/// A list missing from a policy file takes its built-in value, so `yellow`
/// keeps `429` unless the file names it; write `"yellow": []` to clear it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCodeOverrides {
    pub red: BTreeSet<u16>,
    #[serde(default = "default_yellow_codes")]
    pub yellow: BTreeSet<u16>,
    pub green: BTreeSet<u16>,
}

fn default_yellow_codes() -> BTreeSet<u16> {
    BTreeSet::from([429])
}

impl StatusCodeOverrides {
    /// The colour forced for `code`, if any list names it.
    pub fn lookup(&self, code: u16) -> Option<StoplightStatus> {
        if self.red.contains(&code) {
            Some(StoplightStatus::Red)
        } else if self.yellow.contains(&code) {
            Some(StoplightStatus::Yellow)
        } else if self.green.contains(&code) {
            Some(StoplightStatus::Green)
        } else {
            None
        }
    }

    /// Codes that appear in more than one list, with every list naming them.
    pub fn overlaps(&self) -> Vec<(u16, Vec<StoplightStatus>)> {
        let all: BTreeSet<u16> = self
            .red
            .iter()
            .chain(&self.yellow)
            .chain(&self.green)
            .copied()
            .collect();

        all.into_iter()
            .filter_map(|code| {
                let lists: Vec<StoplightStatus> = [
                    (StoplightStatus::Red, &self.red),
                    (StoplightStatus::Yellow, &self.yellow),
                    (StoplightStatus::Green, &self.green),
                ]
                .into_iter()
                .filter(|(_, list)| list.contains(&code))
                .map(|(status, _)| status)
                .collect();

                (lists.len() > 1).then_some((code, lists))
            })
            .collect()
    }
}

/// The "last N records" window a viewer selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFilter {
    Last(usize),
    All,
}

/// Filter choices offered to viewers.
pub const HISTORY_FILTER_OPTIONS: [HistoryFilter; 7] = [
    HistoryFilter::Last(30),
    HistoryFilter::Last(90),
    HistoryFilter::Last(180),
    HistoryFilter::Last(400),
    HistoryFilter::Last(1000),
    HistoryFilter::Last(5000),
    HistoryFilter::All,
];

impl Default for HistoryFilter {
    fn default() -> Self {
        HistoryFilter::Last(30)
    }
}

impl fmt::Display for HistoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryFilter::Last(n) => write!(f, "{}", n),
            HistoryFilter::All => f.write_str("all"),
        }
    }
}

impl FromStr for HistoryFilter {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(HistoryFilter::All);
        }
        match s.parse::<usize>() {
            Ok(0) | Err(_) => Err(PolicyError::HistoryFilter(s.to_string())),
            Ok(n) => Ok(HistoryFilter::Last(n)),
        }
    }
}

impl Serialize for HistoryFilter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            HistoryFilter::Last(n) => serializer.serialize_u64(*n as u64),
            HistoryFilter::All => serializer.serialize_str("all"),
        }
    }
}

impl<'de> Deserialize<'de> for HistoryFilter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Count(usize),
            Text(String),
        }

        let raw = Raw::deserialize(deserializer)?;
        let text = match raw {
            Raw::Count(n) => n.to_string(),
            Raw::Text(s) => s,
        };
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Which stoplights pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrobeScope {
    #[default]
    All,
    Watches,
    Summary,
    None,
}

/// A stoplight location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrobeTarget {
    Watch,
    Summary,
}

/// Per-status strobe switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrobeStates {
    pub red: bool,
    pub yellow: bool,
    pub green: bool,
    pub grey: bool,
}

impl Default for StrobeStates {
    fn default() -> Self {
        Self {
            red: true,
            yellow: true,
            green: false,
            grey: false,
        }
    }
}

/// Stoplight animation rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StrobeSettings {
    pub scope: StrobeScope,
    pub speed_seconds: f64,
    pub states: StrobeStates,
}

impl Default for StrobeSettings {
    fn default() -> Self {
        Self {
            scope: StrobeScope::All,
            speed_seconds: 0.5,
            states: StrobeStates::default(),
        }
    }
}

impl StrobeSettings {
    /// Whether a stoplight at `target` showing `status` should pulse.
    pub fn strobes(&self, status: StoplightStatus, target: StrobeTarget) -> bool {
        let in_scope = match (self.scope, target) {
            (StrobeScope::All, _) => true,
            (StrobeScope::Watches, StrobeTarget::Watch) => true,
            (StrobeScope::Summary, StrobeTarget::Summary) => true,
            _ => false,
        };
        if !in_scope {
            return false;
        }

        match status {
            StoplightStatus::Red => self.states.red,
            StoplightStatus::Yellow => self.states.yellow,
            StoplightStatus::Green => self.states.green,
            StoplightStatus::Grey => self.states.grey,
        }
    }
}

/// The complete stoplight policy.
///
/// Loaded from a camelCase JSON document; any missing key takes the value
/// from [`PolicyConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Percentile used for latency figures (95 = P95).
    pub percentile: u8,
    /// Representative latency at or above this turns a watch red.
    pub critical_latency_ms: f64,
    /// Representative latency at or above this turns a watch yellow.
    pub warning_latency_ms: f64,
    pub graph_aggregation_method: AggregationMethod,
    pub status_code_overrides: StatusCodeOverrides,
    pub watch_status_scope: DataScope,
    pub summary_metrics_scope: DataScope,
    pub global_status_scope: GlobalStatusScope,
    pub inactive_watch_inclusion: InactiveWatchInclusion,
    pub default_history_filter: HistoryFilter,
    pub strobe: StrobeSettings,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            percentile: 95,
            critical_latency_ms: 3000.0,
            warning_latency_ms: 1000.0,
            graph_aggregation_method: AggregationMethod::Percentile,
            status_code_overrides: StatusCodeOverrides {
                yellow: default_yellow_codes(),
                ..Default::default()
            },
            watch_status_scope: DataScope::Total,
            summary_metrics_scope: DataScope::Total,
            global_status_scope: GlobalStatusScope::Default,
            inactive_watch_inclusion: InactiveWatchInclusion::Never,
            default_history_filter: HistoryFilter::Last(30),
            strobe: StrobeSettings::default(),
        }
    }
}

impl PolicyConfig {
    /// Load a policy from a JSON file and validate it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let text = std::fs::read_to_string(path)?;
        let policy: PolicyConfig = serde_json::from_str(&text)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Check the policy for values classification cannot make sense of.
    ///
    /// Overlapping override lists are not rejected; see [`Self::warn_overlaps`].
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(1..=100).contains(&self.percentile) {
            return Err(PolicyError::Percentile(self.percentile));
        }

        for (name, value) in [
            ("criticalLatencyMs", self.critical_latency_ms),
            ("warningLatencyMs", self.warning_latency_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PolicyError::Threshold { name, value });
            }
        }

        if self.critical_latency_ms <= self.warning_latency_ms {
            return Err(PolicyError::InvertedThresholds {
                critical: self.critical_latency_ms,
                warning: self.warning_latency_ms,
            });
        }

        if self.default_history_filter == HistoryFilter::Last(0) {
            return Err(PolicyError::HistoryFilter("0".to_string()));
        }

        Ok(())
    }

    /// Log one warning per status code listed under more than one colour.
    pub fn warn_overlaps(&self) {
        for (code, lists) in self.status_code_overrides.overlaps() {
            let names: Vec<&str> = lists.iter().map(|s| s.as_str()).collect();
            tracing::warn!(
                "Status code {} is listed under several overrides ({}); using {}",
                code,
                names.join(", "),
                names[0]
            );
        }
    }

    /// Label naming the aggregate used for latency, e.g. "P95" or "Max".
    pub fn latency_label(&self) -> String {
        match self.graph_aggregation_method {
            AggregationMethod::Percentile => format!("P{}", self.percentile),
            AggregationMethod::Max => "Max".to_string(),
            AggregationMethod::Min => "Min".to_string(),
            AggregationMethod::Avg => "Avg".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_policy_is_valid() {
        let policy = PolicyConfig::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.percentile, 95);
        assert_eq!(policy.latency_label(), "P95");
        assert!(policy.status_code_overrides.yellow.contains(&429));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let policy = PolicyConfig { percentile: 0, ..Default::default() };
        assert!(matches!(policy.validate(), Err(PolicyError::Percentile(0))));

        let policy = PolicyConfig { percentile: 101, ..Default::default() };
        assert!(policy.validate().is_err());

        let policy = PolicyConfig {
            critical_latency_ms: 500.0,
            warning_latency_ms: 500.0,
            ..Default::default()
        };
        assert!(matches!(
            policy.validate(),
            Err(PolicyError::InvertedThresholds { .. })
        ));

        let policy = PolicyConfig {
            warning_latency_ms: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(policy.validate(), Err(PolicyError::Threshold { .. })));
    }

    #[test]
    fn test_overlaps() {
        let overrides = StatusCodeOverrides {
            red: BTreeSet::from([503, 429]),
            yellow: BTreeSet::from([429]),
            green: BTreeSet::from([204, 503]),
        };
        let overlaps = overrides.overlaps();
        assert_eq!(
            overlaps,
            vec![
                (429, vec![StoplightStatus::Red, StoplightStatus::Yellow]),
                (503, vec![StoplightStatus::Red, StoplightStatus::Green]),
            ]
        );
        assert_eq!(overrides.lookup(429), Some(StoplightStatus::Red));
        assert_eq!(overrides.lookup(204), Some(StoplightStatus::Green));
        assert_eq!(overrides.lookup(200), None);
    }

    #[test]
    fn test_history_filter_parse() {
        assert_eq!("all".parse::<HistoryFilter>().unwrap(), HistoryFilter::All);
        assert_eq!("ALL".parse::<HistoryFilter>().unwrap(), HistoryFilter::All);
        assert_eq!("90".parse::<HistoryFilter>().unwrap(), HistoryFilter::Last(90));
        assert!("0".parse::<HistoryFilter>().is_err());
        assert!("ninety".parse::<HistoryFilter>().is_err());

        let filter: HistoryFilter = serde_json::from_str("180").unwrap();
        assert_eq!(filter, HistoryFilter::Last(180));
        let filter: HistoryFilter = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(filter, HistoryFilter::All);
        assert_eq!(serde_json::to_string(&HistoryFilter::Last(30)).unwrap(), "30");
        assert_eq!(serde_json::to_string(&HistoryFilter::All).unwrap(), "\"all\"");
    }

    #[test]
    fn test_inactive_inclusion() {
        use InactiveWatchInclusion::*;
        assert!(Always.includes(false, false));
        assert!(!Never.includes(false, true));
        assert!(Never.includes(true, false));
        assert!(!Dynamic.includes(false, false));
        assert!(Dynamic.includes(false, true));
    }

    #[test]
    fn test_strobes() {
        let strobe = StrobeSettings::default();
        assert!(strobe.strobes(StoplightStatus::Red, StrobeTarget::Watch));
        assert!(strobe.strobes(StoplightStatus::Yellow, StrobeTarget::Summary));
        assert!(!strobe.strobes(StoplightStatus::Green, StrobeTarget::Watch));

        let strobe = StrobeSettings { scope: StrobeScope::Watches, ..Default::default() };
        assert!(strobe.strobes(StoplightStatus::Red, StrobeTarget::Watch));
        assert!(!strobe.strobes(StoplightStatus::Red, StrobeTarget::Summary));

        let strobe = StrobeSettings { scope: StrobeScope::None, ..Default::default() };
        assert!(!strobe.strobes(StoplightStatus::Red, StrobeTarget::Watch));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "percentile": 90,
                "graphAggregationMethod": "max",
                "statusCodeOverrides": {{ "red": [503] }},
                "summaryMetricsScope": "filtered",
                "defaultHistoryFilter": "all"
            }}"#
        )
        .unwrap();

        let policy = PolicyConfig::from_file(file.path()).unwrap();
        assert_eq!(policy.percentile, 90);
        assert_eq!(policy.graph_aggregation_method, AggregationMethod::Max);
        assert_eq!(policy.latency_label(), "Max");
        assert!(policy.status_code_overrides.red.contains(&503));
        assert_eq!(policy.status_code_overrides.yellow, BTreeSet::from([429]));
        assert_eq!(policy.summary_metrics_scope, DataScope::Filtered);
        assert_eq!(policy.watch_status_scope, DataScope::Total);
        assert_eq!(policy.default_history_filter, HistoryFilter::All);
        assert_eq!(policy.critical_latency_ms, 3000.0);
    }

    #[test]
    fn test_override_lists_can_be_cleared() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "statusCodeOverrides": {{ "yellow": [], "green": [301] }} }}"#).unwrap();

        let policy = PolicyConfig::from_file(file.path()).unwrap();
        assert!(policy.status_code_overrides.yellow.is_empty());
        assert!(policy.status_code_overrides.red.is_empty());
        assert_eq!(policy.status_code_overrides.lookup(301), Some(StoplightStatus::Green));
        assert_eq!(policy.status_code_overrides.lookup(429), None);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "criticalLatencyMs": 100, "warningLatencyMs": 200 }}"#).unwrap();
        assert!(PolicyConfig::from_file(file.path()).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            PolicyConfig::from_file(file.path()),
            Err(PolicyError::Parse(_))
        ));
    }
}

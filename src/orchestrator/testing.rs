//! In-memory [`WatchApi`] for tests.

use crate::api::{AddWatchRequest, ApiError, HistoryRecord, HistorySummary, UpdateWatchRequest, Watch, WatchApi};
use crate::stats::summarize;

use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

/// In-memory stand-in for the BOCH API.
pub(crate) struct FakeApi {
    pub watches: StdMutex<Result<Vec<Watch>, ApiError>>,
    pub history: StdMutex<HashMap<String, Result<Vec<HistoryRecord>, ApiError>>>,
    pub delays: StdMutex<HashMap<String, Duration>>,
    pub updates: StdMutex<Vec<(String, UpdateWatchRequest)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            watches: StdMutex::new(Ok(Vec::new())),
            history: StdMutex::new(HashMap::new()),
            delays: StdMutex::new(HashMap::new()),
            updates: StdMutex::new(Vec::new()),
        }
    }

    pub fn set_watches(&self, names: &[&str]) {
        let watches = names
            .iter()
            .map(|n| Watch {
                name: n.to_string(),
                url: String::new(),
                custom_headers: None,
                interval_minutes: 5,
                active: true,
            })
            .collect();
        *self.watches.lock().unwrap() = Ok(watches);
    }

    pub fn set_active(&self, name: &str, active: bool) {
        if let Ok(watches) = self.watches.lock().unwrap().as_mut() {
            for w in watches.iter_mut().filter(|w| w.name == name) {
                w.active = active;
            }
        }
    }

    pub fn set_history(&self, name: &str, status_code: u16, response_time_ms: f64) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let records = (0..10)
            .map(|i| HistoryRecord {
                date_time: start + chrono::Duration::minutes(i),
                status_code,
                response_time_ms,
            })
            .collect();
        self.history.lock().unwrap().insert(name.to_string(), Ok(records));
    }

    pub fn set_history_error(&self, name: &str, error: ApiError) {
        self.history.lock().unwrap().insert(name.to_string(), Err(error));
    }

    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(name.to_string(), delay);
    }

    fn lookup(&self, name: &str) -> (Result<Vec<HistoryRecord>, ApiError>, Duration) {
        let history = self
            .history
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| Err(ApiError::Status { status: 404, message: "no such watch".to_string() }));
        let delay = self.delays.lock().unwrap().get(name).copied().unwrap_or_default();
        (history, delay)
    }
}

impl WatchApi for FakeApi {
    async fn list_watches(&self) -> Result<Vec<Watch>, ApiError> {
        self.watches.lock().unwrap().clone()
    }

    async fn get_history(&self, watch_name: &str) -> Result<Vec<HistoryRecord>, ApiError> {
        // Data is captured before the delay so a slow call returns old data.
        let (history, delay) = self.lookup(watch_name);
        tokio::time::sleep(delay).await;
        history
    }

    async fn get_history_summary(&self, watch_name: &str) -> Result<HistorySummary, ApiError> {
        let (history, delay) = self.lookup(watch_name);
        tokio::time::sleep(delay).await;
        history.map(|records| summarize(watch_name, &records))
    }

    async fn create_watch(&self, request: &AddWatchRequest) -> Result<(), ApiError> {
        let mut watches = self.watches.lock().unwrap();
        let watches = watches.as_mut().map_err(|e| e.clone())?;
        if watches.iter().any(|w| w.name == request.name) {
            return Err(ApiError::Status {
                status: 409,
                message: "watch already exists".to_string(),
            });
        }
        watches.push(Watch {
            name: request.name.clone(),
            url: request.full_url.clone().unwrap_or_default(),
            custom_headers: request.custom_headers.clone(),
            interval_minutes: request.interval_minutes,
            active: true,
        });
        Ok(())
    }

    async fn update_watch(&self, watch_name: &str, request: &UpdateWatchRequest) -> Result<(), ApiError> {
        self.updates
            .lock()
            .unwrap()
            .push((watch_name.to_string(), request.clone()));
        Ok(())
    }

    async fn delete_watch(&self, watch_name: &str) -> Result<(), ApiError> {
        if let Ok(watches) = self.watches.lock().unwrap().as_mut() {
            watches.retain(|w| w.name != watch_name);
        }
        Ok(())
    }
}

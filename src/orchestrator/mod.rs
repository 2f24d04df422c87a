//! Orchestrator module for fetching and caching watch data.

mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use state::*;

use crate::api::{AddWatchRequest, ApiError, UpdateWatchRequest, Watch, WatchApi};
use crate::policy::PolicyConfig;

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinSet;

/// Keeps the session cache of watch data fresh.
///
/// Every refresh lists the watches, then fetches each watch's history and
/// summary in its own task. Results land in the cache as they arrive unless a
/// newer refresh has started in the meantime.
pub struct Orchestrator<A: WatchApi> {
    api: Arc<A>,
    policy: Arc<PolicyConfig>,
    state: Arc<RwLock<DashboardState>>,
    generation: Arc<AtomicU64>,
    fetch_jitter: Duration,
    stop: Arc<Mutex<Option<broadcast::Sender<()>>>>,
}

impl<A: WatchApi> Orchestrator<A> {
    pub fn new(api: Arc<A>, policy: Arc<PolicyConfig>) -> Self {
        Self {
            api,
            policy,
            state: Arc::new(RwLock::new(DashboardState::default())),
            generation: Arc::new(AtomicU64::new(0)),
            fetch_jitter: Duration::from_millis(100),
            stop: Arc::new(Mutex::new(None)),
        }
    }

    /// Upper bound of the random delay before each per-watch fetch.
    pub fn with_fetch_jitter(mut self, jitter: Duration) -> Self {
        self.fetch_jitter = jitter;
        self
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// A copy of the current cache.
    pub async fn snapshot(&self) -> DashboardState {
        self.state.read().await.clone()
    }

    /// Refresh every watch. Returns the number of watches listed.
    ///
    /// Per-watch failures are stored as [`FetchFailure`] values and never
    /// fail the refresh; only a failed listing does. The refresh runs in its
    /// own task: dropping the returned future does not stop it, so the cache
    /// never stays half loaded.
    pub async fn refresh(&self) -> Result<usize, ApiError> {
        let job = RefreshJob {
            api: self.api.clone(),
            state: self.state.clone(),
            latest: self.generation.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
            fetch_jitter: self.fetch_jitter,
        };

        tokio::spawn(job.run())
            .await
            .map_err(|e| ApiError::Task(e.to_string()))?
    }

    /// Create a watch on the remote service, then refresh.
    pub async fn create_watch(&self, request: &AddWatchRequest) -> Result<(), ApiError> {
        self.api.create_watch(request).await?;
        tracing::info!("Orchestrator: Created watch {}", request.name);
        self.refresh_after_change().await;
        Ok(())
    }

    /// Update a watch on the remote service, then refresh.
    pub async fn update_watch(&self, name: &str, request: &UpdateWatchRequest) -> Result<(), ApiError> {
        self.api.update_watch(name, request).await?;
        tracing::info!("Orchestrator: Updated watch {}", name);
        self.refresh_after_change().await;
        Ok(())
    }

    /// Flip a watch between active and inactive.
    pub async fn toggle_watch(&self, watch: &Watch) -> Result<(), ApiError> {
        let request = UpdateWatchRequest {
            active: Some(!watch.active),
            ..Default::default()
        };
        self.update_watch(&watch.name, &request).await
    }

    /// Delete a watch on the remote service, then refresh.
    pub async fn delete_watch(&self, name: &str) -> Result<(), ApiError> {
        self.api.delete_watch(name).await?;
        tracing::info!("Orchestrator: Deleted watch {}", name);
        self.refresh_after_change().await;
        Ok(())
    }

    // The mutation already succeeded; a failed refresh shows up in the state.
    async fn refresh_after_change(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!("Orchestrator: Refresh after change failed: {}", e);
        }
    }

    /// Stop the periodic refresh loop.
    pub async fn stop(&self) {
        let stop = self.stop.lock().await;
        if let Some(tx) = stop.as_ref() {
            let _ = tx.send(());
        }
    }
}

impl<A: WatchApi> Orchestrator<A> {
    /// Start refreshing every `interval` in the background, beginning immediately.
    pub async fn start(self: &Arc<Self>, interval: Duration) {
        let (tx, _) = broadcast::channel(1);
        let mut rx = tx.subscribe();
        *self.stop.lock().await = Some(tx);

        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = rx.recv() => {
                        tracing::info!("Orchestrator: Refresh loop stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Errors are already logged and recorded in the state.
                        let _ = this.refresh().await;
                    }
                }
            }
        });
    }
}

/// One refresh generation, owning everything it touches.
struct RefreshJob<A: WatchApi> {
    api: Arc<A>,
    state: Arc<RwLock<DashboardState>>,
    latest: Arc<AtomicU64>,
    generation: u64,
    fetch_jitter: Duration,
}

impl<A: WatchApi> RefreshJob<A> {
    fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    async fn run(self) -> Result<usize, ApiError> {
        let generation = self.generation;

        let watches = match self.api.list_watches().await {
            Ok(w) => w,
            Err(e) => {
                tracing::error!("Orchestrator: Failed to list watches: {}", e);
                if self.is_current() {
                    let mut state = self.state.write().await;
                    state.connected = false;
                    state.last_error = Some(e.to_string());
                }
                return Err(e);
            }
        };
        let count = watches.len();

        {
            let mut state = self.state.write().await;
            if !self.is_current() {
                tracing::debug!("Orchestrator: Refresh {} superseded before fetch", generation);
                return Ok(count);
            }
            state.connected = true;
            state.last_error = None;
            state.generation = generation;
            state.watches = watches.iter().cloned().map(WatchEntry::loading).collect();
        }

        let mut tasks = JoinSet::new();
        for watch in watches {
            let api = self.api.clone();
            let jitter = self.fetch_jitter;
            tasks.spawn(async move {
                if !jitter.is_zero() {
                    let delay = rand::random::<u64>() % jitter.as_millis().max(1) as u64;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                let data = fetch_watch_data(api.as_ref(), &watch.name).await;
                (watch, data)
            });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            let (watch, data) = match joined {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("Orchestrator: Fetch task failed: {}", e);
                    failed += 1;
                    continue;
                }
            };

            if let Err(f) = &data {
                tracing::warn!("Orchestrator: {}", f);
                failed += 1;
            }

            let mut state = self.state.write().await;
            if !self.is_current() {
                tracing::debug!(
                    "Orchestrator: Dropping stale result for {} from refresh {}",
                    watch.name,
                    generation
                );
                continue;
            }
            let entry = WatchEntry::resolved(watch, data);
            if let Some(slot) = state.watches.iter_mut().find(|e| e.watch.name == entry.watch.name) {
                *slot = entry;
            }
        }

        if self.is_current() {
            self.state.write().await.refreshed_at = Some(Utc::now());
            tracing::info!(
                "Orchestrator: Refreshed {} watches ({} failed)",
                count,
                failed
            );
        }

        Ok(count)
    }
}

/// Fetch one watch's summary and history concurrently.
pub async fn fetch_watch_data<A: WatchApi>(api: &A, name: &str) -> Result<WatchPayload, FetchFailure> {
    let (summary, history) = tokio::join!(api.get_history_summary(name), api.get_history(name));

    let failure = |error: ApiError| FetchFailure {
        watch: name.to_string(),
        error,
    };
    Ok(WatchPayload {
        summary: summary.map_err(failure)?,
        history: history.map_err(failure)?,
    })
}

#[cfg(test)]
mod tests {
    use super::testing::FakeApi;
    use super::*;
    use crate::policy::HistoryFilter;
    use crate::status::StoplightStatus;
    use tokio_test::{assert_err, assert_ok};

    fn orchestrator(api: Arc<FakeApi>) -> Arc<Orchestrator<FakeApi>> {
        Arc::new(
            Orchestrator::new(api, Arc::new(PolicyConfig::default())).with_fetch_jitter(Duration::ZERO),
        )
    }

    fn view(state: &DashboardState, name: &str) -> WatchView {
        state
            .watch_views(HistoryFilter::All, &PolicyConfig::default())
            .into_iter()
            .find(|v| v.name == name)
            .unwrap()
    }

    #[tokio::test]
    async fn test_refresh_classifies_watches() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["fast", "slow"]);
        api.set_history("fast", 200, 50.0);
        api.set_history("slow", 200, 5000.0);

        let orch = orchestrator(api);
        assert_eq!(assert_ok!(orch.refresh().await), 2);

        let state = orch.snapshot().await;
        assert!(state.connected);
        assert!(state.refreshed_at.is_some());
        assert_eq!(view(&state, "fast").status, StoplightStatus::Green);
        assert_eq!(view(&state, "slow").status, StoplightStatus::Red);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_others() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["ok", "broken"]);
        api.set_history("ok", 200, 50.0);
        api.set_history_error("broken", ApiError::Network("connection reset".to_string()));

        let orch = orchestrator(api);
        assert_ok!(orch.refresh().await);

        let state = orch.snapshot().await;
        assert_eq!(view(&state, "ok").status, StoplightStatus::Green);
        assert_eq!(view(&state, "broken").status, StoplightStatus::Grey);

        let broken = state.find("broken").unwrap();
        assert!(broken.payload().is_none());
        assert_eq!(broken.failure().unwrap().watch, "broken");
    }

    #[tokio::test]
    async fn test_list_failure_disconnects() {
        let api = Arc::new(FakeApi::new());
        *api.watches.lock().unwrap() = Err(ApiError::Status {
            status: 403,
            message: "invalid key".to_string(),
        });

        let orch = orchestrator(api);
        assert_err!(orch.refresh().await);

        let state = orch.snapshot().await;
        assert!(!state.connected);
        assert_eq!(state.last_error.as_deref(), Some("API returned 403: invalid key"));
    }

    #[tokio::test]
    async fn test_stale_refresh_is_discarded() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["api"]);
        api.set_history("api", 503, 50.0);
        api.set_delay("api", Duration::from_millis(300));

        let orch = orchestrator(api.clone());
        let first = tokio::spawn({
            let orch = orch.clone();
            async move { orch.refresh().await }
        });

        // Let the first refresh start its slow fetch, then recover the watch.
        tokio::time::sleep(Duration::from_millis(100)).await;
        api.set_history("api", 200, 50.0);
        api.set_delay("api", Duration::ZERO);

        assert_ok!(orch.refresh().await);
        assert_eq!(view(&orch.snapshot().await, "api").status, StoplightStatus::Green);

        assert_ok!(first.await.unwrap());
        let state = orch.snapshot().await;
        assert_eq!(state.generation, 2);
        assert_eq!(view(&state, "api").status, StoplightStatus::Green);
    }

    #[tokio::test]
    async fn test_cancelled_caller_does_not_leave_entries_loading() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["api"]);
        api.set_history("api", 200, 50.0);

        let orch = orchestrator(api.clone());
        assert_ok!(orch.refresh().await);

        // The caller gives up while the fetch is still in flight.
        api.set_delay("api", Duration::from_millis(300));
        assert_err!(tokio::time::timeout(Duration::from_millis(50), orch.refresh()).await);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let state = orch.snapshot().await;
        let api_view = view(&state, "api");
        assert!(!api_view.loading);
        assert_eq!(api_view.status, StoplightStatus::Green);
        assert_eq!(state.generation, 2);
    }

    #[tokio::test]
    async fn test_toggle_sends_flipped_flag() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["api"]);
        api.set_history("api", 200, 50.0);

        let orch = orchestrator(api.clone());
        let watch = Watch {
            name: "api".to_string(),
            url: String::new(),
            custom_headers: None,
            interval_minutes: 5,
            active: true,
        };
        assert_ok!(orch.toggle_watch(&watch).await);

        let updates = api.updates.lock().unwrap().clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, "api");
        assert_eq!(updates[0].1.active, Some(false));
        // The toggle also refreshed the cache.
        assert!(orch.snapshot().await.find("api").is_some());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let api = Arc::new(FakeApi::new());
        api.set_watches(&["api"]);
        api.set_history("api", 200, 50.0);

        let orch = orchestrator(api);
        orch.start(Duration::from_secs(3600)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(orch.snapshot().await.refreshed_at.is_some());
        orch.stop().await;
    }
}

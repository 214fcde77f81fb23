//! Backend availability prober
//!
//! Confirms the backend is actually reachable and feeds the result into the
//! [`HealthMonitor`]. Non-forced checks inside the re-check window reuse the
//! previous answer.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Error, Result};
use crate::models::BackendStatus;
use crate::util::{compact_text, is_http_url};

use super::HealthMonitor;

/// Default minimum time between two non-forced checks
pub const DEFAULT_MIN_RECHECK: Duration = Duration::from_secs(5);

/// One reachability check against the backend
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    /// `Ok` when the backend answered.
    async fn check(&self) -> Result<()>;
}

/// `GET` against a health endpoint; any success status means reachable.
#[derive(Clone)]
pub struct HttpReachabilityCheck {
    url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpReachabilityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReachabilityCheck")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HttpReachabilityCheck {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into().trim().to_string();
        if !is_http_url(&url) {
            return Err(Error::InvalidInput(format!(
                "probe URL must include http:// or https://: {url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| Error::Probe(format!("failed to build probe HTTP client: {error}")))?;

        Ok(Self { url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityCheck for HttpReachabilityCheck {
    async fn check(&self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|error| Error::Probe(format!("request to {} failed: {error}", self.url)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Probe(format!(
            "{} returned HTTP {}: {}",
            self.url,
            status.as_u16(),
            compact_text(&body)
        )))
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    last_checked: Option<Instant>,
    last_result: bool,
}

pub struct AvailabilityProber {
    monitor: HealthMonitor,
    check: Arc<dyn ReachabilityCheck>,
    min_recheck: Duration,
    state: AsyncMutex<ProbeState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AvailabilityProber {
    pub fn new(monitor: HealthMonitor, check: Arc<dyn ReachabilityCheck>) -> Self {
        Self::with_min_recheck(monitor, check, DEFAULT_MIN_RECHECK)
    }

    pub fn with_min_recheck(
        monitor: HealthMonitor,
        check: Arc<dyn ReachabilityCheck>,
        min_recheck: Duration,
    ) -> Self {
        Self {
            monitor,
            check,
            min_recheck,
            state: AsyncMutex::new(ProbeState::default()),
            task: Mutex::new(None),
        }
    }

    /// Check whether the backend is reachable and report it to the monitor.
    ///
    /// Without `force`, a result younger than the re-check window is returned
    /// without probing again.
    pub async fn check_availability(&self, force: bool) -> bool {
        let mut state = self.state.lock().await;

        if !force {
            if let Some(checked_at) = state.last_checked {
                if checked_at.elapsed() < self.min_recheck {
                    return state.last_result;
                }
            }
        }

        let reachable = match self.check.check().await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("Backend unreachable: {}", error);
                false
            }
        };

        state.last_checked = Some(Instant::now());
        state.last_result = reachable;
        self.monitor.set_backend_status(BackendStatus::from(reachable));
        reachable
    }

    /// Override the backend status, e.g. when the transport itself confirms it.
    pub async fn set_status(&self, reachable: bool) {
        let mut state = self.state.lock().await;
        state.last_checked = Some(Instant::now());
        state.last_result = reachable;
        self.monitor.set_backend_status(BackendStatus::from(reachable));
    }

    /// Probe immediately and then every `interval`, replacing any running loop.
    pub fn start_periodic_checks(self: &Arc<Self>, interval: Duration) {
        let prober = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(prober) = prober.upgrade() else {
                    break;
                };
                prober.check_availability(true).await;
            }
        });

        if let Some(previous) = self.task_slot().replace(handle) {
            previous.abort();
        }
        tracing::debug!("Started periodic availability checks every {:?}", interval);
    }

    /// Stop the periodic loop, if running
    pub fn stop(&self) {
        if let Some(handle) = self.task_slot().take() {
            handle.abort();
            tracing::debug!("Stopped periodic availability checks");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task_slot()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn task_slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AvailabilityProber {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct ScriptedCheck {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ReachabilityCheck for ScriptedCheck {
        async fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Probe("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn prober(check: &Arc<ScriptedCheck>) -> (HealthMonitor, Arc<AvailabilityProber>) {
        let monitor = HealthMonitor::new();
        let prober = AvailabilityProber::with_min_recheck(
            monitor.clone(),
            check.clone(),
            Duration::from_secs(60),
        );
        (monitor, Arc::new(prober))
    }

    #[tokio::test]
    async fn success_marks_backend_online() {
        let check = Arc::new(ScriptedCheck::default());
        let (monitor, prober) = prober(&check);

        assert!(prober.check_availability(false).await);
        assert_eq!(monitor.current_health().backend_status, BackendStatus::Online);
    }

    #[tokio::test]
    async fn failure_marks_backend_offline() {
        let check = Arc::new(ScriptedCheck::default());
        check.fail.store(true, Ordering::SeqCst);
        let (monitor, prober) = prober(&check);
        monitor.set_backend_status(BackendStatus::Online);

        assert!(!prober.check_availability(true).await);
        assert_eq!(monitor.current_health().backend_status, BackendStatus::Offline);
    }

    #[tokio::test]
    async fn unforced_checks_inside_window_use_cache() {
        let check = Arc::new(ScriptedCheck::default());
        let (_, prober) = prober(&check);

        assert!(prober.check_availability(false).await);
        check.fail.store(true, Ordering::SeqCst);
        assert!(prober.check_availability(false).await);
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);

        assert!(!prober.check_availability(true).await);
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn set_status_overrides_cached_result() {
        let check = Arc::new(ScriptedCheck::default());
        let (monitor, prober) = prober(&check);

        prober.set_status(true).await;
        assert_eq!(monitor.current_health().backend_status, BackendStatus::Online);
        assert!(prober.check_availability(false).await);
        assert_eq!(check.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_checks_run_until_stopped() {
        let check = Arc::new(ScriptedCheck::default());
        let (_, prober) = prober(&check);

        prober.start_periodic_checks(Duration::from_secs(30));
        assert!(prober.is_running());

        tokio::time::sleep(Duration::from_secs(65)).await;
        let calls = check.calls.load(Ordering::SeqCst);
        assert_eq!(calls, 3);

        prober.stop();
        assert!(!prober.is_running());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn http_check_rejects_non_http_url() {
        let error = HttpReachabilityCheck::new("ftp://example.com", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}

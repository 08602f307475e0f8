use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::domain::{MaintenanceStatus, Role};
use crate::gate::{decide, precheck, GateConfig, GateState, StatusSource};

/// One gate per browser session (or per `gate-watch` run).
///
/// The current verdict is published on a watch channel, which always holds
/// the last-known state; readers never wait on an in-flight fetch.
pub struct MaintenanceGate {
    source: Arc<dyn StatusSource>,
    public_routes: Vec<String>,
    poll_interval: Duration,
    role: Option<Role>,
    route: Mutex<String>,
    issued: AtomicU64,
    applied: Mutex<u64>,
    last_status: Mutex<Option<MaintenanceStatus>>,
    state: watch::Sender<GateState>,
    session: CancellationToken,
}

/// Running poll loop. Dropping the handle stops the loop.
pub struct PollHandle {
    task: JoinHandle<()>,
    _guard: DropGuard,
}

impl PollHandle {
    /// Stop polling and wait for the loop to exit.
    pub async fn stop(self) {
        let PollHandle { task, _guard } = self;
        drop(_guard);
        let _ = task.await;
    }
}

impl MaintenanceGate {
    pub fn new(
        config: &GateConfig,
        source: Arc<dyn StatusSource>,
        role: Option<Role>,
        route: impl Into<String>,
    ) -> Self {
        let initial = precheck(role).unwrap_or(GateState::Checking);
        let (state, _) = watch::channel(initial);

        Self {
            source,
            public_routes: config.public_routes.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            role,
            route: Mutex::new(route.into()),
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            last_status: Mutex::new(None),
            state,
            session: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.state.subscribe()
    }

    pub fn route(&self) -> String {
        lock(&self.route).clone()
    }

    /// Last status successfully fetched, for rendering the interstitial.
    pub fn last_status(&self) -> Option<MaintenanceStatus> {
        lock(&self.last_status).clone()
    }

    /// Route change: drop the verdict for the old route and check again.
    /// A viewer the last status already lets through stays `Open`.
    pub async fn navigate(&self, route: impl Into<String>) -> GateState {
        *lock(&self.route) = route.into();
        if precheck(self.role).is_some() || self.known_bypass() {
            self.state.send_replace(GateState::Open);
        } else {
            self.state.send_replace(GateState::Checking);
        }
        self.check().await
    }

    fn known_bypass(&self) -> bool {
        let Some(role) = self.role else {
            return false;
        };
        lock(&self.last_status)
            .as_ref()
            .is_some_and(|status| status.can_bypass || status.allows(role))
    }

    /// Run one status check and publish its verdict unless a newer check
    /// has already published.
    pub async fn check(&self) -> GateState {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(state) = precheck(self.role) {
            return self.publish(generation, state, None);
        }

        let outcome = self.source.fetch_status().await;
        let status = match outcome {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!(error = %e, "Maintenance status unavailable, failing open");
                None
            }
        };

        let route = self.route();
        let verdict = decide(status.as_ref(), &route, self.role, &self.public_routes);
        self.publish(generation, verdict, status)
    }

    fn publish(
        &self,
        generation: u64,
        verdict: GateState,
        status: Option<MaintenanceStatus>,
    ) -> GateState {
        let mut applied = lock(&self.applied);
        if generation < *applied {
            tracing::debug!(generation, latest = *applied, "Discarding stale maintenance check");
            return self.state();
        }
        *applied = generation;

        if let Some(status) = status {
            *lock(&self.last_status) = Some(status);
        }

        let previous = self.state.send_replace(verdict);
        if previous != verdict {
            tracing::info!(from = ?previous, to = ?verdict, route = %self.route(), "Maintenance gate changed");
        }
        verdict
    }

    /// Start the interval loop. The first check runs immediately; later
    /// ticks follow every `poll_interval`. A slow request delays the next
    /// tick rather than stacking requests.
    pub fn spawn(self: &Arc<Self>) -> PollHandle {
        let token = self.session.child_token();
        let gate = Arc::clone(self);
        let stop = token.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(gate.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = gate.check() => {}
                }
            }
            tracing::debug!("Maintenance polling stopped");
        });

        PollHandle {
            task,
            _guard: token.drop_guard(),
        }
    }

    /// The viewer logged out: stop every poll loop started from this gate.
    pub fn logout(&self) {
        self.session.cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MaintenanceType;
    use crate::gate::GateError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn status(on: bool) -> MaintenanceStatus {
        MaintenanceStatus {
            is_maintenance_mode: on,
            maintenance_type: MaintenanceType::Emergency,
            maintenance_message: "Database upgrade".to_string(),
            reason: None,
            estimated_completion: None,
            allowed_bypass_roles: vec![Role::Admin],
            can_bypass: false,
        }
    }

    /// Replays a fixed script; the last entry repeats forever.
    struct Scripted {
        script: Mutex<VecDeque<Result<MaintenanceStatus, String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(script: Vec<Result<MaintenanceStatus, String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StatusSource for Scripted {
        async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            next.unwrap_or(Ok(status(false))).map_err(GateError::Network)
        }
    }

    /// Never answers.
    struct Hung;

    #[async_trait]
    impl StatusSource for Hung {
        async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError> {
            std::future::pending().await
        }
    }

    fn gate(source: Arc<dyn StatusSource>, role: Option<Role>, route: &str) -> Arc<MaintenanceGate> {
        Arc::new(MaintenanceGate::new(&GateConfig::default(), source, role, route))
    }

    #[tokio::test]
    async fn test_fetch_error_fails_open() {
        let g = gate(Scripted::new(vec![Err("connection refused".into())]), Some(Role::Student), "/grades");
        assert_eq!(g.state(), GateState::Checking);
        assert_eq!(g.check().await, GateState::Open);
        assert!(g.last_status().is_none());
    }

    #[tokio::test]
    async fn test_blocked_then_recovers_on_next_poll() {
        let source = Scripted::new(vec![Ok(status(true)), Ok(status(false))]);
        let g = gate(source.clone(), Some(Role::Teacher), "/grades");

        assert_eq!(g.check().await, GateState::Blocked);
        assert_eq!(g.check().await, GateState::Open);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_superadmin_open_without_network() {
        let g = gate(Arc::new(Hung), Some(Role::Superadmin), "/grades");
        assert_eq!(g.state(), GateState::Open);
        assert_eq!(g.check().await, GateState::Open);
        assert_eq!(g.navigate("/settings").await, GateState::Open);
    }

    #[tokio::test]
    async fn test_bypass_role_is_open_during_maintenance() {
        let g = gate(Scripted::new(vec![Ok(status(true))]), Some(Role::Admin), "/grades");
        assert_eq!(g.check().await, GateState::Open);
    }

    /// Answers once, then never again.
    struct AnswerThenHang {
        status: MaintenanceStatus,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for AnswerThenHang {
        async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(self.status.clone());
            }
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_bypass_role_stays_open_across_navigation() {
        let source = Arc::new(AnswerThenHang {
            status: status(true),
            calls: AtomicUsize::new(0),
        });
        let g = gate(source.clone(), Some(Role::Admin), "/grades");
        assert_eq!(g.check().await, GateState::Open);

        let pending = {
            let g = Arc::clone(&g);
            tokio::spawn(async move { g.navigate("/reports").await })
        };
        while source.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(g.state(), GateState::Open);
        assert_eq!(g.route(), "/reports");
        pending.abort();
    }

    #[tokio::test]
    async fn test_navigation_without_bypass_waits_for_check() {
        let source = Arc::new(AnswerThenHang {
            status: status(true),
            calls: AtomicUsize::new(0),
        });
        let g = gate(source.clone(), Some(Role::Teacher), "/login");
        assert_eq!(g.check().await, GateState::Open);

        let pending = {
            let g = Arc::clone(&g);
            tokio::spawn(async move { g.navigate("/grades").await })
        };
        while source.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(g.state(), GateState::Checking);
        pending.abort();
    }

    #[tokio::test]
    async fn test_navigation_to_public_route_opens() {
        let g = gate(Scripted::new(vec![Ok(status(true))]), None, "/grades");
        assert_eq!(g.check().await, GateState::Blocked);
        assert_eq!(g.navigate("/login").await, GateState::Open);
        assert_eq!(g.navigate("/grades").await, GateState::Blocked);
    }

    /// First call waits until released, later calls answer immediately.
    struct Gated {
        release: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl StatusSource for Gated {
        async fn fetch_status(&self) -> Result<MaintenanceStatus, GateError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                self.release.notified().await;
                return Ok(status(true));
            }
            Ok(status(false))
        }
    }

    #[tokio::test]
    async fn test_stale_check_does_not_overwrite_newer_verdict() {
        let source = Arc::new(Gated {
            release: Notify::new(),
            calls: AtomicUsize::new(0),
        });
        let g = gate(source.clone(), Some(Role::Student), "/grades");

        let slow = {
            let g = Arc::clone(&g);
            tokio::spawn(async move { g.check().await })
        };
        while source.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(g.check().await, GateState::Open);
        source.release.notify_one();
        slow.await.unwrap();

        assert_eq!(g.state(), GateState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_loop_recovers_without_reload() {
        let source = Scripted::new(vec![Ok(status(true)), Ok(status(false))]);
        let g = gate(source.clone(), Some(Role::Parent), "/grades");
        let mut rx = g.subscribe();
        let handle = g.spawn();

        rx.wait_for(|s| *s == GateState::Blocked).await.unwrap();
        rx.wait_for(|s| *s == GateState::Open).await.unwrap();

        handle.stop().await;
        assert!(source.calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_stops_polling() {
        let source = Scripted::new(vec![Ok(status(false))]);
        let g = gate(source.clone(), Some(Role::Student), "/grades");
        let handle = g.spawn();

        tokio::time::sleep(Duration::from_secs(65)).await;
        g.logout();
        tokio::task::yield_now().await;
        let calls = source.calls.load(Ordering::SeqCst);
        assert!(calls >= 2);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let source = Scripted::new(vec![Ok(status(false))]);
        let g = gate(source.clone(), None, "/grades");
        drop(g.spawn());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(source.calls.load(Ordering::SeqCst) <= 1);
    }
}

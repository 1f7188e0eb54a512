use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::permission::PermissionGate;

use super::{
    error::TrackingError,
    lifecycle::LifecycleEvent,
    loop_worker::tracking_loop,
    sampler::Sampler,
    state::{TrackingPhase, TrackingSession},
    status::{StatusBroadcaster, StatusObserver},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub default_interval: Duration,
    pub auto_start_on_login: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(crate::settings::DEFAULT_INTERVAL_MS),
            auto_start_on_login: true,
        }
    }
}

struct LoopHandle {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl LoopHandle {
    /// Cancel and wait, so no tick can still be running afterwards.
    async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            if !err.is_cancelled() {
                log_error!("tracking loop task failed to join: {err}");
            }
        }
    }
}

struct ControllerState {
    session: TrackingSession,
    worker: Option<LoopHandle>,
}

impl ControllerState {
    /// A session whose loop task died (panic, runtime teardown) is not active.
    fn reconcile(&mut self) {
        let dead = self
            .worker
            .as_ref()
            .map(|worker| worker.handle.is_finished())
            .unwrap_or(true);
        if self.session.is_active() && dead {
            log_warn!("tracking loop for {:?} is gone; marking idle", self.session.owner_user_id);
            self.worker = None;
            self.session.halt();
        }
    }
}

struct ControllerInner {
    state: Mutex<ControllerState>,
    /// Reentrancy guard: set while a start is between its first check and
    /// arming the loop.
    starting: AtomicBool,
    /// Bumped by every stop/suspend/session change; a start that observes a
    /// different value before arming gives up.
    generation: AtomicU64,
    permission: Arc<PermissionGate>,
    sampler: Sampler,
    status: StatusBroadcaster,
    config: ControllerConfig,
}

/// Owns the single tracking session of the process.
///
/// Cheap to clone; every clone drives the same session.
#[derive(Clone)]
pub struct TrackingController {
    inner: Arc<ControllerInner>,
}

impl TrackingController {
    pub fn new(
        sampler: Sampler,
        permission: Arc<PermissionGate>,
        status: StatusBroadcaster,
        config: ControllerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ControllerState {
                    session: TrackingSession::new(config.default_interval),
                    worker: None,
                }),
                starting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                permission,
                sampler,
                status,
                config,
            }),
        }
    }

    pub fn status(&self) -> StatusObserver {
        self.inner.status.observer()
    }

    pub async fn session(&self) -> TrackingSession {
        let mut state = self.inner.state.lock().await;
        state.reconcile();
        state.session.clone()
    }

    pub async fn is_active(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        state.reconcile();
        state.session.is_active()
    }

    /// Start tracking for `user_id`. `None` uses the configured interval.
    pub async fn start(&self, user_id: &str, interval: Option<Duration>) -> bool {
        match self.try_start(user_id, interval).await {
            Ok(()) => true,
            Err(err) => {
                log_warn!("tracking start for {} failed: {err}", user_id);
                false
            }
        }
    }

    pub async fn try_start(
        &self,
        user_id: &str,
        interval: Option<Duration>,
    ) -> Result<(), TrackingError> {
        if self.is_active().await {
            return Ok(());
        }

        if self
            .inner
            .starting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(TrackingError::ConcurrencyConflict);
        }

        let generation = self.inner.generation.load(Ordering::Acquire);
        let interval = interval.unwrap_or(self.inner.config.default_interval);
        let result = self.start_inner(user_id, interval, generation).await;

        let state = self.inner.state.lock().await;
        if self.current_generation() == generation {
            self.inner.starting.store(false, Ordering::Release);
        }
        drop(state);

        result
    }

    async fn start_inner(
        &self,
        user_id: &str,
        interval: Duration,
        generation: u64,
    ) -> Result<(), TrackingError> {
        {
            let mut state = self.inner.state.lock().await;
            state.reconcile();
            if state.session.is_active() {
                return Ok(());
            }
            state.session.phase = TrackingPhase::Starting;
        }

        if interval.is_zero() {
            return self.fail_start(TrackingError::InvalidInterval, generation).await;
        }

        if !self.inner.permission.request_permission().await {
            return self.fail_start(TrackingError::PermissionDenied, generation).await;
        }

        let mut state = self.inner.state.lock().await;
        if self.current_generation() != generation {
            return Err(TrackingError::Superseded);
        }

        let session_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        state.session.begin(session_id.clone(), user_id, interval);
        self.inner.status.clear_error();
        self.inner.status.set_active(true);

        let handle = tokio::spawn(tracking_loop(
            session_id.clone(),
            user_id.to_string(),
            interval,
            self.inner.sampler.clone(),
            self.inner.status.observer(),
            cancel.clone(),
        ));
        state.worker = Some(LoopHandle { handle, cancel });

        log_info!("tracking session {} active for {}", session_id, user_id);
        Ok(())
    }

    async fn fail_start(&self, err: TrackingError, generation: u64) -> Result<(), TrackingError> {
        let mut state = self.inner.state.lock().await;
        if self.current_generation() == generation {
            state.session.phase = TrackingPhase::Idle;
            self.inner.status.set_active(false);
            self.inner.status.record_error(err.to_string());
        }
        Err(err)
    }

    /// Stop tracking. Safe from any state; once it returns, no further
    /// reports are sent.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        self.invalidate_pending_start();

        let was_active = state.session.is_active();
        if was_active {
            state.session.phase = TrackingPhase::Stopping;
        }
        if let Some(worker) = state.worker.take() {
            worker.shutdown().await;
        }

        state.session.halt();
        state.session.ever_started = false;
        self.inner.status.set_active(false);
        self.inner.status.clear_error();

        if was_active {
            log_info!("tracking stopped for {:?}", state.session.owner_user_id);
        }
    }

    pub async fn handle_event(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Foregrounded => self.on_foregrounded().await,
            LifecycleEvent::Backgrounded => self.on_backgrounded().await,
            LifecycleEvent::Suspended => self.on_suspended().await,
            LifecycleEvent::SessionChanged(user) => self.on_session_changed(user).await,
        }
    }

    async fn on_foregrounded(&self) {
        let resume = {
            let mut state = self.inner.state.lock().await;
            state.session.foreground = true;
            state.reconcile();
            if state.session.needs_resume() {
                state
                    .session
                    .owner_user_id
                    .clone()
                    .map(|user| (user, state.session.interval))
            } else {
                None
            }
        };

        if let Some((user_id, interval)) = resume {
            log_info!("host foregrounded with tracking lost; resuming for {}", user_id);
            self.start(&user_id, Some(interval)).await;
        }
    }

    async fn on_backgrounded(&self) {
        // Tracking keeps running in the background.
        self.inner.state.lock().await.session.foreground = false;
    }

    /// The host OS dropped our timers. Keep the owner and sticky flag so the
    /// next foreground can bring tracking back.
    async fn on_suspended(&self) {
        let mut state = self.inner.state.lock().await;
        self.invalidate_pending_start();
        if let Some(worker) = state.worker.take() {
            worker.shutdown().await;
        }
        if state.session.is_active() {
            log_warn!("tracking loop reclaimed by host for {:?}", state.session.owner_user_id);
        }
        state.session.halt();
        self.inner.status.set_active(false);
    }

    async fn on_session_changed(&self, user: Option<String>) {
        let (owner, foreground, active) = {
            let mut state = self.inner.state.lock().await;
            state.reconcile();
            (
                state.session.owner_user_id.clone(),
                state.session.foreground,
                state.session.is_active(),
            )
        };

        let same_user = owner.is_some() && owner == user;
        if !same_user {
            if active || owner.is_some() {
                log_info!("session owner changed from {:?} to {:?}; stopping tracking", owner, user);
            }
            self.stop().await;
            let mut state = self.inner.state.lock().await;
            state.session.clear_owner();
            drop(state);
            self.inner.permission.reset();
        }

        let Some(user_id) = user else {
            return;
        };

        if self.inner.config.auto_start_on_login && foreground && !self.is_active().await {
            log_info!("auto-starting tracking for {}", user_id);
            self.start(&user_id, None).await;
        }
    }

    fn invalidate_pending_start(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.starting.store(false, Ordering::Release);
    }

    fn current_generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }
}

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::{info, warn};

use super::PermissionState;

pub const DENIAL_MESSAGE: &str =
    "Location access is needed to share your position. Enable it in system settings to start tracking.";

/// Host-provided location authorization capability.
#[async_trait]
pub trait LocationAuthority: Send + Sync {
    /// Current foreground authorization, without prompting.
    async fn check(&self) -> bool;

    /// Show the OS foreground prompt. Most platforms only allow this once.
    async fn request_foreground(&self) -> bool;

    /// Ask for continuous/background access on top of foreground access.
    async fn request_background(&self) -> bool;

    /// Surface a user-facing explanation after a denial.
    fn explain_denial(&self, message: &str);
}

#[derive(Debug, Default)]
struct GateState {
    state: PermissionState,
    /// Set as soon as a prompt is issued, so a concurrent or later caller
    /// re-checks instead of prompting again.
    requested: bool,
}

pub struct PermissionGate {
    authority: Arc<dyn LocationAuthority>,
    inner: Mutex<GateState>,
    /// Serializes prompts so a second caller never observes a half-finished one.
    prompt: tokio::sync::Mutex<()>,
    request_background: bool,
}

impl PermissionGate {
    pub fn new(authority: Arc<dyn LocationAuthority>, request_background: bool) -> Self {
        Self {
            authority,
            inner: Mutex::new(GateState::default()),
            prompt: tokio::sync::Mutex::new(()),
            request_background,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.lock().state
    }

    pub async fn check_permission(&self) -> bool {
        let granted = self.authority.check().await;
        let mut inner = self.lock();
        inner.state = inner.state.observe(granted);
        granted
    }

    /// Prompt at most once per process (or per [`reset`](Self::reset)).
    ///
    /// Concurrent callers queue behind an in-flight prompt and then read the
    /// answer it produced instead of re-checking while it is still pending.
    pub async fn request_permission(&self) -> bool {
        let _prompt = self.prompt.lock().await;

        let recheck = {
            let mut inner = self.lock();
            if inner.state.is_granted() {
                return true;
            }
            let recheck = inner.requested || inner.state.is_settled();
            if !recheck {
                inner.requested = true;
            }
            recheck
        };
        if recheck {
            return self.check_permission().await;
        }

        info!("Requesting foreground location permission");
        let granted = self.authority.request_foreground().await;
        {
            let mut inner = self.lock();
            inner.state = inner.state.observe(granted);
        }

        if !granted {
            warn!("Foreground location permission denied");
            self.authority.explain_denial(DENIAL_MESSAGE);
            return false;
        }

        if self.request_background && !self.authority.request_background().await {
            warn!("Background location permission denied; tracking may pause while backgrounded");
        }

        true
    }

    /// Forget cached answers, e.g. when a different user signs in.
    pub fn reset(&self) {
        let mut inner = self.lock();
        *inner = GateState::default();
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// What observers are allowed to see about tracking.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStatus {
    pub is_active: bool,
    pub last_error: Option<String>,
    pub last_report_at: Option<DateTime<Utc>>,
}

/// Write side of the status channel. Held only by the controller and the
/// sampler; everyone else gets a [`StatusObserver`].
#[derive(Clone)]
pub struct StatusBroadcaster {
    tx: Arc<watch::Sender<TrackingStatus>>,
}

impl StatusBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(TrackingStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn observer(&self) -> StatusObserver {
        StatusObserver {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> TrackingStatus {
        self.tx.borrow().clone()
    }

    pub(crate) fn set_active(&self, is_active: bool) {
        self.tx.send_if_modified(|status| {
            let changed = status.is_active != is_active;
            status.is_active = is_active;
            changed
        });
    }

    pub(crate) fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.tx.send_modify(|status| status.last_error = Some(message));
    }

    pub(crate) fn clear_error(&self) {
        self.tx.send_if_modified(|status| status.last_error.take().is_some());
    }

    pub(crate) fn record_report(&self, at: DateTime<Utc>) {
        self.tx.send_modify(|status| {
            status.last_report_at = Some(at);
            status.last_error = None;
        });
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of [`TrackingStatus`].
#[derive(Clone)]
pub struct StatusObserver {
    rx: watch::Receiver<TrackingStatus>,
}

impl StatusObserver {
    pub fn current(&self) -> TrackingStatus {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Returns `None` once the broadcaster is gone.
    pub async fn changed(&mut self) -> Option<TrackingStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

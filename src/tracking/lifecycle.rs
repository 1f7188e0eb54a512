use log::{debug, info};
use tokio::{sync::mpsc, task::JoinHandle};

use super::controller::TrackingController;

const EVENT_BUFFER: usize = 32;

/// Host application signals, in the order the host observed them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Foregrounded,
    Backgrounded,
    /// The OS reclaimed the process's timers while it was suspended.
    Suspended,
    /// Login (`Some`) or logout (`None`).
    SessionChanged(Option<String>),
}

/// Sender half handed to the host.
#[derive(Clone)]
pub struct LifecycleSender {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl LifecycleSender {
    /// Queue an event. Returns false once the listener has shut down.
    pub async fn emit(&self, event: LifecycleEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }
}

/// Spawn the task that feeds host events into the controller one at a time.
///
/// Events are handled strictly in order; a login is fully processed before a
/// following foreground signal is looked at. The task ends when every
/// [`LifecycleSender`] is dropped.
pub fn spawn_lifecycle_listener(controller: TrackingController) -> (LifecycleSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            debug!("lifecycle event: {event:?}");
            controller.handle_event(event).await;
        }
        info!("lifecycle listener stopped");
    });

    (LifecycleSender { tx }, handle)
}

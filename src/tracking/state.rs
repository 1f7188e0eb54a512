use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TrackingPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Controller-owned session record. Only the controller mutates it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSession {
    pub phase: TrackingPhase,
    pub session_id: Option<String>,
    pub owner_user_id: Option<String>,
    #[serde(with = "duration_ms")]
    pub interval: Duration,
    pub started_at: Option<DateTime<Utc>>,
    /// Sticky across suspensions; cleared only by a session change.
    pub ever_started: bool,
    pub foreground: bool,
}

impl TrackingSession {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            phase: TrackingPhase::Idle,
            session_id: None,
            owner_user_id: None,
            interval: default_interval,
            started_at: None,
            ever_started: false,
            foreground: true,
        }
    }

    pub fn is_active(&self) -> bool {
        self.phase == TrackingPhase::Active
    }

    pub fn begin(&mut self, session_id: String, user_id: &str, interval: Duration) {
        self.phase = TrackingPhase::Active;
        self.session_id = Some(session_id);
        self.owner_user_id = Some(user_id.to_string());
        self.interval = interval;
        self.started_at = Some(Utc::now());
        self.ever_started = true;
    }

    /// Loop gone, but owner and sticky flag kept so it can be resumed.
    pub fn halt(&mut self) {
        self.phase = TrackingPhase::Idle;
        self.session_id = None;
        self.started_at = None;
    }

    /// Forget the owner entirely (logout or user switch).
    pub fn clear_owner(&mut self) {
        self.halt();
        self.owner_user_id = None;
        self.ever_started = false;
    }

    /// Whether a foreground transition should bring tracking back.
    pub fn needs_resume(&self) -> bool {
        self.ever_started && !self.is_active() && self.owner_user_id.is_some()
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::warn;

use super::LocationAuthority;

/// Authority for hosts without an interactive permission UI.
///
/// The operator decides up front through `FIELDTRACK_LOCATION_PERMISSION`
/// (`granted` by default, `denied` to simulate refusal).
pub struct HeadlessAuthority {
    granted: bool,
    prompted: AtomicBool,
}

impl HeadlessAuthority {
    pub fn new(granted: bool) -> Self {
        Self {
            granted,
            prompted: AtomicBool::new(false),
        }
    }

    pub fn from_env() -> Self {
        let granted = std::env::var("FIELDTRACK_LOCATION_PERMISSION")
            .map(|value| !value.eq_ignore_ascii_case("denied"))
            .unwrap_or(true);
        Self::new(granted)
    }
}

#[async_trait]
impl LocationAuthority for HeadlessAuthority {
    async fn check(&self) -> bool {
        // Nothing is authorized until the one-time prompt has happened.
        self.prompted.load(Ordering::Acquire) && self.granted
    }

    async fn request_foreground(&self) -> bool {
        self.prompted.store(true, Ordering::Release);
        self.granted
    }

    async fn request_background(&self) -> bool {
        self.granted
    }

    fn explain_denial(&self, message: &str) {
        warn!("{message}");
    }
}

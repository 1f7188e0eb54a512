use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    collector::{Collector, LocationReport},
    identity::DeviceIdentityStore,
    position::{LocationFix, PositionSource, SourceError},
};

use super::{error::TrackingError, status::StatusBroadcaster};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// One sampling tick: read a fix, normalize it, ship it.
///
/// Holds no timers; the loop worker decides when to call it.
#[derive(Clone)]
pub struct Sampler {
    source: Arc<dyn PositionSource>,
    collector: Arc<dyn Collector>,
    identity: Arc<DeviceIdentityStore>,
    status: StatusBroadcaster,
    sample_timeout: Duration,
}

impl Sampler {
    pub fn new(
        source: Arc<dyn PositionSource>,
        collector: Arc<dyn Collector>,
        identity: Arc<DeviceIdentityStore>,
        status: StatusBroadcaster,
        sample_timeout: Duration,
    ) -> Self {
        Self {
            source,
            collector,
            identity,
            status,
            sample_timeout,
        }
    }

    pub async fn sample_once(&self) -> Option<LocationFix> {
        match self.read_fix().await {
            Ok(fix) => Some(fix),
            Err(err) => {
                log_warn!("{err}");
                None
            }
        }
    }

    pub async fn report(&self, user_id: &str, fix: LocationFix) -> bool {
        let report = LocationReport {
            device_id: self.identity.device_id().await,
            user_id: user_id.to_string(),
            fix,
            timestamp: Utc::now(),
        };

        match self.collector.submit(&report).await {
            Ok(record) => {
                let at = record.server_time().unwrap_or(report.timestamp);
                log_debug!(
                    "Reported {:.5}, {:.5} @ {} km/h for {}",
                    fix.latitude,
                    fix.longitude,
                    fix.speed_kmh,
                    user_id
                );
                self.status.record_report(at);
                true
            }
            Err(err) => {
                let err = TrackingError::from(err);
                log_warn!("Location report for {} dropped: {err}", user_id);
                self.status.record_error(err.to_string());
                false
            }
        }
    }

    /// Sample then report. A missing fix is recorded on the status surface.
    pub async fn tick(&self, user_id: &str) -> bool {
        match self.read_fix().await {
            Ok(fix) => self.report(user_id, fix).await,
            Err(err) => {
                log_warn!("{err}");
                self.status.record_error(err.to_string());
                false
            }
        }
    }

    async fn read_fix(&self) -> Result<LocationFix, TrackingError> {
        let raw = tokio::time::timeout(self.sample_timeout, self.source.current_fix())
            .await
            .map_err(|_| SourceError::Timeout(self.sample_timeout.as_millis() as u64))??;
        Ok(LocationFix::from(&raw))
    }
}

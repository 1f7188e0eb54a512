//! Position source capability and fix normalization.
//!
//! Hardware access lives outside this crate. The host plugs in a
//! [`PositionSource`]; everything downstream only sees normalized
//! [`LocationFix`] values.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speed reported when the source omits it or reports a negative value.
/// The collector rejects null speeds, and many backends never fill the field.
pub const DEFAULT_SPEED_KMH: u32 = 10;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("position hardware unavailable: {0}")]
    Unavailable(String),

    #[error("no fix within {0} ms")]
    Timeout(u64),
}

/// Reading as delivered by the positioning backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
}

impl RawFix {
    pub fn new(latitude: f64, longitude: f64, speed_kmh: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            speed_kmh,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: u32,
}

impl From<&RawFix> for LocationFix {
    fn from(raw: &RawFix) -> Self {
        Self {
            latitude: raw.latitude,
            longitude: raw.longitude,
            speed_kmh: normalize_speed(raw.speed_kmh),
        }
    }
}

pub fn normalize_speed(raw: Option<f64>) -> u32 {
    match raw {
        Some(speed) if speed.is_finite() && speed >= 0.0 => speed.round().min(u32::MAX as f64) as u32,
        _ => DEFAULT_SPEED_KMH,
    }
}

/// "Give me one fix now", backed by whatever the host platform offers.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn current_fix(&self) -> Result<RawFix, SourceError>;
}

/// Wanders around a fixed origin. Used by the headless binary when no real
/// positioning backend is attached.
pub struct SimulatedPositionSource {
    origin: (f64, f64),
    rng: Mutex<StdRng>,
}

impl SimulatedPositionSource {
    const JITTER_DEG: f64 = 0.0005;

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            origin: (latitude, longitude),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(latitude: f64, longitude: f64, seed: u64) -> Self {
        Self {
            origin: (latitude, longitude),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn current_fix(&self) -> Result<RawFix, SourceError> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let latitude = self.origin.0 + rng.gen_range(-Self::JITTER_DEG..Self::JITTER_DEG);
        let longitude = self.origin.1 + rng.gen_range(-Self::JITTER_DEG..Self::JITTER_DEG);
        // Roughly a third of readings come back without speed, like real GPS chips.
        let speed = rng.gen_bool(0.66).then(|| rng.gen_range(0.0..60.0));

        Ok(RawFix {
            latitude,
            longitude,
            speed_kmh: speed,
        })
    }
}

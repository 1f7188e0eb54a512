use thiserror::Error;

use crate::{collector::CollectorError, position::SourceError};

/// Everything that can go wrong while tracking. None of these escape to the
/// host as a fault; they become a `false` return or a `last_error` string.
#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("location permission denied")]
    PermissionDenied,

    #[error("location unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("failed to send location: {0}")]
    Transmission(#[from] CollectorError),

    #[error("tracking start already in progress")]
    ConcurrencyConflict,

    #[error("tracking interval must be greater than zero")]
    InvalidInterval,

    #[error("tracking start superseded by stop or session change")]
    Superseded,
}

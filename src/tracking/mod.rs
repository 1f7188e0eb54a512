pub mod commands;
pub mod controller;
pub mod error;
pub mod lifecycle;
pub mod loop_worker;
pub mod sampler;
pub mod state;
pub mod status;

pub use controller::{ControllerConfig, TrackingController};
pub use error::TrackingError;
pub use lifecycle::{spawn_lifecycle_listener, LifecycleEvent, LifecycleSender};
pub use sampler::Sampler;
pub use state::{TrackingPhase, TrackingSession};
pub use status::{StatusBroadcaster, StatusObserver, TrackingStatus};

pub mod gate;
pub mod headless;
pub mod state;

pub use gate::{LocationAuthority, PermissionGate, DENIAL_MESSAGE};
pub use headless::HeadlessAuthority;
pub use state::PermissionState;

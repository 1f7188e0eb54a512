use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PermissionState {
    #[default]
    Unrequested,
    Granted,
    Denied,
}

impl PermissionState {
    /// State after the OS reports its current authorization.
    pub fn observe(self, granted: bool) -> Self {
        if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }

    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }

    /// Whether a cached answer exists that makes a fresh prompt pointless.
    pub fn is_settled(self) -> bool {
        self != PermissionState::Unrequested
    }
}

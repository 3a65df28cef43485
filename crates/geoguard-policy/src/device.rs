//! Device registration policy
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePolicy {
    pub max_devices_per_user: u32,
    pub require_device_registration: bool,
    pub auto_register_first_device: bool,
}

impl Default for DevicePolicy {
    fn default() -> Self {
        Self {
            max_devices_per_user: 1,
            require_device_registration: false,
            auto_register_first_device: true,
        }
    }
}

/// Outcome of checking a device against a user's registered devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAdmission {
    /// Already registered, or registration is not required
    Admitted,
    /// First device for this user; the caller should register it
    RegisterFirst,
    /// Registration is required and this device is unknown
    Unregistered,
    /// Unknown device and the user already has the maximum number
    LimitReached,
}

impl DeviceAdmission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, DeviceAdmission::Admitted | DeviceAdmission::RegisterFirst)
    }
}

impl DevicePolicy {
    pub fn admit(&self, device_id: &str, registered: &[String]) -> DeviceAdmission {
        if registered.iter().any(|d| d == device_id) {
            return DeviceAdmission::Admitted;
        }
        if registered.is_empty() && self.auto_register_first_device {
            return DeviceAdmission::RegisterFirst;
        }
        if registered.len() >= self.max_devices_per_user as usize {
            return DeviceAdmission::LimitReached;
        }
        if self.require_device_registration {
            DeviceAdmission::Unregistered
        } else {
            DeviceAdmission::Admitted
        }
    }
}

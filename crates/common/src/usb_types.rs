//! USB device records and classification verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

/// A USB device as reported by the host's device registry
///
/// Both fields are free text and may be empty. Records are never mutated
/// after the enumerator produces them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Human-readable device name
    pub name: String,
    /// Platform-assigned instance identifier (e.g. `USB\VID_0BDA&PID_0165\001`)
    pub device_id: String,
}

impl Device {
    pub fn new(name: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device_id: device_id.into(),
        }
    }

    /// De-duplication key for this device
    pub fn key(&self) -> DeviceKey {
        DeviceKey {
            device_id: self.device_id.clone(),
            name: self.name.clone(),
        }
    }

    /// Lowercased `"{name} {device_id}"`, the text all signature matching runs against
    pub fn haystack(&self) -> String {
        format!("{} {}", self.name, self.device_id).to_lowercase()
    }
}

/// Identity of a device across polls: the (device_id, name) pair
///
/// Stability depends on the platform reporting the same identifier for the
/// same physical device on every query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    pub device_id: String,
    pub name: String,
}

/// Allowlist verdict for a device that was not filtered out as noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// Matches an approved signature
    Approved,
    /// Anything else (default-deny)
    Suspicious,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Suspicious => "SUSPICIOUS",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_id_then_name() {
        let device = Device::new("Unknown Flash Drive", r"USB\VID_1234&PID_5678");
        let key = device.key();
        assert_eq!(key.device_id, r"USB\VID_1234&PID_5678");
        assert_eq!(key.name, "Unknown Flash Drive");
    }

    #[test]
    fn test_same_fields_same_key() {
        let a = Device::new("Reader", "USB\\1");
        let b = Device::new("Reader", "USB\\1");
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), Device::new("Reader", "USB\\2").key());
    }

    #[test]
    fn test_haystack_joins_and_lowercases() {
        let device = Device::new("Usbccid Smartcard Reader", r"USB\VID_0BDA&PID_0165\001");
        assert_eq!(
            device.haystack(),
            r"usbccid smartcard reader usb\vid_0bda&pid_0165\001"
        );
    }

    #[test]
    fn test_haystack_with_empty_fields() {
        assert_eq!(Device::new("", "").haystack(), " ");
    }

    #[test]
    fn test_classification_display() {
        assert_eq!(Classification::Approved.to_string(), "APPROVED");
        assert_eq!(Classification::Suspicious.to_string(), "SUSPICIOUS");
    }

    #[test]
    fn test_classification_serializes_uppercase() {
        let json = serde_json::to_string(&Classification::Suspicious).unwrap();
        assert_eq!(json, "\"SUSPICIOUS\"");
    }
}

//! USB device enumeration
//!
//! The poll loop only sees [`DeviceEnumerator`]. Two back ends implement it:
//! - [`PowerShellEnumerator`] asks Windows for `Win32_PnPEntity` rows with a
//!   `USB` device id
//! - [`LibusbEnumerator`] walks the bus through libusb and renders ids in the
//!   same `USB\VID_xxxx&PID_xxxx\instance` form, so one set of signature
//!   tables works on every platform
//!
//! Failures are returned as [`EnumerationError`] rather than an empty list.

pub mod libusb;
pub mod powershell;

pub use libusb::LibusbEnumerator;
pub use powershell::{FIELD_SEPARATOR, ParsedDevices, PowerShellEnumerator, parse_device_list};

use crate::config::EnumeratorSettings;
use common::{Device, EnumerationError};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Source of the currently attached USB devices
pub trait DeviceEnumerator {
    /// List attached USB devices in the order the platform reports them
    ///
    /// `Ok(vec![])` means no devices are attached.
    fn list_usb_devices(&self)
    -> impl Future<Output = Result<Vec<Device>, EnumerationError>> + Send;
}

/// Configured back end selection
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// PowerShell on Windows, libusb everywhere else
    #[default]
    Auto,
    #[value(name = "powershell")]
    PowerShell,
    Libusb,
}

/// The enumerator chosen at startup
pub enum Backend {
    PowerShell(PowerShellEnumerator),
    Libusb(LibusbEnumerator),
}

impl Backend {
    pub fn from_settings(settings: &EnumeratorSettings) -> Self {
        let kind = match settings.backend {
            BackendKind::Auto if cfg!(windows) => BackendKind::PowerShell,
            BackendKind::Auto => BackendKind::Libusb,
            kind => kind,
        };

        match kind {
            BackendKind::PowerShell => {
                Self::PowerShell(PowerShellEnumerator::new(settings.powershell.clone()))
            }
            _ => Self::Libusb(LibusbEnumerator::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerShell(_) => "powershell",
            Self::Libusb(_) => "libusb",
        }
    }
}

impl DeviceEnumerator for Backend {
    async fn list_usb_devices(&self) -> Result<Vec<Device>, EnumerationError> {
        match self {
            Self::PowerShell(enumerator) => enumerator.list_usb_devices().await,
            Self::Libusb(enumerator) => enumerator.list_usb_devices().await,
        }
    }
}

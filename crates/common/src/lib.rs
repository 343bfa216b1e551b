//! Common types for usb-monitor
//!
//! This crate holds what the monitor and its back ends share: the USB device
//! record, its de-duplication key, the allowlist verdict, error types, and
//! tracing setup.

pub mod error;
pub mod logging;
pub mod test_utils;
pub mod usb_types;

pub use error::{EnumerationError, Error, Result};
pub use logging::setup_logging;
pub use usb_types::{Classification, Device, DeviceKey};

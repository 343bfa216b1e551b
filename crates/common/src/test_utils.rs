//! Test utilities for usb-monitor
//!
//! Provides device fixtures and helper functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_smartcard_reader;
//!
//! # fn main() {
//! let device = create_smartcard_reader();
//! assert_eq!(device.name, "Usbccid Smartcard Reader");
//! # }
//! ```

use crate::Device;
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a device in the `USB\VID_xxxx&PID_xxxx\instance` form used by the registry
///
/// # Example
/// ```
/// use common::test_utils::create_mock_device;
///
/// let device = create_mock_device("Keyboard", 0x046d, 0xc31c, "1");
/// assert_eq!(device.device_id, r"USB\VID_046D&PID_C31C\1");
/// ```
pub fn create_mock_device(name: &str, vendor_id: u16, product_id: u16, instance: &str) -> Device {
    Device::new(
        name,
        format!(
            "USB\\VID_{:04X}&PID_{:04X}\\{}",
            vendor_id, product_id, instance
        ),
    )
}

/// The approved CAC reader
pub fn create_smartcard_reader() -> Device {
    Device::new("Usbccid Smartcard Reader", r"USB\VID_0BDA&PID_0165\001")
}

/// An internal hub that the default ignore list filters out
pub fn create_generic_hub() -> Device {
    Device::new("Generic USB Hub", r"USB\VID_8087&PID_0024")
}

/// A device nothing in the default tables knows about
pub fn create_unknown_flash_drive() -> Device {
    Device::new("Unknown Flash Drive", r"USB\VID_1234&PID_5678")
}

/// Create `count` distinct unknown devices
pub fn create_mock_device_list(count: u16) -> Vec<Device> {
    (0..count)
        .map(|i| create_mock_device(&format!("Test Device {}", i), 0x1234, i, &format!("SN{:06}", i)))
        .collect()
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let result = with_timeout(DEFAULT_TEST_TIMEOUT, async { 42 }).await.unwrap();
///     assert_eq!(result, 42);
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

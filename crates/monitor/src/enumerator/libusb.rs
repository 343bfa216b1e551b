//! Cross-platform enumeration through libusb
//!
//! libusb has no registry names, so each device is rendered the way Windows
//! would show it: `USB\VID_xxxx&PID_xxxx\instance`, where the instance is the
//! serial number when readable and the bus/port path otherwise. Names come
//! from the manufacturer and product string descriptors, which need the
//! device to be openable; hubs get a fallback name so the default ignore
//! list still applies to them.

use super::DeviceEnumerator;
use common::{Device, EnumerationError};
use rusb::UsbContext;
use tracing::{debug, trace};

/// Linux Foundation, vendor of the kernel's virtual root hubs
const LINUX_FOUNDATION_VID: u16 = 0x1d6b;

/// bDeviceClass for hubs
const HUB_CLASS: u8 = 0x09;

#[derive(Debug, Clone, Default)]
pub struct LibusbEnumerator;

impl LibusbEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceEnumerator for LibusbEnumerator {
    async fn list_usb_devices(&self) -> Result<Vec<Device>, EnumerationError> {
        tokio::task::spawn_blocking(scan_bus)
            .await
            .map_err(|e| EnumerationError::Join(e.to_string()))?
    }
}

/// Enumerate the bus synchronously
fn scan_bus() -> Result<Vec<Device>, EnumerationError> {
    let list = rusb::devices().map_err(|e| EnumerationError::Usb(e.to_string()))?;
    let mut found = Vec::with_capacity(list.len());

    for device in list.iter() {
        match describe(&device) {
            Ok(described) => found.push(described),
            Err(e) => debug!(
                "Skipping device bus={} addr={}: {}",
                device.bus_number(),
                device.address(),
                e
            ),
        }
    }

    trace!("libusb reported {} device(s)", found.len());
    Ok(found)
}

/// String descriptors, when the device could be opened
#[derive(Debug, Default)]
struct DeviceStrings {
    manufacturer: Option<String>,
    product: Option<String>,
    serial_number: Option<String>,
}

fn describe<T: UsbContext>(device: &rusb::Device<T>) -> Result<Device, rusb::Error> {
    let descriptor = device.device_descriptor()?;
    let strings = read_strings(device, &descriptor);

    let instance = strings
        .serial_number
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| {
            let ports = device.port_numbers().unwrap_or_default();
            format_port_path(device.bus_number(), device.address(), &ports)
        });

    let device_id = format_device_id(descriptor.vendor_id(), descriptor.product_id(), &instance);
    let name = display_name(
        strings.manufacturer.as_deref(),
        strings.product.as_deref(),
        descriptor.vendor_id(),
        descriptor.class_code(),
    );

    Ok(Device::new(name, device_id))
}

fn read_strings<T: UsbContext>(
    device: &rusb::Device<T>,
    descriptor: &rusb::DeviceDescriptor,
) -> DeviceStrings {
    let handle = match device.open() {
        Ok(handle) => handle,
        Err(e) => {
            trace!(
                "Cannot open bus={} addr={} for string descriptors: {}",
                device.bus_number(),
                device.address(),
                e
            );
            return DeviceStrings::default();
        }
    };

    let read = |index: Option<u8>| {
        index.and_then(|idx| handle.read_string_descriptor_ascii(idx).ok())
    };

    DeviceStrings {
        manufacturer: read(descriptor.manufacturer_string_index()),
        product: read(descriptor.product_string_index()),
        serial_number: read(descriptor.serial_number_string_index()),
    }
}

/// `USB\VID_0BDA&PID_0165\instance`
pub fn format_device_id(vendor_id: u16, product_id: u16, instance: &str) -> String {
    format!(
        "USB\\VID_{:04X}&PID_{:04X}\\{}",
        vendor_id, product_id, instance
    )
}

/// `bus-port.port...`, or `bus-addr` for devices without port numbers (root hubs)
///
/// Port paths stay the same while a device remains plugged into the same
/// socket; the bus address changes on every re-plug.
pub fn format_port_path(bus: u8, address: u8, ports: &[u8]) -> String {
    if ports.is_empty() {
        return format!("{}-{}", bus, address);
    }

    let path: Vec<String> = ports.iter().map(|p| p.to_string()).collect();
    format!("{}-{}", bus, path.join("."))
}

/// Manufacturer and product joined, or a class-based fallback
pub fn display_name(
    manufacturer: Option<&str>,
    product: Option<&str>,
    vendor_id: u16,
    class_code: u8,
) -> String {
    let parts: Vec<&str> = [manufacturer, product]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if !parts.is_empty() {
        return parts.join(" ");
    }

    match (vendor_id, class_code) {
        (LINUX_FOUNDATION_VID, HUB_CLASS) => "USB Root Hub".to_string(),
        (_, HUB_CLASS) => "Generic USB Hub".to_string(),
        _ => String::new(),
    }
}

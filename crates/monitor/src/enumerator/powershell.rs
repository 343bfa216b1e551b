//! Windows enumeration through PowerShell
//!
//! Queries the plug-and-play registry (`Win32_PnPEntity`) for entries whose
//! device id starts with `USB` and prints each as `Name||DeviceID`.

use super::DeviceEnumerator;
use common::{Device, EnumerationError};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Separates name and device id on each output line
///
/// Two characters so that a single `|` inside a device name does not split it.
pub const FIELD_SEPARATOR: &str = "||";

const QUERY_SCRIPT: &str = r#"
Get-CimInstance Win32_PnPEntity |
  Where-Object { $_.DeviceID -like 'USB*' } |
  Select-Object Name, DeviceID |
  ForEach-Object { "$($_.Name)||$($_.DeviceID)" }
"#;

/// Result of parsing the query output
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParsedDevices {
    pub devices: Vec<Device>,
    /// Non-blank lines without [`FIELD_SEPARATOR`]
    pub malformed: usize,
}

/// Parse `Name||DeviceID` lines
///
/// Lines are split at the first separator and both halves trimmed. Lines
/// without a separator are dropped and counted; blank lines are skipped.
pub fn parse_device_list(raw: &str) -> ParsedDevices {
    let mut parsed = ParsedDevices::default();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }

        match line.split_once(FIELD_SEPARATOR) {
            Some((name, device_id)) => parsed
                .devices
                .push(Device::new(name.trim(), device_id.trim())),
            None => {
                trace!("Dropping malformed device record: {:?}", line);
                parsed.malformed += 1;
            }
        }
    }

    parsed
}

/// Enumerator that shells out to PowerShell
#[derive(Debug, Clone)]
pub struct PowerShellEnumerator {
    program: String,
}

impl PowerShellEnumerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the query and return its stdout
    ///
    /// The child is killed if this future is dropped.
    async fn run_query(&self) -> Result<String, EnumerationError> {
        let output = Command::new(&self.program)
            .args(["-NoProfile", "-NonInteractive", "-Command", QUERY_SCRIPT])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EnumerationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EnumerationError::QueryFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl DeviceEnumerator for PowerShellEnumerator {
    async fn list_usb_devices(&self) -> Result<Vec<Device>, EnumerationError> {
        let raw = self.run_query().await?;
        let parsed = parse_device_list(&raw);

        if parsed.malformed > 0 {
            debug!(
                "Dropped {} malformed device record(s) from {}",
                parsed.malformed, self.program
            );
        }

        Ok(parsed.devices)
    }
}

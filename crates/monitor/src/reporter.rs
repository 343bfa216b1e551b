//! Device event reporting
//!
//! Every newly observed, non-ignored device produces one event. The event is
//! appended to a persistent log file (the operator's audit trail) and echoed
//! to stdout. A failing log write is surfaced on stdout but never stops the
//! monitor, and neither does a failing stdout write (a closed pipe).

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use common::{Classification, Device};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Event log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `timestamp - LEVEL - message`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Severity written into each event log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON form of a single event log line
#[derive(Debug, Serialize)]
struct EventRecord<'a> {
    timestamp: String,
    level: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Classification>,
}

/// Append-only event log file
///
/// The file is opened once and held until the log is dropped.
pub struct EventLog {
    path: PathBuf,
    format: LogFormat,
    file: BufWriter<File>,
}

impl EventLog {
    /// Open (or create) the log for appending
    pub fn open(path: impl Into<PathBuf>, format: LogFormat) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create event log directory: {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open event log: {}", path.display()))?;

        debug!("Opened event log {} ({:?})", path.display(), format);

        Ok(Self {
            path,
            format,
            file: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it to disk
    pub fn write(
        &mut self,
        severity: Severity,
        message: &str,
        device: Option<(&Device, Classification)>,
    ) -> io::Result<()> {
        let line = format_line(self.format, Local::now(), severity, message, device)?;
        self.file.write_all(line.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.file.flush()
    }
}

/// Render one event log line without the trailing newline
pub fn format_line(
    format: LogFormat,
    timestamp: DateTime<Local>,
    severity: Severity,
    message: &str,
    device: Option<(&Device, Classification)>,
) -> io::Result<String> {
    match format {
        LogFormat::Text => Ok(format!(
            "{} - {} - {}",
            timestamp.format("%Y-%m-%d %H:%M:%S,%3f"),
            severity,
            message
        )),
        LogFormat::Json => {
            let record = EventRecord {
                timestamp: timestamp.to_rfc3339(),
                level: severity.as_str(),
                message,
                device_id: device.map(|(d, _)| d.device_id.as_str()),
                name: device.map(|(d, _)| d.name.as_str()),
                status: device.map(|(_, c)| c),
            };
            serde_json::to_string(&record).map_err(io::Error::other)
        }
    }
}

/// Operator-facing text for a newly detected device
pub fn event_message(device: &Device, classification: Classification) -> String {
    format!(
        "New USB detected - DeviceID: {}, Name: {}, Status: {}",
        device.device_id, device.name, classification
    )
}

/// Sink for device events produced by the poll loop
pub trait Reporter {
    /// Emit one event for a newly observed device
    fn report(&mut self, device: &Device, classification: Classification);

    /// Called once before the first poll
    fn monitoring_started(&mut self) {}

    /// Called once after the loop stops
    fn monitoring_stopped(&mut self) {}
}

/// Writes events to the event log and an output stream (stdout by default)
pub struct EventReporter<W = io::Stdout> {
    log: EventLog,
    out: W,
}

impl EventReporter {
    pub fn new(log: EventLog) -> Self {
        Self::with_output(log, io::stdout())
    }
}

impl<W: Write> EventReporter<W> {
    pub fn with_output(log: EventLog, out: W) -> Self {
        Self { log, out }
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn append(
        &mut self,
        severity: Severity,
        message: &str,
        device: Option<(&Device, Classification)>,
    ) {
        if let Err(e) = self.log.write(severity, message, device) {
            warn!(
                "Failed to write event log {}: {}",
                self.log.path().display(),
                e
            );
            let notice = format!(
                "Warning: could not write to {}: {}",
                self.log.path().display(),
                e
            );
            self.print(&notice);
        }
    }

    fn print(&mut self, line: &str) {
        let result = writeln!(self.out, "{}", line).and_then(|()| self.out.flush());
        if let Err(e) = result {
            warn!("Failed to write to output: {}", e);
        }
    }
}

impl<W: Write> Reporter for EventReporter<W> {
    fn report(&mut self, device: &Device, classification: Classification) {
        match classification {
            Classification::Approved => info!(
                device_id = %device.device_id,
                name = %device.name,
                "Approved USB device detected"
            ),
            Classification::Suspicious => warn!(
                device_id = %device.device_id,
                name = %device.name,
                "Suspicious USB device detected"
            ),
        }

        let message = event_message(device, classification);
        self.append(Severity::Info, &message, Some((device, classification)));
        self.print(&message);
    }

    fn monitoring_started(&mut self) {
        self.append(Severity::Info, "USB monitoring started", None);
    }

    fn monitoring_stopped(&mut self) {
        self.append(Severity::Info, "USB monitoring stopped", None);
    }
}

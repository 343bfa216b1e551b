//! Common error types

use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to obtain the list of attached USB devices
///
/// Kept apart from an empty device list so the poll loop can tell
/// "nothing plugged in" from "the query never ran".
#[derive(Debug, Error)]
pub enum EnumerationError {
    /// The query process could not be started
    #[error("failed to start device query `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The query process ran but exited unsuccessfully
    #[error("device query exited with {status}: {stderr}")]
    QueryFailed { status: ExitStatus, stderr: String },

    /// libusb reported an error while listing the bus
    #[error("USB enumeration failed: {0}")]
    Usb(String),

    /// The query did not finish within the configured timeout
    #[error("device query timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The blocking enumeration task panicked or was cancelled
    #[error("enumeration task failed: {0}")]
    Join(String),
}

//! usb-monitor
//!
//! Suspicious USB checker for a single workstation. Polls for attached USB
//! devices and logs every new device as APPROVED or SUSPICIOUS.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use monitor::classifier::Classifier;
use monitor::config::MonitorConfig;
use monitor::enumerator::{Backend, BackendKind, DeviceEnumerator};
use monitor::poll::{PollLoop, PollSettings, shutdown_on};
use monitor::reporter::{EventLog, EventReporter};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "usb-monitor")]
#[command(
    author,
    version,
    about = "USB Monitor - Flag unapproved USB devices as they are plugged in"
)]
#[command(long_about = "
Polls the host for attached USB devices. Each device that is not on the
ignore list is reported once per run as APPROVED (matches an approved
signature) or SUSPICIOUS (anything else). Reports go to the event log file
and to stdout.

EXAMPLES:
    # Run with default config
    usb-monitor

    # Poll every 2 seconds and log to a custom file
    usb-monitor --interval 2 --log-file ~/usb_events.log

    # Show what is attached right now and how it would be classified
    usb-monitor --list-devices

    # Run with debug logging
    usb-monitor --log-level debug

CONFIGURATION:
    The monitor looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/usb-monitor/monitor.toml
    3. /etc/usb-monitor/monitor.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List attached USB devices with their classification and exit
    #[arg(long)]
    list_devices: bool,

    /// Poll a single time and exit
    #[arg(long)]
    once: bool,

    /// Seconds between polls
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,

    /// Event log file
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enumeration back end
    #[arg(long, value_enum, value_name = "BACKEND")]
    backend: Option<BackendKind>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Command-line values win over the configuration file
    fn apply_overrides(&self, config: &mut MonitorConfig) {
        if let Some(level) = &self.log_level {
            config.monitor.log_level = level.clone();
        }
        if let Some(interval) = self.interval {
            config.monitor.poll_interval_seconds = interval;
        }
        if let Some(path) = &self.log_file {
            config.event_log.log_path = path.clone();
        }
        if let Some(backend) = self.backend {
            config.enumerator.backend = backend;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = MonitorConfig::default();
        let path = MonitorConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    // A config file that exists but does not load is fatal; only a missing file
    // falls back to the built-in tables
    let (mut config, source) = match &args.config {
        Some(path) => (
            MonitorConfig::load(Some(path.clone())).context("Failed to load configuration")?,
            Some(path.clone()),
        ),
        None => MonitorConfig::load_or_default().context("Failed to load configuration")?,
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    setup_logging(&config.monitor.log_level).context("Failed to setup logging")?;

    info!("usb-monitor v{}", env!("CARGO_PKG_VERSION"));
    match &source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No configuration file found, using built-in defaults"),
    }
    info!("Log level: {}", config.monitor.log_level);

    let enumerator = Backend::from_settings(&config.enumerator);
    let classifier = Classifier::from_settings(&config.classifier);
    info!("Using {} enumeration", enumerator.name());

    if args.list_devices {
        return list_devices_mode(&enumerator, &classifier, &config).await;
    }

    let log_path = config.event_log.resolved_path();
    let event_log = EventLog::open(&log_path, config.event_log.format)?;

    println!("Starting Suspicious USB Checker...");
    println!("Logging to: {}", log_path.display());

    let mut poll_loop = PollLoop::new(
        enumerator,
        classifier,
        EventReporter::new(event_log),
        PollSettings::from_config(&config),
    );

    if args.once {
        match poll_loop.poll_once().await {
            Ok(summary) => info!(
                "{} device(s) enumerated, {} reported",
                summary.enumerated, summary.reported
            ),
            Err(e) => error!("USB enumeration failed: {}", e),
        }
        return Ok(());
    }

    println!("Press CTRL + C to stop monitoring.\n");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let listener = tokio::spawn(shutdown_on(signal::ctrl_c(), shutdown_tx));

    poll_loop.run(shutdown_rx).await;

    listener
        .await
        .context("Ctrl+C listener task failed")?
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, monitor stopped");

    println!("\nUSB monitoring stopped by user.");
    Ok(())
}

/// Enumerate once and print every device with its verdict
async fn list_devices_mode(
    enumerator: &Backend,
    classifier: &Classifier,
    config: &MonitorConfig,
) -> Result<()> {
    info!("Listing USB devices...");

    let timeout = config.enumerator.timeout();
    let devices = tokio::time::timeout(timeout, enumerator.list_usb_devices())
        .await
        .with_context(|| format!("Device query timed out after {:?}", timeout))?
        .context("Failed to list USB devices")?;

    if devices.is_empty() {
        println!("No USB devices found.");
        return Ok(());
    }

    println!("Found {} USB device(s):\n", devices.len());
    for device in devices {
        let name = if device.name.is_empty() {
            "Unknown Device"
        } else {
            device.name.as_str()
        };
        println!("  [{}] {}", classifier.evaluate(&device), name);
        println!("      {}", device.device_id);
    }

    Ok(())
}

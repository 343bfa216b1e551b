//! The polling loop
//!
//! Each iteration lists the attached devices, drops ignored ones, drops ones
//! already reported this run, and reports the rest with their classification.
//! Then it sleeps for the poll interval. The loop runs until the shutdown
//! channel flips to `true` (or its sender is dropped); the signal is checked
//! before every poll and raced against the sleep, but an enumeration that is
//! already running is allowed to finish.

use crate::classifier::Classifier;
use crate::config::MonitorConfig;
use crate::enumerator::DeviceEnumerator;
use crate::reporter::Reporter;
use crate::tracker::SeenDevices;
use common::{Device, EnumerationError};
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Loop timing
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Sleep between polls
    pub interval: Duration,
    /// Upper bound on a single enumeration call
    pub enumeration_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

impl PollSettings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            interval: config.monitor.poll_interval(),
            enumeration_timeout: config.enumerator.timeout(),
        }
    }
}

/// What happened to the devices of one poll
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub enumerated: usize,
    pub ignored: usize,
    pub already_seen: usize,
    pub reported: usize,
}

/// Totals over the lifetime of a loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub polls: u64,
    pub enumeration_failures: u64,
    pub reported: u64,
}

pub struct PollLoop<E, R> {
    enumerator: E,
    classifier: Classifier,
    reporter: R,
    seen: SeenDevices,
    settings: PollSettings,
    stats: MonitorStats,
}

impl<E, R> PollLoop<E, R>
where
    E: DeviceEnumerator,
    R: Reporter,
{
    /// Create a loop with an empty seen-set
    pub fn new(enumerator: E, classifier: Classifier, reporter: R, settings: PollSettings) -> Self {
        Self {
            enumerator,
            classifier,
            reporter,
            seen: SeenDevices::new(),
            settings,
            stats: MonitorStats::default(),
        }
    }

    /// Run one enumeration and report the new devices it found
    ///
    /// An enumeration error leaves the seen-set untouched.
    pub async fn poll_once(&mut self) -> Result<PollSummary, EnumerationError> {
        self.stats.polls += 1;

        let timeout = self.settings.enumeration_timeout;
        let listed = match tokio::time::timeout(timeout, self.enumerator.list_usb_devices()).await
        {
            Ok(result) => result,
            Err(_) => Err(EnumerationError::Timeout(timeout)),
        };

        match listed {
            Ok(devices) => Ok(self.process(devices)),
            Err(e) => {
                self.stats.enumeration_failures += 1;
                Err(e)
            }
        }
    }

    fn process(&mut self, devices: Vec<Device>) -> PollSummary {
        let mut summary = PollSummary {
            enumerated: devices.len(),
            ..Default::default()
        };

        for device in &devices {
            if self.classifier.is_ignored(device) {
                summary.ignored += 1;
                continue;
            }

            if !self.seen.mark_if_new(device.key()) {
                summary.already_seen += 1;
                continue;
            }

            let classification = self.classifier.classify(device);
            self.reporter.report(device, classification);
            summary.reported += 1;
        }

        self.stats.reported += summary.reported as u64;
        summary
    }

    /// Poll until shutdown is signalled
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> MonitorStats {
        info!(
            "Polling every {:?} (enumeration timeout {:?})",
            self.settings.interval, self.settings.enumeration_timeout
        );
        self.reporter.monitoring_started();

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            match self.poll_once().await {
                Ok(summary) => debug!(
                    "Poll {}: {} device(s), {} ignored, {} already seen, {} reported",
                    self.stats.polls,
                    summary.enumerated,
                    summary.ignored,
                    summary.already_seen,
                    summary.reported
                ),
                Err(e) => warn!("USB enumeration failed: {}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped, stopping");
                        break;
                    }
                }
            }
        }

        self.reporter.monitoring_stopped();
        info!(
            "Stopped after {} poll(s): {} device(s) reported, {} enumeration failure(s)",
            self.stats.polls, self.stats.reported, self.stats.enumeration_failures
        );
        self.stats
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn seen(&self) -> &SeenDevices {
        &self.seen
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

/// Flip `shutdown` to `true` once `signal` resolves
///
/// If waiting for the signal fails, nothing is sent and the error is returned.
/// The sender is still dropped, which stops a loop running on the receiver.
pub async fn shutdown_on<F>(signal: F, shutdown: watch::Sender<bool>) -> io::Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    signal.await?;
    let _ = shutdown.send(true);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Classification;
    use common::test_utils::{create_generic_hub, create_smartcard_reader};

    struct FixedEnumerator(Vec<Device>);

    impl DeviceEnumerator for FixedEnumerator {
        async fn list_usb_devices(&self) -> Result<Vec<Device>, EnumerationError> {
            Ok(self.0.clone())
        }
    }

    struct StuckEnumerator;

    impl DeviceEnumerator for StuckEnumerator {
        async fn list_usb_devices(&self) -> Result<Vec<Device>, EnumerationError> {
            std::future::pending().await
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<(Device, Classification)>);

    impl Reporter for Recorder {
        fn report(&mut self, device: &Device, classification: Classification) {
            self.0.push((device.clone(), classification));
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(10),
            enumeration_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_poll_summary_counts() {
        let devices = vec![
            create_smartcard_reader(),
            create_generic_hub(),
            create_smartcard_reader(),
        ];
        let mut poll_loop = PollLoop::new(
            FixedEnumerator(devices),
            Classifier::default(),
            Recorder::default(),
            settings(),
        );

        let summary = poll_loop.poll_once().await.unwrap();
        assert_eq!(
            summary,
            PollSummary {
                enumerated: 3,
                ignored: 1,
                already_seen: 1,
                reported: 1,
            }
        );
        assert_eq!(poll_loop.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_ignored_device_not_tracked() {
        let mut poll_loop = PollLoop::new(
            FixedEnumerator(vec![create_generic_hub()]),
            Classifier::default(),
            Recorder::default(),
            settings(),
        );

        poll_loop.poll_once().await.unwrap();
        assert!(poll_loop.seen().is_empty());
        assert!(poll_loop.reporter().0.is_empty());
    }

    #[tokio::test]
    async fn test_enumeration_timeout() {
        let mut poll_loop = PollLoop::new(
            StuckEnumerator,
            Classifier::default(),
            Recorder::default(),
            settings(),
        );

        let err = poll_loop.poll_once().await.unwrap_err();
        assert!(matches!(err, EnumerationError::Timeout(_)));
        assert_eq!(
            poll_loop.stats(),
            MonitorStats {
                polls: 1,
                enumeration_failures: 1,
                reported: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_shutdown_on_signal() {
        let (tx, rx) = watch::channel(false);
        shutdown_on(async { Ok(()) }, tx).await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_shutdown_on_failed_signal_sends_nothing() {
        let (tx, rx) = watch::channel(false);
        let result = shutdown_on(async { Err(io::Error::other("no handler")) }, tx).await;

        assert!(result.is_err());
        assert!(!*rx.borrow());
        assert!(rx.has_changed().is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = MonitorConfig::default();
        config.monitor.poll_interval_seconds = 2;
        config.enumerator.timeout_seconds = 7;

        let settings = PollSettings::from_config(&config);
        assert_eq!(settings.interval, Duration::from_secs(2));
        assert_eq!(settings.enumeration_timeout, Duration::from_secs(7));
    }
}

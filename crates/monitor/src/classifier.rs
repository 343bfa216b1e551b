//! Device classification
//!
//! Two stages, both case-insensitive substring searches over
//! `"{name} {device_id}"`:
//! 1. the ignore list drops internal or noisy devices before anything else
//! 2. the approved-signature list marks a device APPROVED; everything else is
//!    SUSPICIOUS
//!
//! Matching is unanchored, so a device whose name happens to contain an
//! approved signature is approved.

use crate::config::ClassifierSettings;
use common::{Classification, Device};
use std::fmt;

/// Trusted product signatures (the CAC reader)
pub const DEFAULT_APPROVED_SIGNATURES: &[&str] = &["Usbccid Smartcard Reader", "VID_0BDA&PID_0165"];

/// Internal devices that would otherwise be reported on every start
pub const DEFAULT_IGNORE_KEYWORDS: &[&str] = &[
    "Root Hub",
    "USB Composite Device",
    "Generic USB Hub",
    "Host Controller",
    "Bluetooth",
    "Integrated",
    "UCSI",
    "Razer Blade 14",
];

/// Full outcome for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Matched the ignore list, never reported
    Ignored,
    Classified(Classification),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored => f.write_str("IGNORED"),
            Self::Classified(classification) => fmt::Display::fmt(classification, f),
        }
    }
}

/// Allowlist classifier with pre-lowercased tables
#[derive(Debug, Clone)]
pub struct Classifier {
    approved_signatures: Vec<String>,
    ignore_keywords: Vec<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVED_SIGNATURES, DEFAULT_IGNORE_KEYWORDS)
    }
}

impl Classifier {
    pub fn new<A, I>(approved_signatures: A, ignore_keywords: I) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Self {
            approved_signatures: lowercase_all(approved_signatures),
            ignore_keywords: lowercase_all(ignore_keywords),
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new(&settings.approved_signatures, &settings.ignore_keywords)
    }

    /// True if any ignore keyword appears in the device's name or id
    pub fn is_ignored(&self, device: &Device) -> bool {
        contains_any(&device.haystack(), &self.ignore_keywords)
    }

    /// APPROVED if any signature appears in the device's name or id, else SUSPICIOUS
    ///
    /// Does not consult the ignore list; callers filter with [`Self::is_ignored`] first.
    pub fn classify(&self, device: &Device) -> Classification {
        if contains_any(&device.haystack(), &self.approved_signatures) {
            Classification::Approved
        } else {
            Classification::Suspicious
        }
    }

    /// Both stages in order
    pub fn evaluate(&self, device: &Device) -> Verdict {
        if self.is_ignored(device) {
            Verdict::Ignored
        } else {
            Verdict::Classified(self.classify(device))
        }
    }
}

fn lowercase_all<T>(patterns: T) -> Vec<String>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| p.as_ref().to_lowercase())
        .collect()
}

fn contains_any(haystack: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| haystack.contains(p.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::test_utils::{
        create_generic_hub, create_smartcard_reader, create_unknown_flash_drive,
    };

    #[test]
    fn test_smartcard_reader_approved() {
        let classifier = Classifier::default();
        let reader = create_smartcard_reader();
        assert!(!classifier.is_ignored(&reader));
        assert_eq!(classifier.classify(&reader), Classification::Approved);
    }

    #[test]
    fn test_generic_hub_ignored() {
        let classifier = Classifier::default();
        assert!(classifier.is_ignored(&create_generic_hub()));
        assert_eq!(classifier.evaluate(&create_generic_hub()), Verdict::Ignored);
    }

    #[test]
    fn test_unknown_device_suspicious() {
        let classifier = Classifier::default();
        let drive = create_unknown_flash_drive();
        assert!(!classifier.is_ignored(&drive));
        assert_eq!(classifier.classify(&drive), Classification::Suspicious);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let classifier = Classifier::default();
        let device = Device::new("some BLUETOOTH radio", r"USB\VID_8087&PID_0A2B");
        assert!(classifier.is_ignored(&device));

        let device = Device::new("", r"usb\vid_0bda&pid_0165\5&2F");
        assert_eq!(classifier.classify(&device), Classification::Approved);
    }

    #[test]
    fn test_signature_in_device_id_only() {
        let classifier = Classifier::default();
        let device = Device::new("Realtek Card Reader", r"USB\VID_0BDA&PID_0165\20121112");
        assert_eq!(classifier.classify(&device), Classification::Approved);
    }

    #[test]
    fn test_ignore_wins_over_approval() {
        let classifier = Classifier::default();
        let device = Device::new("Integrated Smartcard", r"USB\VID_0BDA&PID_0165\1");
        assert_eq!(classifier.evaluate(&device), Verdict::Ignored);
    }

    #[test]
    fn test_coincidental_substring_is_approved() {
        let classifier = Classifier::new(["VID_0BDA"], Vec::<String>::new());
        let device = Device::new("Totally not VID_0BDA", r"USB\VID_FFFF&PID_0001");
        assert_eq!(classifier.classify(&device), Classification::Approved);
    }

    #[test]
    fn test_empty_tables() {
        let classifier = Classifier::new(Vec::<String>::new(), Vec::<String>::new());
        let device = create_smartcard_reader();
        assert!(!classifier.is_ignored(&device));
        assert_eq!(classifier.classify(&device), Classification::Suspicious);
    }

    #[test]
    fn test_empty_device() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.evaluate(&Device::new("", "")),
            Verdict::Classified(Classification::Suspicious)
        );
    }

    #[test]
    fn test_verdict_display() {
        assert_eq!(Verdict::Ignored.to_string(), "IGNORED");
        assert_eq!(
            Verdict::Classified(Classification::Approved).to_string(),
            "APPROVED"
        );
    }
}

//! usb-monitor
//!
//! Polls the host for attached USB devices and reports each newly observed
//! device as APPROVED or SUSPICIOUS against a signature allowlist, after
//! filtering out known internal devices.
//!
//! The pieces are wired together by [`poll::PollLoop`]; the device source is
//! any [`enumerator::DeviceEnumerator`] and the output any
//! [`reporter::Reporter`].

pub mod classifier;
pub mod config;
pub mod enumerator;
pub mod poll;
pub mod reporter;
pub mod tracker;

//! Seen-device tracking
//!
//! Remembers which devices have already been reported during this run. The
//! set only grows and lives exactly as long as its owner, so a restart
//! reports every device again.

use common::DeviceKey;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SeenDevices {
    seen: HashSet<DeviceKey>,
}

impl SeenDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key`, returning true if it was not present before
    pub fn mark_if_new(&mut self, key: DeviceKey) -> bool {
        self.seen.insert(key)
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Device;

    #[test]
    fn test_first_sighting_is_new() {
        let mut seen = SeenDevices::new();
        assert!(seen.is_empty());
        assert!(seen.mark_if_new(Device::new("Drive", "USB\\1").key()));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_repeat_sighting_is_not_new() {
        let mut seen = SeenDevices::new();
        let key = Device::new("Drive", "USB\\1").key();
        assert!(seen.mark_if_new(key.clone()));
        assert!(!seen.mark_if_new(key.clone()));
        assert!(!seen.mark_if_new(key.clone()));
        assert!(seen.contains(&key));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_name_change_is_a_new_device() {
        let mut seen = SeenDevices::new();
        assert!(seen.mark_if_new(Device::new("Drive", "USB\\1").key()));
        assert!(seen.mark_if_new(Device::new("Drive (renamed)", "USB\\1").key()));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_fresh_tracker_forgets() {
        let key = Device::new("Drive", "USB\\1").key();
        let mut first = SeenDevices::new();
        assert!(first.mark_if_new(key.clone()));

        let mut second = SeenDevices::new();
        assert!(second.mark_if_new(key));
    }
}

//! Monitor configuration management

use crate::classifier::{DEFAULT_APPROVED_SIGNATURES, DEFAULT_IGNORE_KEYWORDS};
use crate::enumerator::BackendKind;
use crate::reporter::LogFormat;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Append-only device event log
    #[serde(default)]
    pub event_log: EventLogConfig,
    /// How devices are listed
    #[serde(default)]
    pub enumerator: EnumeratorSettings,
    /// Allowlist and noise filter
    #[serde(default)]
    pub classifier: ClassifierSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "MonitorSettings::default_log_level")]
    pub log_level: String,
    /// Delay between enumeration calls
    #[serde(default = "MonitorSettings::default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
            poll_interval_seconds: Self::default_poll_interval(),
        }
    }
}

impl MonitorSettings {
    fn default_log_level() -> String {
        "info".to_string()
    }

    fn default_poll_interval() -> u64 {
        5
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }
}

/// Event log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogConfig {
    /// Destination file, opened in append mode. `~` is expanded.
    #[serde(default = "EventLogConfig::default_path", alias = "path")]
    pub log_path: PathBuf,
    /// Line format (text, json)
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            log_path: Self::default_path(),
            format: LogFormat::default(),
        }
    }
}

impl EventLogConfig {
    fn default_path() -> PathBuf {
        PathBuf::from("usb_log.txt")
    }

    /// Log path with a leading `~` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        let raw = self.log_path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumeratorSettings {
    /// Enumeration back end (auto, powershell, libusb)
    #[serde(default)]
    pub backend: BackendKind,
    /// Upper bound on a single enumeration call
    #[serde(default = "EnumeratorSettings::default_timeout")]
    pub timeout_seconds: u64,
    /// PowerShell executable used by the powershell back end
    #[serde(default = "EnumeratorSettings::default_powershell")]
    pub powershell: String,
}

impl Default for EnumeratorSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            timeout_seconds: Self::default_timeout(),
            powershell: Self::default_powershell(),
        }
    }
}

impl EnumeratorSettings {
    fn default_timeout() -> u64 {
        30
    }

    fn default_powershell() -> String {
        "powershell".to_string()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Signature tables used by the classifier
///
/// Both lists are matched case-insensitively as substrings of
/// `"{name} {device_id}"`.
///
/// # Example Configuration
/// ```toml
/// [classifier]
/// approved_signatures = ["Usbccid Smartcard Reader", "VID_0BDA&PID_0165"]
/// ignore_keywords = ["Root Hub", "Bluetooth"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default = "ClassifierSettings::default_approved")]
    pub approved_signatures: Vec<String>,
    #[serde(default = "ClassifierSettings::default_ignored")]
    pub ignore_keywords: Vec<String>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            approved_signatures: Self::default_approved(),
            ignore_keywords: Self::default_ignored(),
        }
    }
}

impl ClassifierSettings {
    fn default_approved() -> Vec<String> {
        DEFAULT_APPROVED_SIGNATURES
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn default_ignored() -> Vec<String> {
        DEFAULT_IGNORE_KEYWORDS.iter().map(|s| s.to_string()).collect()
    }
}

impl MonitorConfig {
    /// Load configuration from the specified path
    ///
    /// With `None` the standard locations are searched and finding no file is
    /// an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(&path),
            None => Self::load_first(&Self::search_paths())?
                .map(|(config, _)| config)
                .ok_or_else(|| anyhow!("No configuration file found")),
        }
    }

    /// Read, parse and validate one configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the first of `candidates` that exists
    ///
    /// Returns `Ok(None)` when none of them exist. A file that exists but is
    /// unreadable or invalid is an error, never skipped.
    pub fn load_first(candidates: &[PathBuf]) -> Result<Option<(Self, PathBuf)>> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Ok(Some((Self::from_file(path)?, path.clone()))),
            None => Ok(None),
        }
    }

    /// Load from the standard locations, or defaults if no file exists
    ///
    /// Also returns the path the configuration came from.
    pub fn load_or_default() -> Result<(Self, Option<PathBuf>)> {
        Ok(match Self::load_first(&Self::search_paths())? {
            Some((config, path)) => (config, Some(path)),
            None => (Self::default(), None),
        })
    }

    /// Standard configuration locations, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/usb-monitor/monitor.toml"),
        ]
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-monitor").join("monitor.toml")
        } else {
            PathBuf::from(".config/usb-monitor/monitor.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.monitor.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.monitor.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.monitor.poll_interval_seconds == 0 {
            return Err(anyhow!("poll_interval_seconds must be greater than 0"));
        }

        if self.enumerator.timeout_seconds == 0 {
            return Err(anyhow!("enumerator timeout_seconds must be greater than 0"));
        }

        if self.enumerator.powershell.trim().is_empty() {
            return Err(anyhow!("enumerator powershell executable must not be empty"));
        }

        if self.event_log.log_path.as_os_str().is_empty() {
            return Err(anyhow!("event_log log_path must not be empty"));
        }

        Self::validate_patterns("approved_signatures", &self.classifier.approved_signatures)?;
        Self::validate_patterns("ignore_keywords", &self.classifier.ignore_keywords)?;

        Ok(())
    }

    /// An empty pattern is a substring of every device and would swallow the whole table
    fn validate_patterns(table: &str, patterns: &[String]) -> Result<()> {
        if let Some(index) = patterns.iter().position(|p| p.trim().is_empty()) {
            return Err(anyhow!("Empty entry at index {} in {}", index, table));
        }
        Ok(())
    }
}

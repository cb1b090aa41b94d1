use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::{ACTION_BARCODE_DATA, SERVICE_PACKAGE};

/// scanner unit to claim on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerUnit {
    /// the internal imager
    Imager,
    /// an external ring scanner
    Ring,
}

impl ScannerUnit {
    /// selector understood by the data collection service
    pub fn selector(self) -> &'static str {
        match self {
            ScannerUnit::Imager => "dcs.scanner.imager",
            ScannerUnit::Ring => "dcs.scanner.ring",
        }
    }
}

/// trigger behaviour requested on claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// scan while the trigger is held, one barcode per press
    Manual,
    /// keep scanning while the trigger is held
    Continuous,
}

impl TriggerMode {
    pub fn value(self) -> &'static str {
        match self {
            TriggerMode::Manual => "manual",
            TriggerMode::Continuous => "continuous",
        }
    }
}

/// settings for a scanner bridge session
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use intent_barcodescanner::config::{ScannerConfig, ScannerUnit};
///
/// let config = ScannerConfig::default()
///     .with_scanner(ScannerUnit::Ring)
///     .with_debounce(Duration::ZERO);
/// assert_eq!(config.scanner.selector(), "dcs.scanner.ring");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// notification action the listener subscribes to
    pub event_id: String,
    /// package of the data collection service
    pub service_package: String,
    pub scanner: ScannerUnit,
    /// profile applied on claim, the service falls back to factory settings if it does not exist
    pub profile: String,
    /// `None` keeps whatever the profile defines
    pub trigger_mode: Option<TriggerMode>,
    /// notifications with a lower `version` extra are ignored
    pub min_event_version: i64,
    /// pause after each delivery, in milliseconds
    pub debounce_ms: u64,
    /// how often the read worker checks for cancellation while idle, in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        ScannerConfig {
            event_id: String::from(ACTION_BARCODE_DATA),
            service_package: String::from(SERVICE_PACKAGE),
            scanner: ScannerUnit::Imager,
            profile: String::from("DEFAULT"),
            trigger_mode: None,
            min_event_version: 1,
            debounce_ms: 500,
            poll_interval_ms: 50,
        }
    }
}

impl ScannerConfig {
    /// parse a configuration from JSON, missing fields take their default
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn with_scanner(mut self, scanner: ScannerUnit) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_trigger_mode(mut self, trigger_mode: TriggerMode) -> Self {
        self.trigger_mode = Some(trigger_mode);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce_ms = debounce.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// never zero, a zero interval would turn the worker into a busy loop
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScannerConfig::default();
        assert_eq!(config.event_id, ACTION_BARCODE_DATA);
        assert_eq!(config.scanner.selector(), "dcs.scanner.imager");
        assert_eq!(config.profile, "DEFAULT");
        assert_eq!(config.min_event_version, 1);
        assert_eq!(config.debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_from_json() -> Result<()> {
        let config = ScannerConfig::from_json(
            r#"{"scanner": "ring", "trigger_mode": "continuous", "debounce_ms": 0}"#,
        )?;
        assert_eq!(config.scanner, ScannerUnit::Ring);
        assert_eq!(config.trigger_mode, Some(TriggerMode::Continuous));
        assert_eq!(config.debounce(), Duration::ZERO);
        // untouched fields keep their defaults
        assert_eq!(config.profile, "DEFAULT");
        assert_eq!(config.service_package, SERVICE_PACKAGE);
        Ok(())
    }

    #[test]
    fn test_from_json_rejects_unknown_unit() {
        assert!(ScannerConfig::from_json(r#"{"scanner": "laser"}"#).is_err());
    }

    #[test]
    fn test_poll_interval_never_zero() {
        let config = ScannerConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}

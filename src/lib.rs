use std::fmt::Display;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod gateway;
pub mod listener;
pub mod session;

pub use error::{Result, ScannerError};

// notification action the data collection service broadcasts decoded barcodes on
pub const ACTION_BARCODE_DATA: &str = "com.honeywell.action.MY_BARCODE_DATA";
// package of the vendor data collection service (explicit broadcast target)
pub const SERVICE_PACKAGE: &str = "com.intermec.datacollectionservice";

/// lifecycle state of the scanner bridge
///
/// The numeric codes are part of the host facing contract (`{"state": n}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ScannerState {
    /// created, nothing claimed yet
    None = 0,
    /// listener registered and scanner claimed, no read session active
    Ready = 1,
    /// read session active, waiting for the next scan
    Reading = 2,
    /// a scan was received and is being delivered
    Read = 3,
    /// the read session failed
    Error = 4,
    /// scanner released, bridge unusable
    Destroyed = 5,
}

impl ScannerState {
    /// the numeric code reported to the host
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ScannerState::None),
            1 => Some(ScannerState::Ready),
            2 => Some(ScannerState::Reading),
            3 => Some(ScannerState::Read),
            4 => Some(ScannerState::Error),
            5 => Some(ScannerState::Destroyed),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ScannerState::None => "NONE",
            ScannerState::Ready => "READY",
            ScannerState::Reading => "READING",
            ScannerState::Read => "READ",
            ScannerState::Error => "ERROR",
            ScannerState::Destroyed => "DESTROYED",
        }
    }
}

impl Display for ScannerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

/// commands accepted from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// register the listener and claim the scanner
    Init,
    /// release the scanner and stop any read session
    Destroy,
    /// start streaming scans to the host
    Read,
    /// report the current state
    GetState,
}

impl Command {
    /// resolve the action name used by the host bridge
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "init" => Some(Command::Init),
            "destroy" => Some(Command::Destroy),
            "read" => Some(Command::Read),
            "getState" => Some(Command::GetState),
            _ => None,
        }
    }

    pub fn action(self) -> &'static str {
        match self {
            Command::Init => "init",
            Command::Destroy => "destroy",
            Command::Read => "read",
            Command::GetState => "getState",
        }
    }
}

/// a decoded scan as received from the data collection service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// decoded barcode data
    pub text: String,
    /// symbology identifier reported by the service
    pub format: String,
    /// capture timestamp as sent by the service
    pub timestamp: String,
}

impl ScanResult {
    /// interpret the vendor timestamp
    ///
    /// The service has been seen to send both RFC 3339 and `yyyy-MM-dd HH:mm:ss.SSS`
    /// style stamps, anything else yields `None`.
    pub fn captured_at(&self) -> Option<NaiveDateTime> {
        if let Ok(stamp) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(stamp.naive_local());
        }
        ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&self.timestamp, format).ok())
    }

    /// the part of the scan handed to the host
    pub fn payload(&self) -> ScanPayload {
        ScanPayload {
            text: self.text.clone(),
            format: self.format.clone(),
        }
    }
}

impl Display for ScanResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} @ {}", self.format, self.text, self.timestamp)
    }
}

/// scan delivered to the host, serialized as `{"text": .., "format": ..}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPayload {
    pub text: String,
    pub format: String,
}

/// reply to a state query, serialized as `{"state": n}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub state: u8,
}

impl From<ScannerState> for StateReport {
    fn from(state: ScannerState) -> Self {
        StateReport { state: state.code() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        for code in 0..=5 {
            let state = ScannerState::from_code(code).unwrap();
            assert_eq!(state.code(), code);
        }
        assert_eq!(ScannerState::from_code(6), None);
        assert_eq!(ScannerState::Reading.to_string(), "2 (READING)");
    }

    #[test]
    fn test_command_actions() {
        for command in [
            Command::Init,
            Command::Destroy,
            Command::Read,
            Command::GetState,
        ] {
            assert_eq!(Command::from_action(command.action()), Some(command));
        }
        assert_eq!(Command::from_action("getstate"), None);
        assert_eq!(Command::from_action("scan"), None);
    }

    #[test]
    fn test_captured_at() {
        let mut result = ScanResult {
            text: String::from("12345"),
            format: String::from("j"),
            timestamp: String::from("2024-03-01 12:30:45.123"),
        };
        let stamp = result.captured_at().unwrap();
        assert_eq!(stamp.format("%H:%M:%S").to_string(), "12:30:45");

        result.timestamp = String::from("2024-03-01T12:30:45+02:00");
        let stamp = result.captured_at().unwrap();
        assert_eq!(stamp.format("%Y-%m-%d %H").to_string(), "2024-03-01 12");

        result.timestamp = String::from("t1");
        assert!(result.captured_at().is_none());
    }

    #[test]
    fn test_payload_json() -> anyhow::Result<()> {
        let result = ScanResult {
            text: String::from("12345"),
            format: String::from("CODE128"),
            timestamp: String::from("t1"),
        };
        let json = serde_json::to_value(result.payload())?;
        assert_eq!(json, serde_json::json!({"text": "12345", "format": "CODE128"}));
        let report = serde_json::to_value(StateReport::from(ScannerState::Destroyed))?;
        assert_eq!(report, serde_json::json!({"state": 5}));
        Ok(())
    }
}

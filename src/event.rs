//! Scan notifications as broadcast by the data collection service.
//!
//! A notification carries an action name and a bag of extras. Barcode notifications
//! use the extras `version` (int), `data`, `codeId` and `timestamp` (strings).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Result, ScanResult, ScannerError};

/// a single notification delivered by the platform
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub action: String,
    pub extras: Map<String, Value>,
}

#[derive(Deserialize)]
struct BarcodeExtras {
    data: String,
    #[serde(rename = "codeId")]
    code_id: String,
    timestamp: String,
}

impl ScanEvent {
    /// an empty notification for `action`
    pub fn new(action: impl Into<String>) -> Self {
        ScanEvent {
            action: action.into(),
            extras: Map::new(),
        }
    }

    /// a well formed, version 1 barcode notification
    pub fn barcode(
        action: impl Into<String>,
        data: impl Into<String>,
        code_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        ScanEvent::new(action)
            .with_extra("version", 1)
            .with_extra("data", data.into())
            .with_extra("codeId", code_id.into())
            .with_extra("timestamp", timestamp.into())
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// payload version, missing or non integer values count as 0
    pub fn version(&self) -> i64 {
        self.extras
            .get("version")
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// extract the barcode fields
    pub fn decode(&self) -> Result<ScanResult> {
        let extras: BarcodeExtras = serde_json::from_value(Value::Object(self.extras.clone()))
            .map_err(ScannerError::MalformedEventPayload)?;
        Ok(ScanResult {
            text: extras.data,
            format: extras.code_id,
            timestamp: extras.timestamp,
        })
    }
}

//! Requests sent to the data collection service.
//!
//! Both requests are one-way broadcasts: the service never acknowledges them, so a
//! failed claim only shows up as scans never arriving.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::ScannerConfig;

pub const ACTION_CLAIM_SCANNER: &str = "com.honeywell.aidc.action.ACTION_CLAIM_SCANNER";
pub const ACTION_RELEASE_SCANNER: &str = "com.honeywell.aidc.action.ACTION_RELEASE_SCANNER";

pub const EXTRA_SCANNER: &str = "com.honeywell.aidc.extra.EXTRA_SCANNER";
pub const EXTRA_PROFILE: &str = "com.honeywell.aidc.extra.EXTRA_PROFILE";
pub const EXTRA_PROPERTIES: &str = "com.honeywell.aidc.extra.EXTRA_PROPERTIES";

/// property overrides applied until the next claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimProperties {
    /// deliver decoded data as a broadcast
    #[serde(rename = "DPR_DATA_INTENT")]
    pub data_intent: bool,
    /// action of the data broadcast
    #[serde(rename = "DPR_DATA_INTENT_ACTION")]
    pub data_intent_action: String,
    #[serde(rename = "TRIGGER_MODE", skip_serializing_if = "Option::is_none")]
    pub trigger_mode: Option<String>,
}

/// exclusive claim on a scanner unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub action: &'static str,
    /// explicit target of the broadcast
    pub package: String,
    pub scanner: String,
    pub profile: String,
    pub properties: ClaimProperties,
}

impl ClaimRequest {
    pub fn new(config: &ScannerConfig) -> Self {
        ClaimRequest {
            action: ACTION_CLAIM_SCANNER,
            package: config.service_package.clone(),
            scanner: String::from(config.scanner.selector()),
            profile: config.profile.clone(),
            properties: ClaimProperties {
                data_intent: true,
                data_intent_action: config.event_id.clone(),
                trigger_mode: config.trigger_mode.map(|mode| String::from(mode.value())),
            },
        }
    }

    /// the request as a flat extras map, the way it goes over the wire
    pub fn extras(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let mut extras = serde_json::Map::new();
        extras.insert(EXTRA_SCANNER.into(), self.scanner.clone().into());
        extras.insert(EXTRA_PROFILE.into(), self.profile.clone().into());
        extras.insert(
            EXTRA_PROPERTIES.into(),
            serde_json::to_value(&self.properties)?,
        );
        Ok(extras)
    }
}

/// release of a previous claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub action: &'static str,
    pub package: String,
}

impl ReleaseRequest {
    pub fn new(config: &ScannerConfig) -> Self {
        ReleaseRequest {
            action: ACTION_RELEASE_SCANNER,
            package: config.service_package.clone(),
        }
    }
}

/// transport for requests to the data collection service
///
/// Implementations send and return, they must not wait for the service.
pub trait ScannerGateway: Send + Sync {
    fn claim(&self, request: &ClaimRequest) -> Result<()>;

    fn release(&self, request: &ReleaseRequest) -> Result<()>;
}

/// gateway that only logs the requests, for hosts without a scanner service
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingGateway;

impl ScannerGateway for TracingGateway {
    fn claim(&self, request: &ClaimRequest) -> Result<()> {
        info!(
            "claim {} profile {} via {}",
            request.scanner, request.profile, request.package
        );
        debug!("claim extras {}", serde_json::Value::Object(request.extras()?));
        Ok(())
    }

    fn release(&self, request: &ReleaseRequest) -> Result<()> {
        info!("release scanner via {}", request.package);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ACTION_BARCODE_DATA;
    use crate::config::{ScannerUnit, TriggerMode};

    #[test]
    fn test_claim_defaults() -> Result<()> {
        let request = ClaimRequest::new(&ScannerConfig::default());
        assert_eq!(request.action, ACTION_CLAIM_SCANNER);
        assert_eq!(request.package, "com.intermec.datacollectionservice");
        let extras = request.extras()?;
        assert_eq!(extras[EXTRA_SCANNER], "dcs.scanner.imager");
        assert_eq!(extras[EXTRA_PROFILE], "DEFAULT");
        assert_eq!(
            extras[EXTRA_PROPERTIES],
            serde_json::json!({
                "DPR_DATA_INTENT": true,
                "DPR_DATA_INTENT_ACTION": ACTION_BARCODE_DATA,
            })
        );
        Ok(())
    }

    #[test]
    fn test_claim_continuous_ring() -> Result<()> {
        let config = ScannerConfig::default()
            .with_scanner(ScannerUnit::Ring)
            .with_trigger_mode(TriggerMode::Continuous)
            .with_profile("Warehouse");
        let extras = ClaimRequest::new(&config).extras()?;
        assert_eq!(extras[EXTRA_SCANNER], "dcs.scanner.ring");
        assert_eq!(extras[EXTRA_PROFILE], "Warehouse");
        assert_eq!(extras[EXTRA_PROPERTIES]["TRIGGER_MODE"], "continuous");
        Ok(())
    }

    #[test]
    fn test_release() {
        let request = ReleaseRequest::new(&ScannerConfig::default());
        assert_eq!(request.action, ACTION_RELEASE_SCANNER);
        assert_eq!(request.package, "com.intermec.datacollectionservice");
    }
}

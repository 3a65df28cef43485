//! Detection signals
//!
//! The five device/location booleans the risk engine scores. Callers may
//! fill them directly from their own detectors, or derive them from the
//! reported device metadata with [`SignalCollector`].

use geoguard_core::{Coordinate, DeviceMetadata, GeoGuardError, Result};
use serde::{Deserialize, Serialize};

use crate::config::SpoofingDetectionConfig;
use crate::risk::RiskSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DetectionSignals {
    pub mock_location_detected: bool,
    pub fake_gps_app_detected: bool,
    pub developer_mode_detected: bool,
    pub coordinate_anomaly_detected: bool,
    pub device_integrity_failed: bool,
}

impl DetectionSignals {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_raised(&self, signal: RiskSignal) -> bool {
        match signal {
            RiskSignal::MockLocation => self.mock_location_detected,
            RiskSignal::FakeGpsApp => self.fake_gps_app_detected,
            RiskSignal::DeveloperMode => self.developer_mode_detected,
            RiskSignal::CoordinateAnomaly => self.coordinate_anomaly_detected,
            RiskSignal::DeviceIntegrity => self.device_integrity_failed,
            // Comes from the travel assessment, not the device
            RiskSignal::ImpossibleTravel => false,
        }
    }

    /// Copy with one signal raised
    pub fn raise(mut self, signal: RiskSignal) -> Self {
        match signal {
            RiskSignal::MockLocation => self.mock_location_detected = true,
            RiskSignal::FakeGpsApp => self.fake_gps_app_detected = true,
            RiskSignal::DeveloperMode => self.developer_mode_detected = true,
            RiskSignal::CoordinateAnomaly => self.coordinate_anomaly_detected = true,
            RiskSignal::DeviceIntegrity => self.device_integrity_failed = true,
            RiskSignal::ImpossibleTravel => {}
        }
        self
    }

    pub fn raised(&self) -> Vec<RiskSignal> {
        RiskSignal::all()
            .into_iter()
            .filter(|s| self.is_raised(*s))
            .collect()
    }
}

/// Outcome of a client-side integrity attestation, as reported by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntegrityReport {
    Passed,
    Failed,
    /// The attestation could not be obtained at all
    Unavailable { reason: String },
}

/// Derives signals from reported device state and the active config
#[derive(Debug, Clone, Copy)]
pub struct SignalCollector<'a> {
    config: &'a SpoofingDetectionConfig,
}

impl<'a> SignalCollector<'a> {
    pub fn new(config: &'a SpoofingDetectionConfig) -> Self {
        Self { config }
    }

    /// Build the signal set for one attempt.
    ///
    /// An unavailable integrity report is a collection failure, which the
    /// caller must treat as blocked.
    pub fn collect(
        &self,
        device: &DeviceMetadata,
        position: &Coordinate,
        accuracy_m: f64,
        integrity: &IntegrityReport,
    ) -> Result<DetectionSignals> {
        let device_integrity_failed = match integrity {
            IntegrityReport::Passed => false,
            IntegrityReport::Failed => true,
            IntegrityReport::Unavailable { reason } => {
                return Err(GeoGuardError::SignalCollectionFailure(format!(
                    "device integrity unavailable: {}",
                    reason
                )));
            }
        };

        Ok(DetectionSignals {
            mock_location_detected: device.mock_location_enabled,
            fake_gps_app_detected: self.has_fake_gps_app(device),
            developer_mode_detected: device.developer_mode_enabled,
            coordinate_anomaly_detected: self.is_coordinate_anomaly(position, accuracy_m),
            device_integrity_failed,
        })
    }

    fn has_fake_gps_app(&self, device: &DeviceMetadata) -> bool {
        let known = &self.config.known_fake_gps_apps;
        if known.is_empty() {
            return !device.fake_gps_apps.is_empty();
        }
        device
            .fake_gps_apps
            .iter()
            .any(|app| known.iter().any(|k| k.eq_ignore_ascii_case(app.trim())))
    }

    /// Accuracy outside the configured bounds, or a fix at exactly (0, 0)
    fn is_coordinate_anomaly(&self, position: &Coordinate, accuracy_m: f64) -> bool {
        position.is_null_island() || !self.config.gps_accuracy.contains(accuracy_m)
    }
}

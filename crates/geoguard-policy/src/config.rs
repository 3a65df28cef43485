//! Spoofing detection configuration
//!
//! One named, versioned bundle of thresholds, weights, toggles and
//! whitelists. Configs are validated when loaded, never at use time.

use geoguard_core::{GeoGuardError, Result};
use serde::{Deserialize, Serialize};

use crate::action::AutoActionPolicy;
use crate::device::DevicePolicy;
use crate::risk::{RiskSignal, RiskThresholds};
use crate::whitelist::Whitelist;

/// Impossible-travel thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelThresholds {
    pub max_travel_speed_kmh: f64,
    /// Windows shorter than this are reported as short, still evaluated
    pub min_time_diff_seconds: u64,
    /// Expected travel scale; reported, never used as a gate
    pub max_distance_km: f64,
    /// Moves shorter than this are GPS jitter and never impossible
    #[serde(default = "default_jitter_floor_km")]
    pub jitter_floor_km: f64,
}

fn default_jitter_floor_km() -> f64 {
    0.1
}

impl Default for TravelThresholds {
    fn default() -> Self {
        Self {
            max_travel_speed_kmh: 120.0,
            min_time_diff_seconds: 300,
            max_distance_km: 50.0,
            jitter_floor_km: default_jitter_floor_km(),
        }
    }
}

/// Plausible range for the reported GPS accuracy radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyBounds {
    pub min_accuracy_m: f64,
    pub max_accuracy_m: f64,
}

impl Default for AccuracyBounds {
    fn default() -> Self {
        Self {
            min_accuracy_m: 1.0,
            max_accuracy_m: 100.0,
        }
    }
}

impl AccuracyBounds {
    pub fn contains(&self, accuracy_m: f64) -> bool {
        (self.min_accuracy_m..=self.max_accuracy_m).contains(&accuracy_m)
    }
}

/// Score added by each signal, 0-100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub mock_location_weight: u32,
    pub fake_gps_app_weight: u32,
    pub developer_mode_weight: u32,
    pub impossible_travel_weight: u32,
    pub coordinate_anomaly_weight: u32,
    pub device_integrity_weight: u32,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            mock_location_weight: 40,
            fake_gps_app_weight: 35,
            developer_mode_weight: 15,
            impossible_travel_weight: 50,
            coordinate_anomaly_weight: 25,
            device_integrity_weight: 30,
        }
    }
}

impl RiskWeights {
    pub fn weight_for(&self, signal: RiskSignal) -> u32 {
        match signal {
            RiskSignal::MockLocation => self.mock_location_weight,
            RiskSignal::FakeGpsApp => self.fake_gps_app_weight,
            RiskSignal::DeveloperMode => self.developer_mode_weight,
            RiskSignal::ImpossibleTravel => self.impossible_travel_weight,
            RiskSignal::CoordinateAnomaly => self.coordinate_anomaly_weight,
            RiskSignal::DeviceIntegrity => self.device_integrity_weight,
        }
    }
}

/// Per-signal feature switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionToggles {
    pub enable_mock_location_detection: bool,
    pub enable_fake_gps_detection: bool,
    pub enable_developer_mode_detection: bool,
    pub enable_impossible_travel_detection: bool,
    pub enable_coordinate_anomaly_detection: bool,
    pub enable_device_integrity_check: bool,
}

impl Default for DetectionToggles {
    fn default() -> Self {
        Self {
            enable_mock_location_detection: true,
            enable_fake_gps_detection: true,
            enable_developer_mode_detection: true,
            enable_impossible_travel_detection: true,
            enable_coordinate_anomaly_detection: true,
            enable_device_integrity_check: true,
        }
    }
}

impl DetectionToggles {
    pub fn is_enabled(&self, signal: RiskSignal) -> bool {
        match signal {
            RiskSignal::MockLocation => self.enable_mock_location_detection,
            RiskSignal::FakeGpsApp => self.enable_fake_gps_detection,
            RiskSignal::DeveloperMode => self.enable_developer_mode_detection,
            RiskSignal::ImpossibleTravel => self.enable_impossible_travel_detection,
            RiskSignal::CoordinateAnomaly => self.enable_coordinate_anomaly_detection,
            RiskSignal::DeviceIntegrity => self.enable_device_integrity_check,
        }
    }
}

/// A complete detection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoofingDetectionConfig {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub travel: TravelThresholds,
    #[serde(default)]
    pub gps_accuracy: AccuracyBounds,
    #[serde(default)]
    pub weights: RiskWeights,
    #[serde(default)]
    pub thresholds: RiskThresholds,
    #[serde(default)]
    pub auto_actions: AutoActionPolicy,
    #[serde(default)]
    pub detection: DetectionToggles,
    #[serde(default)]
    pub whitelist: Whitelist,
    /// Package names counted as fake-GPS apps; empty means any reported app
    #[serde(default)]
    pub known_fake_gps_apps: Vec<String>,
    #[serde(default)]
    pub device_policy: DevicePolicy,
    #[serde(default = "default_retention_days")]
    pub data_retention_days: u32,
}

fn default_retention_days() -> u32 {
    90
}

impl SpoofingDetectionConfig {
    /// Balanced profile for day-to-day clinic operation
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            version: "1.0".to_string(),
            description: Some("Balanced GPS spoofing detection".to_string()),
            is_active: false,
            travel: TravelThresholds::default(),
            gps_accuracy: AccuracyBounds::default(),
            weights: RiskWeights::default(),
            thresholds: RiskThresholds::default(),
            auto_actions: AutoActionPolicy::default(),
            detection: DetectionToggles::default(),
            whitelist: Whitelist::default(),
            known_fake_gps_apps: vec![
                "com.lexa.fakegps".to_string(),
                "com.incorporateapps.fakegps.fre".to_string(),
                "com.blogspot.newapphorizons.fakegps".to_string(),
                "com.theappninjas.gpsjoystick".to_string(),
                "com.rosteam.gpsemulator".to_string(),
            ],
            device_policy: DevicePolicy::default(),
            data_retention_days: default_retention_days(),
        }
    }

    /// Tighter profile: lower cut points, warnings on low risk, registered devices only
    pub fn strict() -> Self {
        Self {
            name: "strict".to_string(),
            description: Some("Strict GPS spoofing detection".to_string()),
            travel: TravelThresholds {
                max_travel_speed_kmh: 80.0,
                ..TravelThresholds::default()
            },
            gps_accuracy: AccuracyBounds {
                min_accuracy_m: 1.0,
                max_accuracy_m: 50.0,
            },
            thresholds: RiskThresholds {
                low: 15,
                medium: 30,
                high: 60,
                critical: 80,
            },
            auto_actions: AutoActionPolicy {
                auto_warning_low_risk: true,
                ..AutoActionPolicy::default()
            },
            device_policy: DevicePolicy {
                max_devices_per_user: 1,
                require_device_registration: true,
                auto_register_first_device: true,
            },
            ..Self::standard()
        }
    }

    /// Get a preset by name
    pub fn for_profile(profile: &str) -> Option<Self> {
        match profile {
            "standard" => Some(Self::standard()),
            "strict" => Some(Self::strict()),
            _ => None,
        }
    }

    pub fn activated(mut self) -> Self {
        self.is_active = true;
        self
    }

    /// Full load-time validation
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("config name must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(invalid("config version must not be empty"));
        }

        let travel = &self.travel;
        if !travel.max_travel_speed_kmh.is_finite() || travel.max_travel_speed_kmh <= 0.0 {
            return Err(invalid("max_travel_speed_kmh must be positive"));
        }
        if !travel.max_distance_km.is_finite() || travel.max_distance_km <= 0.0 {
            return Err(invalid("max_distance_km must be positive"));
        }
        if !travel.jitter_floor_km.is_finite() || travel.jitter_floor_km < 0.0 {
            return Err(invalid("jitter_floor_km must not be negative"));
        }

        let accuracy = &self.gps_accuracy;
        if !accuracy.min_accuracy_m.is_finite()
            || !accuracy.max_accuracy_m.is_finite()
            || accuracy.min_accuracy_m < 0.0
            || accuracy.min_accuracy_m > accuracy.max_accuracy_m
        {
            return Err(invalid(format!(
                "gps accuracy bounds {}..{} are not a valid range",
                accuracy.min_accuracy_m, accuracy.max_accuracy_m
            )));
        }

        for signal in RiskSignal::all() {
            let weight = self.weights.weight_for(signal);
            if weight > 100 {
                return Err(invalid(format!("{} weight {} exceeds 100", signal, weight)));
            }
        }

        self.thresholds.validate()?;
        self.whitelist.validate()?;

        if self.device_policy.max_devices_per_user == 0 {
            return Err(invalid("max_devices_per_user must be at least 1"));
        }
        Ok(())
    }

    /// Stable identity of the tuning values, `blake3:<hex>`.
    ///
    /// The active flag is left out so activating a config keeps its
    /// fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut canonical = self.clone();
        canonical.is_active = false;
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        format!("blake3:{}", blake3::hash(&bytes))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| GeoGuardError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GeoGuardError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| GeoGuardError::SerializeError(e.to_string()))
    }

    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl Default for SpoofingDetectionConfig {
    fn default() -> Self {
        Self::standard()
    }
}

fn invalid(message: impl Into<String>) -> GeoGuardError {
    GeoGuardError::InvalidConfig(message.into())
}

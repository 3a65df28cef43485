//! Risk scoring primitives
//!
//! Levels, the threshold table that maps a score to a level, and the
//! per-signal factors that make up a score.

use geoguard_core::{GeoGuardError, Result};
use serde::{Deserialize, Serialize};

/// Risk level of an attendance attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Critical = 3,
}

impl RiskLevel {
    /// Levels whose attempts should reach a human reviewer
    pub fn requires_review(&self) -> bool {
        matches!(self, RiskLevel::Medium | RiskLevel::High | RiskLevel::Critical)
    }

    pub fn all() -> [RiskLevel; 4] {
        [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High, RiskLevel::Critical]
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
            RiskLevel::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Ascending cut points mapping a 0-100 score to a level.
///
/// Each band's lower bound is inclusive. The low band also catches every
/// score below `low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    #[serde(rename = "low_risk_threshold")]
    pub low: u32,
    #[serde(rename = "medium_risk_threshold")]
    pub medium: u32,
    #[serde(rename = "high_risk_threshold")]
    pub high: u32,
    #[serde(rename = "critical_risk_threshold")]
    pub critical: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            low: 20,
            medium: 40,
            high: 70,
            critical: 85,
        }
    }
}

impl RiskThresholds {
    /// Map a score to its level
    pub fn classify(&self, score: u32) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Cut points must be strictly increasing and within 0-100
    pub fn validate(&self) -> Result<()> {
        if !(self.low < self.medium && self.medium < self.high && self.high < self.critical) {
            return Err(GeoGuardError::InvalidConfig(format!(
                "risk thresholds must be strictly increasing, got {}/{}/{}/{}",
                self.low, self.medium, self.high, self.critical
            )));
        }
        if self.critical > 100 {
            return Err(GeoGuardError::InvalidConfig(format!(
                "critical threshold {} exceeds 100",
                self.critical
            )));
        }
        Ok(())
    }
}

/// A detection signal that can contribute to the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    MockLocation,
    FakeGpsApp,
    DeveloperMode,
    ImpossibleTravel,
    CoordinateAnomaly,
    DeviceIntegrity,
}

impl RiskSignal {
    pub fn all() -> [RiskSignal; 6] {
        [
            RiskSignal::MockLocation,
            RiskSignal::FakeGpsApp,
            RiskSignal::DeveloperMode,
            RiskSignal::ImpossibleTravel,
            RiskSignal::CoordinateAnomaly,
            RiskSignal::DeviceIntegrity,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskSignal::MockLocation => "Mock location is enabled on the device",
            RiskSignal::FakeGpsApp => "A location-faking app is installed",
            RiskSignal::DeveloperMode => "Developer options are enabled",
            RiskSignal::ImpossibleTravel => "Travel speed since the previous attendance is implausible",
            RiskSignal::CoordinateAnomaly => "Reported coordinates or accuracy look fabricated",
            RiskSignal::DeviceIntegrity => "Device failed the integrity check",
        }
    }
}

impl std::fmt::Display for RiskSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            RiskSignal::MockLocation => "mock_location",
            RiskSignal::FakeGpsApp => "fake_gps_app",
            RiskSignal::DeveloperMode => "developer_mode",
            RiskSignal::ImpossibleTravel => "impossible_travel",
            RiskSignal::CoordinateAnomaly => "coordinate_anomaly",
            RiskSignal::DeviceIntegrity => "device_integrity",
        };
        write!(f, "{}", name)
    }
}

/// A signal that fired and the weight it added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub signal: RiskSignal,
    pub weight: u32,
    pub description: String,
}

impl RiskFactor {
    pub fn new(signal: RiskSignal, weight: u32) -> Self {
        Self {
            signal,
            weight,
            description: signal.description().to_string(),
        }
    }
}

/// Sum factor weights, clamped to 0-100
pub fn total_score(factors: &[RiskFactor]) -> u32 {
    factors.iter().map(|f| f.weight).sum::<u32>().min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(0), RiskLevel::Low);
        assert_eq!(t.classify(19), RiskLevel::Low);
        assert_eq!(t.classify(20), RiskLevel::Low);
        assert_eq!(t.classify(39), RiskLevel::Low);
        assert_eq!(t.classify(40), RiskLevel::Medium);
        assert_eq!(t.classify(69), RiskLevel::Medium);
        assert_eq!(t.classify(70), RiskLevel::High);
        assert_eq!(t.classify(84), RiskLevel::High);
        assert_eq!(t.classify(85), RiskLevel::Critical);
        assert_eq!(t.classify(100), RiskLevel::Critical);
    }

    #[test]
    fn test_classify_is_monotonic() {
        let t = RiskThresholds::default();
        let mut previous = RiskLevel::Low;
        for score in 0..=100 {
            let level = t.classify(score);
            assert!(level >= previous, "level dropped at score {}", score);
            previous = level;
        }
    }

    #[test]
    fn test_thresholds_must_increase() {
        let bad = RiskThresholds {
            low: 20,
            medium: 20,
            high: 70,
            critical: 85,
        };
        assert!(bad.validate().is_err());

        let too_high = RiskThresholds {
            low: 20,
            medium: 40,
            high: 70,
            critical: 101,
        };
        assert!(too_high.validate().is_err());
        assert!(RiskThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_total_score_clamps() {
        let factors = vec![
            RiskFactor::new(RiskSignal::MockLocation, 60),
            RiskFactor::new(RiskSignal::ImpossibleTravel, 60),
        ];
        assert_eq!(total_score(&factors), 100);
        assert_eq!(total_score(&[]), 0);
    }

    #[test]
    fn test_level_serialization() {
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
        assert_eq!(RiskLevel::High.to_string(), "HIGH");
    }
}

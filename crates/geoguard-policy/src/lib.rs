//! GeoGuard Policy: geofencing and GPS-spoofing risk evaluation
//!
//! Decides whether an attendance attempt happened inside a work location's
//! geofence, whether the travel since the user's previous attendance is
//! plausible, and how risky the device signals look under the active
//! detection config.
//!
//! # Architecture
//!
//! ```text
//! Attempt → GeofenceValidator ─────────────────────────────┐
//!    │                                                     ↓
//!    ├──→ SignalCollector ──→ DetectionSignals ──┐    AttendanceGate → Allow / PendingReview / Reject
//!    │                                           ↓         ↑
//!    └──→ ImpossibleTravelDetector ──→ SpoofingRiskEngine ─┘
//!                                                ↓
//!                              score → level → action (whitelist may override)
//!                                                ↓
//!                                            AuditLog
//! ```
//!
//! # Example
//!
//! ```
//! use geoguard_core::{CheckContext, Coordinate, WorkLocation};
//! use geoguard_policy::{
//!     DetectionSignals, GeofenceValidator, RiskLevel, RiskSignal, SpoofingAction,
//!     SpoofingDetectionConfig, SpoofingRiskEngine, TravelAssessment,
//! };
//!
//! let clinic = WorkLocation::new(
//!     "klinik-pusat",
//!     "Klinik Pusat Jakarta",
//!     Coordinate::new(-6.2088, 106.8456).unwrap(),
//!     100.0,
//! );
//! let position = Coordinate::new(-6.2088, 106.8460).unwrap();
//! let verdict = GeofenceValidator::new().validate(&position, 10.0, &clinic).unwrap();
//! assert!(verdict.within_zone);
//!
//! let config = SpoofingDetectionConfig::standard().activated();
//! let signals = DetectionSignals::clean().raise(RiskSignal::MockLocation);
//! let result = SpoofingRiskEngine::new()
//!     .evaluate(
//!         &CheckContext::new("dr-sari"),
//!         &signals,
//!         &TravelAssessment::none(),
//!         Some(&config),
//!     )
//!     .unwrap();
//!
//! assert_eq!(result.risk_score, 40);
//! assert_eq!(result.risk_level, RiskLevel::Medium);
//! assert_eq!(result.action_taken, SpoofingAction::Flagged);
//! ```

pub mod action;
pub mod audit;
pub mod config;
pub mod device;
pub mod engine;
pub mod gate;
pub mod geofence;
pub mod registry;
pub mod result;
pub mod risk;
pub mod signals;
pub mod travel;
pub mod whitelist;

pub use action::{AutoActionPolicy, Disposition, SpoofingAction};
pub use audit::{AuditLog, AuditStats};
pub use config::{AccuracyBounds, DetectionToggles, RiskWeights, SpoofingDetectionConfig, TravelThresholds};
pub use device::{DeviceAdmission, DevicePolicy};
pub use engine::SpoofingRiskEngine;
pub use gate::{AttendanceAttempt, AttendanceGate, AttendanceVerdict, FailurePolicy, Punctuality};
pub use geofence::{GeofenceValidator, GeofenceVerdict};
pub use registry::{ActiveConfigCache, ConfigRegistry, DEFAULT_CACHE_TTL};
pub use result::{ReviewDecision, ReviewRecord, SpoofingDetectionResult};
pub use risk::{total_score, RiskFactor, RiskLevel, RiskSignal, RiskThresholds};
pub use signals::{DetectionSignals, IntegrityReport, SignalCollector};
pub use travel::{ImpossibleTravelDetector, TravelAssessment, TravelPoint};
pub use whitelist::{TrustedLocation, Whitelist, WhitelistMatch, WhitelistedDevice, WhitelistedIp};

/// Evaluate a complete attempt with the default gate.
///
/// Shorthand for `AttendanceGate::new().check(..)`.
pub fn check_attendance(
    ctx: &geoguard_core::CheckContext,
    attempt: &AttendanceAttempt,
    locations: &[geoguard_core::WorkLocation],
    previous: Option<&geoguard_core::AttendanceEvent>,
    config: Option<&SpoofingDetectionConfig>,
) -> geoguard_core::Result<AttendanceVerdict> {
    AttendanceGate::new().check(ctx, attempt, locations, previous, config)
}

//! Attendance gate
//!
//! Runs one check-in or check-out through the geofence, the device policy
//! and the spoofing engine, and decides what the attendance workflow does
//! with it.
//!
//! Geofence and input errors are returned to the caller. Errors inside the
//! spoofing evaluation are not: they resolve to a blocked attempt unless
//! the gate runs with [`FailurePolicy::AllowDegraded`].

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use geoguard_core::{
    AttendanceEvent, AttendanceKind, CheckContext, Coordinate, DeviceMetadata, GeoGuardError,
    Result, WorkLocation,
};
use serde::{Deserialize, Serialize};

use crate::action::{Disposition, SpoofingAction};
use crate::config::SpoofingDetectionConfig;
use crate::device::DeviceAdmission;
use crate::engine::SpoofingRiskEngine;
use crate::geofence::{GeofenceValidator, GeofenceVerdict};
use crate::result::SpoofingDetectionResult;
use crate::signals::{IntegrityReport, SignalCollector};
use crate::travel::{ImpossibleTravelDetector, TravelPoint};

/// What to do when the spoofing evaluation itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Treat the attempt as blocked
    #[default]
    FailClosed,
    /// Let the attempt through and record the error
    AllowDegraded,
}

/// One check-in or check-out as reported by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceAttempt {
    pub kind: AttendanceKind,
    pub timestamp: DateTime<Utc>,
    pub position: Coordinate,
    pub accuracy_m: f64,
    #[serde(default)]
    pub device: DeviceMetadata,
    #[serde(default = "default_integrity")]
    pub integrity: IntegrityReport,
    /// Target site; when absent the nearest active site is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Devices already registered to the user
    #[serde(default)]
    pub registered_devices: Vec<String>,
    /// Offset of the site's local time from UTC, for shift punctuality
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_integrity() -> IntegrityReport {
    IntegrityReport::Passed
}

impl AttendanceAttempt {
    pub fn new(kind: AttendanceKind, position: Coordinate, accuracy_m: f64) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            position,
            accuracy_m,
            device: DeviceMetadata::default(),
            integrity: IntegrityReport::Passed,
            location_id: None,
            registered_devices: Vec::new(),
            utc_offset_minutes: 0,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_device(mut self, device: DeviceMetadata) -> Self {
        self.device = device;
        self
    }

    pub fn with_integrity(mut self, integrity: IntegrityReport) -> Self {
        self.integrity = integrity;
        self
    }

    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    pub fn with_registered_devices(mut self, devices: Vec<String>) -> Self {
        self.registered_devices = devices;
        self
    }

    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    fn local_time(&self) -> NaiveTime {
        match FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60)) {
            Some(offset) => self.timestamp.with_timezone(&offset).time(),
            None => self.timestamp.time(),
        }
    }
}

/// Shift punctuality; informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Punctuality {
    pub late_minutes: i64,
    pub early_departure: bool,
}

/// Everything decided about one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceVerdict {
    pub geofence: GeofenceVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_admission: Option<DeviceAdmission>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<SpoofingDetectionResult>,
    pub action: SpoofingAction,
    pub disposition: Disposition,
    pub reasons: Vec<String>,
    /// Set when the spoofing evaluation failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub punctuality: Option<Punctuality>,
    /// The attendance to persist; absent for rejected attempts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<AttendanceEvent>,
}

impl AttendanceVerdict {
    pub fn http_status(&self) -> u16 {
        self.disposition.http_status()
    }

    pub fn is_allowed(&self) -> bool {
        self.disposition.is_allowed()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AttendanceGate {
    validator: GeofenceValidator,
    engine: SpoofingRiskEngine,
    failure_policy: FailurePolicy,
}

impl AttendanceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Decide one attempt.
    ///
    /// `previous` is the user's last stored attendance, used for the
    /// impossible-travel check. `config` is the active detection config.
    /// A device id reported only in the attempt's device metadata counts
    /// as the context's device for admission and whitelisting.
    pub fn check(
        &self,
        ctx: &CheckContext,
        attempt: &AttendanceAttempt,
        locations: &[WorkLocation],
        previous: Option<&AttendanceEvent>,
        config: Option<&SpoofingDetectionConfig>,
    ) -> Result<AttendanceVerdict> {
        let (location, geofence) = self.locate(attempt, locations)?;
        let resolved;
        let ctx = match (&ctx.device_id, &attempt.device.device_id) {
            (None, Some(device_id)) => {
                resolved = ctx.clone().with_device(device_id.clone());
                &resolved
            }
            _ => ctx,
        };
        let mut reasons = Vec::new();
        let mut action = SpoofingAction::None;

        if !geofence.within_zone {
            reasons.push(format!(
                "{:.0} m from {}, outside the {:.0} m zone",
                geofence.distance_m, location.name, location.radius_m
            ));
        }

        let device_admission = match (ctx.device_id.as_deref(), config) {
            (Some(device_id), Some(config)) => {
                let admission = config.device_policy.admit(device_id, &attempt.registered_devices);
                if !admission.is_admitted() {
                    reasons.push(format!("device {} not admitted: {:?}", device_id, admission));
                }
                Some(admission)
            }
            _ => None,
        };

        let (mut detection, error) = match self.detect(ctx, attempt, previous, config) {
            Ok(result) => {
                action = result.action_taken;
                if action != SpoofingAction::None {
                    reasons.push(format!(
                        "spoofing risk {} ({}), action {}",
                        result.risk_level, result.risk_score, action
                    ));
                }
                (Some(result), None)
            }
            Err(err) => match self.failure_policy {
                FailurePolicy::FailClosed => {
                    tracing::warn!(user = %ctx.user_id, error = %err, "spoofing evaluation failed, blocking");
                    action = SpoofingAction::fail_closed();
                    reasons.push(format!("spoofing evaluation failed: {}", err));
                    (None, Some(err.to_string()))
                }
                FailurePolicy::AllowDegraded => {
                    tracing::warn!(user = %ctx.user_id, error = %err, "spoofing evaluation failed, degraded");
                    (None, Some(err.to_string()))
                }
            },
        };

        let mut disposition = action.disposition();
        let refused_device = device_admission.map(|a| !a.is_admitted()).unwrap_or(false);
        if !geofence.within_zone || refused_device {
            disposition = Disposition::Reject;
        }

        let punctuality = location.working_hours.as_ref().map(|hours| {
            let local = attempt.local_time();
            match attempt.kind {
                AttendanceKind::CheckIn => Punctuality {
                    late_minutes: hours.lateness_minutes(local),
                    early_departure: false,
                },
                AttendanceKind::CheckOut => Punctuality {
                    late_minutes: 0,
                    early_departure: hours.is_early_departure(local),
                },
            }
        });

        let event = disposition.is_allowed().then(|| {
            AttendanceEvent::record(
                ctx.user_id.clone(),
                attempt.kind,
                attempt.timestamp,
                attempt.position,
                attempt.accuracy_m,
                attempt.device.clone(),
                Some(location.id.clone()),
                geofence.distance_m,
                geofence.within_zone,
            )
        });
        if let (Some(detection), Some(event)) = (detection.as_mut(), event.as_ref()) {
            detection.event_id = Some(event.id);
        }

        tracing::debug!(
            user = %ctx.user_id,
            location = %location.id,
            within_zone = geofence.within_zone,
            action = %action,
            disposition = ?disposition,
            "attendance checked"
        );

        Ok(AttendanceVerdict {
            geofence,
            device_admission,
            detection,
            action,
            disposition,
            reasons,
            error,
            punctuality,
            event,
        })
    }

    fn locate<'a>(
        &self,
        attempt: &AttendanceAttempt,
        locations: &'a [WorkLocation],
    ) -> Result<(&'a WorkLocation, GeofenceVerdict)> {
        match attempt.location_id.as_deref() {
            Some(id) => {
                let location = locations
                    .iter()
                    .find(|l| l.id == id)
                    .ok_or_else(|| GeoGuardError::InvalidLocation(format!("unknown location {}", id)))?;
                let verdict = self.validator.validate(&attempt.position, attempt.accuracy_m, location)?;
                Ok((location, verdict))
            }
            None => {
                let verdict = self
                    .validator
                    .validate_any(&attempt.position, attempt.accuracy_m, locations)?
                    .ok_or_else(|| GeoGuardError::InvalidLocation("no active work location".to_string()))?;
                let location = locations
                    .iter()
                    .find(|l| l.id == verdict.location_id)
                    .ok_or_else(|| GeoGuardError::InvalidLocation(verdict.location_id.clone()))?;
                Ok((location, verdict))
            }
        }
    }

    fn detect(
        &self,
        ctx: &CheckContext,
        attempt: &AttendanceAttempt,
        previous: Option<&AttendanceEvent>,
        config: Option<&SpoofingDetectionConfig>,
    ) -> Result<SpoofingDetectionResult> {
        let config = config
            .filter(|c| c.is_active)
            .ok_or(GeoGuardError::NoActiveConfig)?;

        let signals = SignalCollector::new(config).collect(
            &attempt.device,
            &attempt.position,
            attempt.accuracy_m,
            &attempt.integrity,
        )?;
        let travel = ImpossibleTravelDetector::new(config.travel)
            .evaluate_event(previous, &TravelPoint::new(attempt.position, attempt.timestamp));

        self.engine
            .evaluate_at(ctx, &signals, &travel, Some(&attempt.position), Some(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{RiskLevel, RiskThresholds};
    use crate::whitelist::{WhitelistMatch, WhitelistedDevice};
    use chrono::TimeZone;
    use geoguard_core::{Platform, WorkingHours};

    fn clinic() -> WorkLocation {
        WorkLocation::new(
            "klinik-pusat",
            "Klinik Pusat Jakarta",
            Coordinate::new(-6.2088, 106.8456).unwrap(),
            100.0,
        )
    }

    fn config() -> SpoofingDetectionConfig {
        SpoofingDetectionConfig::standard().activated()
    }

    fn ctx() -> CheckContext {
        CheckContext::new("dr-sari")
    }

    fn inside() -> AttendanceAttempt {
        AttendanceAttempt::new(
            AttendanceKind::CheckIn,
            Coordinate::new(-6.2088, 106.8460).unwrap(),
            10.0,
        )
    }

    #[test]
    fn test_clean_check_in_allowed() {
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside(), &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(verdict.disposition, Disposition::Allow);
        assert_eq!(verdict.http_status(), 200);
        assert!(verdict.reasons.is_empty());
        let distance_m = verdict.geofence.distance_m;
        let event = verdict.event.unwrap();
        assert_eq!(event.work_location_id.as_deref(), Some("klinik-pusat"));
        assert!(event.within_zone);
        assert!((event.distance_from_zone_m - distance_m).abs() < 1e-9);
        assert!((40.0..50.0).contains(&event.distance_from_zone_m));
        assert_eq!(verdict.detection.unwrap().event_id, Some(event.id));
    }

    #[test]
    fn test_device_in_metadata_gets_whitelist_override() {
        let mut config = config();
        config.whitelist.devices.push(WhitelistedDevice {
            device_id: "qa-handset-01".to_string(),
            description: "QA handset".to_string(),
        });
        let device = DeviceMetadata::new(Platform::Android)
            .with_device_id("qa-handset-01")
            .mock_location()
            .with_fake_gps_app("com.lexa.fakegps");
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside().with_device(device), &[clinic()], None, Some(&config))
            .unwrap();

        let detection = verdict.detection.as_ref().unwrap();
        assert_eq!(detection.policy_action, SpoofingAction::Blocked);
        assert_eq!(detection.action_taken, SpoofingAction::None);
        assert_eq!(detection.device_id.as_deref(), Some("qa-handset-01"));
        assert!(matches!(detection.whitelist_match, Some(WhitelistMatch::Device { .. })));
        assert_eq!(verdict.disposition, Disposition::Allow);
    }

    #[test]
    fn test_outside_zone_rejected_even_when_clean() {
        let attempt = AttendanceAttempt::new(
            AttendanceKind::CheckIn,
            Coordinate::new(-6.2088, 106.8480).unwrap(),
            10.0,
        );
        let verdict = AttendanceGate::new()
            .check(&ctx(), &attempt, &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(verdict.action, SpoofingAction::None);
        assert_eq!(verdict.disposition, Disposition::Reject);
        assert!(verdict.event.is_none());
        assert_eq!(verdict.reasons.len(), 1);
    }

    #[test]
    fn test_medium_risk_pending_review() {
        let attempt = inside().with_device(DeviceMetadata::new(Platform::Android).mock_location());
        let verdict = AttendanceGate::new()
            .check(&ctx(), &attempt, &[clinic()], None, Some(&config()))
            .unwrap();
        let detection = verdict.detection.as_ref().unwrap();
        assert_eq!(detection.risk_level, RiskLevel::Medium);
        assert_eq!(verdict.disposition, Disposition::PendingReview);
        assert_eq!(verdict.http_status(), 202);
        assert!(verdict.event.is_some());
    }

    #[test]
    fn test_high_risk_blocked() {
        let device = DeviceMetadata::new(Platform::Android)
            .mock_location()
            .with_fake_gps_app("com.lexa.fakegps");
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside().with_device(device), &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(verdict.action, SpoofingAction::Blocked);
        assert_eq!(verdict.http_status(), 403);
        assert!(verdict.event.is_none());
    }

    #[test]
    fn test_impossible_travel_from_previous_event() {
        let now = Utc::now();
        let previous = AttendanceEvent::record(
            "dr-sari",
            AttendanceKind::CheckOut,
            now - chrono::Duration::minutes(5),
            Coordinate::new(-6.9175, 107.6191).unwrap(),
            10.0,
            DeviceMetadata::default(),
            Some("cabang-bandung".to_string()),
            0.0,
            true,
        );
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside().at(now), &[clinic()], Some(&previous), Some(&config()))
            .unwrap();
        let detection = verdict.detection.unwrap();
        assert!(detection.travel.is_impossible);
        assert_eq!(detection.risk_score, 50);
        assert_eq!(verdict.disposition, Disposition::PendingReview);
    }

    #[test]
    fn test_missing_config_fails_closed() {
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside(), &[clinic()], None, None)
            .unwrap();
        assert_eq!(verdict.action, SpoofingAction::Blocked);
        assert_eq!(verdict.disposition, Disposition::Reject);
        assert!(verdict.error.unwrap().starts_with("CONFIG/NO_ACTIVE"));
    }

    #[test]
    fn test_collection_failure_fails_closed() {
        let attempt = inside().with_integrity(IntegrityReport::Unavailable {
            reason: "attestation timeout".to_string(),
        });
        let verdict = AttendanceGate::new()
            .check(&ctx(), &attempt, &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(verdict.http_status(), 403);
        assert!(verdict.detection.is_none());
    }

    #[test]
    fn test_degraded_mode_lets_attempt_through() {
        let verdict = AttendanceGate::new()
            .with_failure_policy(FailurePolicy::AllowDegraded)
            .check(&ctx(), &inside(), &[clinic()], None, None)
            .unwrap();
        assert_eq!(verdict.disposition, Disposition::Allow);
        assert!(verdict.error.is_some());
    }

    #[test]
    fn test_invalid_config_fails_closed() {
        let mut broken = config();
        broken.thresholds = RiskThresholds {
            low: 50,
            medium: 40,
            high: 70,
            critical: 85,
        };
        let verdict = AttendanceGate::new()
            .check(&ctx(), &inside(), &[clinic()], None, Some(&broken))
            .unwrap();
        assert_eq!(verdict.disposition, Disposition::Reject);
        assert!(verdict.error.unwrap().starts_with("CONFIG/INVALID"));
    }

    #[test]
    fn test_input_errors_are_returned() {
        let gate = AttendanceGate::new();
        let unknown = inside().at_location("cabang-bogor");
        assert!(matches!(
            gate.check(&ctx(), &unknown, &[clinic()], None, Some(&config())),
            Err(GeoGuardError::InvalidLocation(_))
        ));

        let bad = AttendanceAttempt::new(
            AttendanceKind::CheckIn,
            Coordinate {
                latitude: 95.0,
                longitude: 0.0,
            },
            10.0,
        );
        assert!(matches!(
            gate.check(&ctx(), &bad, &[clinic()], None, Some(&config())),
            Err(GeoGuardError::InvalidCoordinate(_))
        ));

        assert!(matches!(
            gate.check(&ctx(), &inside(), &[], None, Some(&config())),
            Err(GeoGuardError::InvalidLocation(_))
        ));
    }

    #[test]
    fn test_device_limit_rejects() {
        let ctx = ctx().with_device("new-phone");
        let attempt = inside().with_registered_devices(vec!["old-phone".to_string()]);
        let verdict = AttendanceGate::new()
            .check(&ctx, &attempt, &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(verdict.device_admission, Some(DeviceAdmission::LimitReached));
        assert_eq!(verdict.disposition, Disposition::Reject);

        let first = AttendanceGate::new()
            .check(&ctx, &inside(), &[clinic()], None, Some(&config()))
            .unwrap();
        assert_eq!(first.device_admission, Some(DeviceAdmission::RegisterFirst));
        assert!(first.is_allowed());
    }

    #[test]
    fn test_lateness_in_site_local_time() {
        let hours = WorkingHours {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            late_tolerance_minutes: 15,
            early_departure_tolerance_minutes: 10,
        };
        let location = clinic().with_working_hours(hours);
        // 01:40 UTC is 08:40 in Jakarta (UTC+7)
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 1, 40, 0).unwrap();
        let attempt = inside().at(at).with_utc_offset_minutes(7 * 60);

        let verdict = AttendanceGate::new()
            .check(&ctx(), &attempt, &[location], None, Some(&config()))
            .unwrap();
        let punctuality = verdict.punctuality.unwrap();
        assert_eq!(punctuality.late_minutes, 25);
        assert!(!punctuality.early_departure);
    }
}

//! Data Model: WorkLocation, AttendanceEvent, DeviceMetadata
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GeoGuardError, Result};
use crate::geo::Coordinate;

/// Kind of work location a geofence protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    #[default]
    MainOffice,
    BranchOffice,
    ProjectSite,
    MobileLocation,
    ClientOffice,
}

/// Shift window and its tolerances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Minutes after `start` a check-in still counts as on time
    #[serde(default)]
    pub late_tolerance_minutes: u32,
    /// Minutes before `end` a check-out still counts as a full shift
    #[serde(default)]
    pub early_departure_tolerance_minutes: u32,
}

impl WorkingHours {
    /// Minutes past the tolerated start time; 0 when on time
    pub fn lateness_minutes(&self, at: NaiveTime) -> i64 {
        let late_by = (at - self.start).num_minutes() - i64::from(self.late_tolerance_minutes);
        late_by.max(0)
    }

    /// Whether a check-out at `at` leaves before the tolerated end time
    pub fn is_early_departure(&self, at: NaiveTime) -> bool {
        (self.end - at).num_minutes() > i64::from(self.early_departure_tolerance_minutes)
    }
}

/// A named circular geofence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLocation {
    pub id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_m: f64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Strict locations never pad the radius with GPS accuracy
    #[serde(default = "default_true")]
    pub strict_geofence: bool,
    #[serde(default)]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_hours: Option<WorkingHours>,
}

fn default_true() -> bool {
    true
}

impl WorkLocation {
    /// Create an active, strict location
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            center,
            radius_m,
            is_active: true,
            strict_geofence: true,
            location_type: LocationType::default(),
            working_hours: None,
        }
    }

    /// Allow the reported GPS accuracy to pad the radius
    pub fn lenient(mut self) -> Self {
        self.strict_geofence = false;
        self
    }

    pub fn with_type(mut self, location_type: LocationType) -> Self {
        self.location_type = location_type;
        self
    }

    pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
        self.working_hours = Some(hours);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Check the geofence definition itself
    pub fn validate(&self) -> Result<()> {
        self.center.validate().map_err(|e| {
            GeoGuardError::InvalidLocation(format!("{}: center {}", self.id, e))
        })?;
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(GeoGuardError::InvalidLocation(format!(
                "{}: radius {} must be positive",
                self.id, self.radius_m
            )));
        }
        Ok(())
    }
}

/// Client platform reporting the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Web,
    #[default]
    Unknown,
}

/// Device state as reported by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DeviceMetadata {
    #[serde(default)]
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub mock_location_enabled: bool,
    #[serde(default)]
    pub developer_mode_enabled: bool,
    /// Package names of installed location-faking apps
    #[serde(default)]
    pub fake_gps_apps: Vec<String>,
}

impl DeviceMetadata {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            ..Default::default()
        }
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn mock_location(mut self) -> Self {
        self.mock_location_enabled = true;
        self
    }

    pub fn developer_mode(mut self) -> Self {
        self.developer_mode_enabled = true;
        self
    }

    pub fn with_fake_gps_app(mut self, app: impl Into<String>) -> Self {
        self.fake_gps_apps.push(app.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceKind {
    CheckIn,
    CheckOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// One check-in or check-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: Uuid,
    pub user_id: String,
    pub kind: AttendanceKind,
    pub timestamp: DateTime<Utc>,
    pub position: Coordinate,
    pub accuracy_m: f64,
    #[serde(default)]
    pub device: DeviceMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_location_id: Option<String>,
    /// Distance from the site center, meters
    pub distance_from_zone_m: f64,
    pub within_zone: bool,
    #[serde(default)]
    pub review: ReviewStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl AttendanceEvent {
    /// Record an attempt; the geofence outcome is passed in already computed
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        user_id: impl Into<String>,
        kind: AttendanceKind,
        timestamp: DateTime<Utc>,
        position: Coordinate,
        accuracy_m: f64,
        device: DeviceMetadata,
        work_location_id: Option<String>,
        distance_from_zone_m: f64,
        within_zone: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            kind,
            timestamp,
            position,
            accuracy_m,
            device,
            work_location_id,
            distance_from_zone_m: distance_from_zone_m.max(0.0),
            within_zone,
            review: ReviewStatus::Pending,
            reviewed_by: None,
        }
    }

    pub fn approve(&mut self, reviewer: impl Into<String>) {
        self.review = ReviewStatus::Approved;
        self.reviewed_by = Some(reviewer.into());
    }

    pub fn reject(&mut self, reviewer: impl Into<String>) {
        self.review = ReviewStatus::Rejected;
        self.reviewed_by = Some(reviewer.into());
    }

    pub fn is_reviewed(&self) -> bool {
        self.review != ReviewStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clinic() -> WorkLocation {
        WorkLocation::new(
            "klinik-pusat",
            "Klinik Pusat",
            Coordinate::new(-6.2088, 106.8456).unwrap(),
            100.0,
        )
    }

    #[test]
    fn test_location_defaults_to_strict() {
        let location = clinic();
        assert!(location.strict_geofence);
        assert!(location.is_active);
        assert!(!location.clone().lenient().strict_geofence);
    }

    #[test]
    fn test_location_validation() {
        assert!(clinic().validate().is_ok());

        let mut zero = clinic();
        zero.radius_m = 0.0;
        assert!(matches!(zero.validate(), Err(GeoGuardError::InvalidLocation(_))));
    }

    #[test]
    fn test_location_json_defaults() {
        let location: WorkLocation = serde_json::from_value(serde_json::json!({
            "id": "cabang-bekasi",
            "name": "Klinik Cabang Bekasi",
            "center": { "latitude": -6.2383, "longitude": 106.9756 },
            "radius_m": 150.0
        }))
        .unwrap();
        assert!(location.strict_geofence);
        assert!(location.is_active);
        assert_eq!(location.location_type, LocationType::MainOffice);
        assert!(location.working_hours.is_none());
    }

    #[test]
    fn test_working_hours_lateness() {
        let hours = WorkingHours {
            start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            late_tolerance_minutes: 15,
            early_departure_tolerance_minutes: 10,
        };
        assert_eq!(hours.lateness_minutes(NaiveTime::from_hms_opt(8, 10, 0).unwrap()), 0);
        assert_eq!(hours.lateness_minutes(NaiveTime::from_hms_opt(8, 45, 0).unwrap()), 30);
        assert_eq!(hours.lateness_minutes(NaiveTime::from_hms_opt(7, 30, 0).unwrap()), 0);
        assert!(hours.is_early_departure(NaiveTime::from_hms_opt(15, 0, 0).unwrap()));
        assert!(!hours.is_early_departure(NaiveTime::from_hms_opt(15, 55, 0).unwrap()));
    }

    #[test]
    fn test_event_review() {
        let mut event = AttendanceEvent::record(
            "dr-sari",
            AttendanceKind::CheckIn,
            Utc::now(),
            Coordinate::new(-6.2088, 106.8460).unwrap(),
            8.0,
            DeviceMetadata::new(Platform::Android),
            Some("klinik-pusat".to_string()),
            44.0,
            true,
        );
        assert!(!event.is_reviewed());
        event.reject("admin");
        assert_eq!(event.review, ReviewStatus::Rejected);
        assert_eq!(event.reviewed_by.as_deref(), Some("admin"));
    }
}

//! GeoGuard Core: coordinates, geofences and attendance records
//!
//! Value objects shared by the validation engine and its callers, plus the
//! unified error model. Everything here is plain data and pure functions.

pub mod context;
pub mod data_model;
pub mod error;
pub mod geo;

pub use context::CheckContext;
pub use data_model::{
    AttendanceEvent, AttendanceKind, DeviceMetadata, LocationType, Platform, ReviewStatus,
    WorkLocation, WorkingHours,
};
pub use error::{GeoGuardError, Result};
pub use geo::{haversine_distance_m, validate_accuracy, Coordinate, EARTH_RADIUS_M};

/// Engine version recorded alongside detection results
pub const GEOGUARD_VERSION: &str = "1.0.0";

//! Geofence validation
//!
//! Decides whether a reported position lies inside a work location's
//! radius. Strict locations use the radius as-is; lenient ones also
//! accept positions within `radius + accuracy`.

use geoguard_core::{validate_accuracy, Coordinate, GeoGuardError, Result, WorkLocation};
use serde::{Deserialize, Serialize};

/// Outcome of a geofence check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceVerdict {
    pub location_id: String,
    /// Great-circle distance from the location center, meters
    pub distance_m: f64,
    pub within_zone: bool,
    /// Padding added to the radius; 0 for strict locations
    pub tolerance_m: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeofenceValidator;

impl GeofenceValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        position: &Coordinate,
        accuracy_m: f64,
        location: &WorkLocation,
    ) -> Result<GeofenceVerdict> {
        position.validate()?;
        validate_accuracy(accuracy_m)?;
        location.validate()?;
        if !location.is_active {
            return Err(GeoGuardError::InvalidLocation(format!(
                "{} is not active",
                location.id
            )));
        }

        let distance_m = position.distance_to(&location.center);
        let tolerance_m = if location.strict_geofence { 0.0 } else { accuracy_m };
        let within_zone = distance_m <= location.radius_m + tolerance_m;

        tracing::debug!(
            location = %location.id,
            distance_m,
            radius_m = location.radius_m,
            tolerance_m,
            within_zone,
            "geofence checked"
        );

        Ok(GeofenceVerdict {
            location_id: location.id.clone(),
            distance_m,
            within_zone,
            tolerance_m,
        })
    }

    /// Check against several sites at once.
    ///
    /// Returns the nearest active location that accepts the position, or
    /// when none does, the out-of-zone verdict for the nearest active one.
    /// `Ok(None)` means there is no active location at all.
    pub fn validate_any(
        &self,
        position: &Coordinate,
        accuracy_m: f64,
        locations: &[WorkLocation],
    ) -> Result<Option<GeofenceVerdict>> {
        let mut verdicts = Vec::new();
        for location in locations.iter().filter(|l| l.is_active) {
            verdicts.push(self.validate(position, accuracy_m, location)?);
        }

        let nearest = |a: &GeofenceVerdict, b: &GeofenceVerdict| a.distance_m.total_cmp(&b.distance_m);
        let inside = verdicts.iter().filter(|v| v.within_zone).min_by(|a, b| nearest(*a, *b));
        if let Some(verdict) = inside {
            return Ok(Some(verdict.clone()));
        }
        Ok(verdicts.into_iter().min_by(nearest))
    }
}

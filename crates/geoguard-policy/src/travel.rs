//! Impossible-travel detection
//!
//! Compares an attempt with the same user's previous attendance and
//! derives the speed needed to cover the distance between them.

use chrono::{DateTime, Utc};
use geoguard_core::{AttendanceEvent, Coordinate};
use serde::{Deserialize, Serialize};

use crate::config::TravelThresholds;

/// Where and when an attendance happened
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelPoint {
    pub position: Coordinate,
    pub timestamp: DateTime<Utc>,
}

impl TravelPoint {
    pub fn new(position: Coordinate, timestamp: DateTime<Utc>) -> Self {
        Self { position, timestamp }
    }
}

impl From<&AttendanceEvent> for TravelPoint {
    fn from(event: &AttendanceEvent) -> Self {
        Self {
            position: event.position,
            timestamp: event.timestamp,
        }
    }
}

/// Result of comparing two attendance points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelAssessment {
    /// Implied speed; infinite when both points share a timestamp but not a position
    #[serde(with = "speed_serde")]
    pub speed_kmh: f64,
    pub distance_km: f64,
    pub time_diff_seconds: f64,
    pub is_impossible: bool,
    /// The window was shorter than `min_time_diff_seconds`
    pub short_window: bool,
    /// Distance beyond the configured expected travel scale
    pub exceeds_expected_distance: bool,
    pub has_previous: bool,
}

impl TravelAssessment {
    /// Nothing to compare against
    pub fn none() -> Self {
        Self {
            speed_kmh: 0.0,
            distance_km: 0.0,
            time_diff_seconds: 0.0,
            is_impossible: false,
            short_window: false,
            exceeds_expected_distance: false,
            has_previous: false,
        }
    }
}

impl Default for TravelAssessment {
    fn default() -> Self {
        Self::none()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImpossibleTravelDetector {
    thresholds: TravelThresholds,
}

impl ImpossibleTravelDetector {
    pub fn new(thresholds: TravelThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &TravelThresholds {
        &self.thresholds
    }

    pub fn evaluate(&self, previous: Option<&TravelPoint>, current: &TravelPoint) -> TravelAssessment {
        let Some(previous) = previous else {
            return TravelAssessment::none();
        };

        // Out-of-order timestamps are compared by magnitude
        let elapsed_ms = (current.timestamp - previous.timestamp).num_milliseconds().abs();
        let time_diff_seconds = elapsed_ms as f64 / 1000.0;
        let distance_km = previous.position.distance_to(&current.position) / 1000.0;

        let speed_kmh = if time_diff_seconds == 0.0 {
            if distance_km > 0.0 {
                f64::INFINITY
            } else {
                0.0
            }
        } else {
            distance_km / (time_diff_seconds / 3600.0)
        };

        let is_impossible = speed_kmh > self.thresholds.max_travel_speed_kmh
            && distance_km >= self.thresholds.jitter_floor_km;
        let short_window = time_diff_seconds < self.thresholds.min_time_diff_seconds as f64;

        if is_impossible {
            tracing::debug!(speed_kmh, distance_km, time_diff_seconds, "impossible travel");
        }

        TravelAssessment {
            speed_kmh,
            distance_km,
            time_diff_seconds,
            is_impossible,
            short_window,
            exceeds_expected_distance: distance_km > self.thresholds.max_distance_km,
            has_previous: true,
        }
    }

    /// Same as `evaluate`, fed straight from the stored previous attendance
    pub fn evaluate_event(
        &self,
        previous: Option<&AttendanceEvent>,
        current: &TravelPoint,
    ) -> TravelAssessment {
        let previous = previous.map(TravelPoint::from);
        self.evaluate(previous.as_ref(), current)
    }
}

impl Default for ImpossibleTravelDetector {
    fn default() -> Self {
        Self::new(TravelThresholds::default())
    }
}

/// Infinite speeds are written as the string `"infinity"`
mod speed_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(speed: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if speed.is_finite() {
            serializer.serialize_f64(*speed)
        } else {
            serializer.serialize_str("infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(speed) => Ok(speed),
            Repr::Text(text) if text == "infinity" => Ok(f64::INFINITY),
            Repr::Text(text) => Err(serde::de::Error::custom(format!("invalid speed {:?}", text))),
        }
    }
}

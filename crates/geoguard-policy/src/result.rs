//! Persisted outcome of one spoofing evaluation
//!
//! Holds every intermediate value so an admin can see why an attempt was
//! scored the way it was. Only the review fields change after creation.

use chrono::{DateTime, Utc};
use geoguard_core::{AttendanceEvent, GeoGuardError, Result, ReviewStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::{Disposition, SpoofingAction};
use crate::risk::{RiskFactor, RiskLevel};
use crate::signals::DetectionSignals;
use crate::travel::TravelAssessment;
use crate::whitelist::WhitelistMatch;

/// An admin's ruling on a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    /// The attempt was legitimate; the attendance stands
    Approved,
    /// Spoofing confirmed; the attendance is void
    Rejected,
}

impl ReviewDecision {
    pub fn status(&self) -> ReviewStatus {
        match self {
            ReviewDecision::Approved => ReviewStatus::Approved,
            ReviewDecision::Rejected => ReviewStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer: String,
    pub decision: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

impl ReviewRecord {
    /// Carry the ruling over to the attendance event it concerns
    pub fn apply_to(&self, event: &mut AttendanceEvent) {
        match self.decision {
            ReviewDecision::Approved => event.approve(self.reviewer.clone()),
            ReviewDecision::Rejected => event.reject(self.reviewer.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoofingDetectionResult {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    pub trace_id: String,
    pub evaluated_at: DateTime<Utc>,

    pub config_name: String,
    pub config_version: String,
    pub config_fingerprint: String,

    pub signals: DetectionSignals,
    pub travel: TravelAssessment,
    /// Enabled signals that fired, with the weight each added
    pub factors: Vec<RiskFactor>,
    pub risk_score: u32,
    pub risk_level: RiskLevel,

    /// What the auto-action table chose for the level
    pub policy_action: SpoofingAction,
    /// What was applied; `none` when a whitelist entry matched
    pub action_taken: SpoofingAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist_match: Option<WhitelistMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trusted_location: Option<String>,

    /// Attendance event persisted for this attempt, if it was not rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewRecord>,
}

impl SpoofingDetectionResult {
    pub fn disposition(&self) -> Disposition {
        self.action_taken.disposition()
    }

    pub fn is_whitelisted(&self) -> bool {
        self.whitelist_match.is_some()
    }

    pub fn is_reviewed(&self) -> bool {
        self.review.is_some()
    }

    pub fn review_status(&self) -> ReviewStatus {
        self.review
            .as_ref()
            .map(|r| r.decision.status())
            .unwrap_or_default()
    }

    /// Record an admin review. Allowed once; the score, level and action
    /// stay as evaluated.
    pub fn review(
        &mut self,
        reviewer: impl Into<String>,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<&ReviewRecord> {
        if self.review.is_some() {
            return Err(GeoGuardError::AlreadyReviewed(self.id.to_string()));
        }
        Ok(self.review.insert(ReviewRecord {
            reviewer: reviewer.into(),
            decision,
            notes,
            reviewed_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskSignal;

    fn flagged_result() -> SpoofingDetectionResult {
        SpoofingDetectionResult {
            id: Uuid::new_v4(),
            user_id: "dr-sari".to_string(),
            device_id: Some("pixel-7".to_string()),
            trace_id: "trace-1".to_string(),
            evaluated_at: Utc::now(),
            config_name: "standard".to_string(),
            config_version: "1.0".to_string(),
            config_fingerprint: "blake3:00".to_string(),
            signals: DetectionSignals::clean().raise(RiskSignal::MockLocation),
            travel: TravelAssessment::none(),
            factors: vec![RiskFactor::new(RiskSignal::MockLocation, 40)],
            risk_score: 40,
            risk_level: RiskLevel::Medium,
            policy_action: SpoofingAction::Flagged,
            action_taken: SpoofingAction::Flagged,
            whitelist_match: None,
            trusted_location: None,
            event_id: None,
            review: None,
        }
    }

    #[test]
    fn test_review_once() {
        let mut result = flagged_result();
        assert_eq!(result.review_status(), ReviewStatus::Pending);

        let record = result
            .review("admin-budi", ReviewDecision::Approved, Some("home visit".to_string()))
            .unwrap();
        assert_eq!(record.reviewer, "admin-budi");
        assert_eq!(result.review_status(), ReviewStatus::Approved);

        let again = result.review("admin-rina", ReviewDecision::Rejected, None);
        assert!(matches!(again, Err(GeoGuardError::AlreadyReviewed(_))));
        assert_eq!(result.review.as_ref().unwrap().reviewer, "admin-budi");
    }

    #[test]
    fn test_review_keeps_evaluation() {
        let mut result = flagged_result();
        let before = (result.risk_score, result.risk_level, result.action_taken);
        result.review("admin-budi", ReviewDecision::Rejected, None).unwrap();
        assert_eq!((result.risk_score, result.risk_level, result.action_taken), before);
        assert_eq!(result.disposition(), Disposition::PendingReview);
    }

    #[test]
    fn test_review_applies_to_event() {
        let mut event = AttendanceEvent::record(
            "dr-sari",
            geoguard_core::AttendanceKind::CheckIn,
            Utc::now(),
            geoguard_core::Coordinate::new(-6.2088, 106.8460).unwrap(),
            10.0,
            geoguard_core::DeviceMetadata::default(),
            Some("klinik-pusat".to_string()),
            44.0,
            true,
        );
        let mut result = flagged_result();
        result.event_id = Some(event.id);
        let record = result
            .review("admin-budi", ReviewDecision::Rejected, None)
            .unwrap()
            .clone();
        record.apply_to(&mut event);
        assert_eq!(event.review, ReviewStatus::Rejected);
        assert_eq!(event.reviewed_by.as_deref(), Some("admin-budi"));
    }

    #[test]
    fn test_serialized_shape() {
        let result = flagged_result();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["risk_level"], "medium");
        assert_eq!(value["action_taken"], "flagged");
        assert_eq!(value["factors"][0]["signal"], "mock_location");
        assert!(value.get("review").is_none());
        assert!(value.get("event_id").is_none());
    }
}

//! Auto-actions and the dispositions they lead to
//!
//! A risk level becomes an action through the auto-action toggles of the
//! active config. The action in turn tells the attendance workflow whether
//! to accept, queue for review, or reject the attempt.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::risk::RiskLevel;

/// Action taken on an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpoofingAction {
    #[default]
    None = 0,
    Warn = 1,
    Flagged = 2,
    Blocked = 3,
}

impl SpoofingAction {
    /// The action applied when evaluation itself failed
    pub fn fail_closed() -> Self {
        SpoofingAction::Blocked
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, SpoofingAction::Blocked)
    }

    pub fn disposition(&self) -> Disposition {
        match self {
            SpoofingAction::None | SpoofingAction::Warn => Disposition::Allow,
            SpoofingAction::Flagged => Disposition::PendingReview,
            SpoofingAction::Blocked => Disposition::Reject,
        }
    }
}

impl fmt::Display for SpoofingAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpoofingAction::None => write!(f, "none"),
            SpoofingAction::Warn => write!(f, "warn"),
            SpoofingAction::Flagged => write!(f, "flagged"),
            SpoofingAction::Blocked => write!(f, "blocked"),
        }
    }
}

/// What the attendance workflow does with the attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Persist the check-in
    Allow,
    /// Persist it but hold it for an admin
    PendingReview,
    /// Refuse the check-in
    Reject,
}

impl Disposition {
    /// HTTP-equivalent status for transports that want one
    pub fn http_status(&self) -> u16 {
        match self {
            Disposition::Allow => 200,
            Disposition::PendingReview => 202,
            Disposition::Reject => 403,
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Disposition::Reject)
    }
}

/// Auto-action toggles, one per level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoActionPolicy {
    pub auto_block_critical: bool,
    pub auto_block_high_risk: bool,
    pub auto_flag_medium_risk: bool,
    pub auto_warning_low_risk: bool,
}

impl Default for AutoActionPolicy {
    fn default() -> Self {
        Self {
            auto_block_critical: true,
            auto_block_high_risk: true,
            auto_flag_medium_risk: true,
            auto_warning_low_risk: false,
        }
    }
}

impl AutoActionPolicy {
    /// Action for a level.
    ///
    /// Rules are checked critical → high → medium → low and a rule only
    /// matches its own level: a disabled toggle on one level never falls
    /// through to the rule of a lower level.
    pub fn action_for(&self, level: RiskLevel) -> SpoofingAction {
        let table = [
            (RiskLevel::Critical, self.auto_block_critical, SpoofingAction::Blocked),
            (RiskLevel::High, self.auto_block_high_risk, SpoofingAction::Blocked),
            (RiskLevel::Medium, self.auto_flag_medium_risk, SpoofingAction::Flagged),
            (RiskLevel::Low, self.auto_warning_low_risk, SpoofingAction::Warn),
        ];

        table
            .iter()
            .find(|(rule_level, enabled, _)| *rule_level == level && *enabled)
            .map(|(_, _, action)| *action)
            .unwrap_or(SpoofingAction::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_by_level() {
        let policy = AutoActionPolicy {
            auto_block_critical: true,
            auto_block_high_risk: true,
            auto_flag_medium_risk: true,
            auto_warning_low_risk: true,
        };
        assert_eq!(policy.action_for(RiskLevel::Critical), SpoofingAction::Blocked);
        assert_eq!(policy.action_for(RiskLevel::High), SpoofingAction::Blocked);
        assert_eq!(policy.action_for(RiskLevel::Medium), SpoofingAction::Flagged);
        assert_eq!(policy.action_for(RiskLevel::Low), SpoofingAction::Warn);
    }

    #[test]
    fn test_disabled_high_does_not_fall_through_to_medium() {
        let policy = AutoActionPolicy {
            auto_block_critical: true,
            auto_block_high_risk: false,
            auto_flag_medium_risk: true,
            auto_warning_low_risk: true,
        };
        assert_eq!(policy.action_for(RiskLevel::High), SpoofingAction::None);
    }

    #[test]
    fn test_all_toggles_off() {
        let policy = AutoActionPolicy {
            auto_block_critical: false,
            auto_block_high_risk: false,
            auto_flag_medium_risk: false,
            auto_warning_low_risk: false,
        };
        for level in RiskLevel::all() {
            assert_eq!(policy.action_for(level), SpoofingAction::None);
        }
    }

    #[test]
    fn test_disposition_status() {
        assert_eq!(SpoofingAction::None.disposition().http_status(), 200);
        assert_eq!(SpoofingAction::Warn.disposition().http_status(), 200);
        assert_eq!(SpoofingAction::Flagged.disposition().http_status(), 202);
        assert_eq!(SpoofingAction::Blocked.disposition().http_status(), 403);
        assert!(SpoofingAction::fail_closed().is_blocked());
    }

    #[test]
    fn test_action_serialization() {
        let json = serde_json::to_string(&SpoofingAction::Flagged).unwrap();
        assert_eq!(json, "\"flagged\"");
        let parsed: SpoofingAction = serde_json::from_str("\"blocked\"").unwrap();
        assert!(parsed.is_blocked());
    }
}

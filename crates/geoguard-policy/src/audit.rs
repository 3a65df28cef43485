//! Audit trail of spoofing detections
//!
//! Keeps the most recent detection results in memory for admin review,
//! statistics and export. Entries older than the retention window are
//! pruned on request.

use chrono::{DateTime, Duration, Utc};
use geoguard_core::{GeoGuardError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::SpoofingAction;
use crate::result::{ReviewDecision, ReviewRecord, SpoofingDetectionResult};
use crate::risk::RiskLevel;

/// Audit log collector
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: Vec<SpoofingDetectionResult>,
    max_entries: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(10_000)
    }

    pub fn with_max_entries(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max,
        }
    }

    pub fn log(&mut self, result: SpoofingDetectionResult) -> Uuid {
        let id = result.id;
        self.entries.push(result);

        // Trim if over limit
        if self.entries.len() > self.max_entries {
            let drain_count = self.entries.len() - self.max_entries;
            self.entries.drain(0..drain_count);
        }
        id
    }

    pub fn entries(&self) -> &[SpoofingDetectionResult] {
        &self.entries
    }

    pub fn get(&self, id: Uuid) -> Option<&SpoofingDetectionResult> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entries_since(&self, at: DateTime<Utc>) -> Vec<&SpoofingDetectionResult> {
        self.entries.iter().filter(|e| e.evaluated_at >= at).collect()
    }

    pub fn entries_for_user(&self, user_id: &str) -> Vec<&SpoofingDetectionResult> {
        self.entries.iter().filter(|e| e.user_id == user_id).collect()
    }

    pub fn blocked_entries(&self) -> Vec<&SpoofingDetectionResult> {
        self.entries
            .iter()
            .filter(|e| e.action_taken.is_blocked())
            .collect()
    }

    /// Detections an admin still has to look at
    pub fn pending_review(&self) -> Vec<&SpoofingDetectionResult> {
        self.entries
            .iter()
            .filter(|e| !e.is_reviewed())
            .filter(|e| e.action_taken >= SpoofingAction::Flagged || e.risk_level.requires_review())
            .collect()
    }

    /// Review a logged detection by id
    pub fn review(
        &mut self,
        id: Uuid,
        reviewer: impl Into<String>,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<ReviewRecord> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| GeoGuardError::DetectionNotFound(id.to_string()))?;
        let record = entry.review(reviewer, decision, notes)?.clone();
        tracing::info!(
            detection = %id,
            reviewer = %record.reviewer,
            decision = ?record.decision,
            "detection reviewed"
        );
        Ok(record)
    }

    /// Drop entries older than `retention_days`; returns how many went
    pub fn prune_older_than(&mut self, retention_days: u32, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(i64::from(retention_days));
        let before = self.entries.len();
        self.entries.retain(|e| e.evaluated_at >= cutoff);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            tracing::debug!(pruned, retention_days, "audit entries pruned");
        }
        pruned
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Export to JSON Lines
    pub fn to_jsonl(&self) -> Result<String> {
        let lines = self
            .entries
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    pub fn stats(&self) -> AuditStats {
        let total = self.entries.len();
        let count = |action: SpoofingAction| {
            self.entries
                .iter()
                .filter(|e| e.action_taken == action)
                .count()
        };
        let blocked = count(SpoofingAction::Blocked);
        let flagged = count(SpoofingAction::Flagged);
        let warned = count(SpoofingAction::Warn);
        let whitelisted = self.entries.iter().filter(|e| e.is_whitelisted()).count();
        let high_risk = self
            .entries
            .iter()
            .filter(|e| e.risk_level >= RiskLevel::High)
            .count();
        let reviewed = self.entries.iter().filter(|e| e.is_reviewed()).count();
        let rate = |n: usize| if total > 0 { n as f64 / total as f64 } else { 0.0 };

        AuditStats {
            total,
            allowed: total - blocked - flagged,
            warned,
            flagged,
            blocked,
            whitelisted,
            high_risk,
            reviewed,
            block_rate: rate(blocked),
            flag_rate: rate(flagged),
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about audit entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditStats {
    pub total: usize,
    /// Passed through, warnings included
    pub allowed: usize,
    pub warned: usize,
    pub flagged: usize,
    pub blocked: usize,
    pub whitelisted: usize,
    pub high_risk: usize,
    pub reviewed: usize,
    pub block_rate: f64,
    pub flag_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpoofingDetectionConfig;
    use crate::engine::SpoofingRiskEngine;
    use crate::risk::RiskSignal;
    use crate::signals::DetectionSignals;
    use crate::travel::TravelAssessment;
    use geoguard_core::CheckContext;

    fn evaluate(user: &str, signals: DetectionSignals) -> SpoofingDetectionResult {
        let config = SpoofingDetectionConfig::standard().activated();
        SpoofingRiskEngine::new()
            .evaluate(
                &CheckContext::new(user),
                &signals,
                &TravelAssessment::none(),
                Some(&config),
            )
            .unwrap()
    }

    fn blocked() -> DetectionSignals {
        DetectionSignals::clean()
            .raise(RiskSignal::MockLocation)
            .raise(RiskSignal::FakeGpsApp)
    }

    #[test]
    fn test_audit_log() {
        let mut log = AuditLog::new();
        let id = log.log(evaluate("dr-sari", DetectionSignals::clean()));
        assert_eq!(log.len(), 1);
        assert!(log.get(id).is_some());
    }

    #[test]
    fn test_audit_stats() {
        let mut log = AuditLog::new();
        log.log(evaluate("dr-sari", DetectionSignals::clean()));
        log.log(evaluate("dr-sari", blocked()));
        log.log(evaluate("ns-dewi", DetectionSignals::clean().raise(RiskSignal::MockLocation)));

        let stats = log.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.high_risk, 1);
        assert!((stats.block_rate - 1.0 / 3.0).abs() < 1e-9);

        assert_eq!(log.entries_for_user("dr-sari").len(), 2);
        assert_eq!(log.blocked_entries().len(), 1);
        assert_eq!(log.pending_review().len(), 2);
    }

    #[test]
    fn test_review_through_log() {
        let mut log = AuditLog::new();
        let id = log.log(evaluate("dr-sari", blocked()));
        log.review(id, "admin-budi", ReviewDecision::Rejected, None).unwrap();
        assert!(log.get(id).unwrap().is_reviewed());
        assert!(log.pending_review().is_empty());
        assert_eq!(log.stats().reviewed, 1);

        let again = log.review(id, "admin-budi", ReviewDecision::Approved, None);
        assert!(matches!(again, Err(GeoGuardError::AlreadyReviewed(_))));
        let missing = log.review(Uuid::new_v4(), "admin-budi", ReviewDecision::Approved, None);
        assert!(matches!(missing, Err(GeoGuardError::DetectionNotFound(_))));
    }

    #[test]
    fn test_audit_max_entries() {
        let mut log = AuditLog::with_max_entries(5);
        for _ in 0..10 {
            log.log(evaluate("dr-sari", DetectionSignals::clean()));
        }
        assert_eq!(log.len(), 5);
    }

    #[test]
    fn test_prune_by_retention() {
        let mut log = AuditLog::new();
        let mut old = evaluate("dr-sari", DetectionSignals::clean());
        old.evaluated_at = Utc::now() - Duration::days(120);
        log.log(old);
        log.log(evaluate("dr-sari", DetectionSignals::clean()));

        assert_eq!(log.prune_older_than(90, Utc::now()), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_entries_since() {
        let mut log = AuditLog::new();
        let mut old = evaluate("dr-sari", DetectionSignals::clean());
        old.evaluated_at = Utc::now() - Duration::days(3);
        log.log(old);
        log.log(evaluate("dr-sari", blocked()));

        let recent = log.entries_since(Utc::now() - Duration::days(1));
        assert_eq!(recent.len(), 1);
        assert!(recent[0].action_taken.is_blocked());
    }

    #[test]
    fn test_export() {
        let mut log = AuditLog::new();
        log.log(evaluate("dr-sari", DetectionSignals::clean()));
        log.log(evaluate("ns-dewi", blocked()));

        let parsed: Vec<SpoofingDetectionResult> = serde_json::from_str(&log.to_json().unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        let jsonl = log.to_jsonl().unwrap();
        assert_eq!(jsonl.lines().count(), 2);
        for line in jsonl.lines() {
            let entry: SpoofingDetectionResult = serde_json::from_str(line).unwrap();
            assert!(log.get(entry.id).is_some());
        }
        assert_eq!(AuditLog::new().to_jsonl().unwrap(), "");
    }
}

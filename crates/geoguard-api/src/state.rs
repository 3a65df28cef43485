//! Shared application state
use chrono::{DateTime, Utc};
use geoguard_core::{AttendanceEvent, GeoGuardError, WorkLocation};
use geoguard_policy::{
    ActiveConfigCache, AttendanceGate, AttendanceVerdict, AuditLog, ConfigRegistry,
    ReviewDecision, ReviewRecord, SpoofingDetectionConfig, SpoofingDetectionResult,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::error::ApiResult;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RwLock<ConfigRegistry>>,
    pub cache: Arc<ActiveConfigCache>,
    pub locations: Arc<Vec<WorkLocation>>,
    /// Accepted attendance events by id
    pub events: Arc<RwLock<HashMap<Uuid, AttendanceEvent>>>,
    /// Latest accepted event per user, for impossible-travel checks
    pub last_attendance: Arc<RwLock<HashMap<String, Uuid>>>,
    pub audit: Arc<RwLock<AuditLog>>,
    pub gate: AttendanceGate,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        registry: ConfigRegistry,
        locations: Vec<WorkLocation>,
        cache_ttl: Duration,
        gate: AttendanceGate,
    ) -> ApiResult<Self> {
        Ok(Self {
            registry: Arc::new(RwLock::new(registry)),
            cache: Arc::new(ActiveConfigCache::new(cache_ttl)),
            locations: Arc::new(locations),
            events: Arc::new(RwLock::new(HashMap::new())),
            last_attendance: Arc::new(RwLock::new(HashMap::new())),
            audit: Arc::new(RwLock::new(AuditLog::new())),
            gate,
            metrics: Metrics::new()?,
        })
    }

    pub fn from_config(config: &ServiceConfig) -> ApiResult<Self> {
        Self::new(
            config.load_registry()?,
            config.load_locations()?,
            config.cache_ttl,
            AttendanceGate::new().with_failure_policy(config.failure_policy),
        )
    }

    /// The active config, served from the cache when fresh
    pub fn active_config(&self) -> Result<Arc<SpoofingDetectionConfig>, GeoGuardError> {
        self.cache
            .get_or_load(|| self.registry.read().active().cloned())
    }

    /// The user's latest accepted attendance
    pub fn previous_attendance(&self, user_id: &str) -> Option<AttendanceEvent> {
        let id = *self.last_attendance.read().get(user_id)?;
        self.events.read().get(&id).cloned()
    }

    pub fn attendance(&self, id: Uuid) -> Result<AttendanceEvent, GeoGuardError> {
        self.events
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| GeoGuardError::AttendanceNotFound(id.to_string()))
    }

    /// Store what a check produced: the accepted event, the detection and
    /// the metrics. Expired entries are pruned on the way.
    pub fn record_verdict(&self, user_id: &str, verdict: &AttendanceVerdict) {
        if let Some(event) = &verdict.event {
            self.events.write().insert(event.id, event.clone());
            self.last_attendance
                .write()
                .insert(user_id.to_string(), event.id);
        }
        if let Some(detection) = &verdict.detection {
            self.record_detection(detection.clone());
        }
        self.metrics.observe_verdict(verdict);
    }

    pub fn record_detection(&self, detection: SpoofingDetectionResult) -> Uuid {
        let id = self.audit.write().log(detection);
        self.prune_expired(Utc::now());
        id
    }

    /// Review a logged detection and carry the ruling over to its event
    pub fn review_detection(
        &self,
        id: Uuid,
        reviewer: String,
        decision: ReviewDecision,
        notes: Option<String>,
    ) -> Result<ReviewRecord, GeoGuardError> {
        let (record, event_id) = {
            let mut audit = self.audit.write();
            let record = audit.review(id, reviewer, decision, notes)?;
            (record, audit.get(id).and_then(|d| d.event_id))
        };
        if let Some(event_id) = event_id {
            if let Some(event) = self.events.write().get_mut(&event_id) {
                record.apply_to(event);
                tracing::debug!(detection = %id, event = %event_id, "review applied to attendance");
            }
        }
        Ok(record)
    }

    /// Drop audit entries and events older than the active retention
    /// window; returns how many audit entries went
    pub fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let retention_days = match self.active_config() {
            Ok(config) => config.data_retention_days,
            Err(_) => return 0,
        };
        let cutoff = now - chrono::Duration::days(i64::from(retention_days));
        self.events.write().retain(|_, event| event.timestamp >= cutoff);
        self.audit.write().prune_older_than(retention_days, now)
    }
}

//! API Handlers
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use geoguard_core::{AttendanceEvent, CheckContext, GeoGuardError, GEOGUARD_VERSION};
use geoguard_policy::{
    AttendanceAttempt, AttendanceVerdict, AuditStats, ReviewDecision, ReviewRecord,
    SpoofingDetectionConfig, SpoofingDetectionResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::IpAddr;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::TraceId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user_id: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub source_ip: Option<IpAddr>,
    pub attempt: AttendanceAttempt,
}

pub async fn check_attendance(
    State(state): State<AppState>,
    Extension(trace): Extension<TraceId>,
    Json(request): Json<CheckRequest>,
) -> ApiResult<(StatusCode, Json<AttendanceVerdict>)> {
    let mut ctx = CheckContext::new(&request.user_id).with_trace_id(trace.0);
    if let Some(device_id) = request.device_id.or_else(|| request.attempt.device.device_id.clone()) {
        ctx = ctx.with_device(device_id);
    }
    if let Some(ip) = request.source_ip {
        ctx = ctx.with_ip(ip);
    }

    // A failed lookup resolves through the gate's failure policy
    let config = state.active_config().ok();
    let previous = state.previous_attendance(&ctx.user_id);

    let verdict = state.gate.check(
        &ctx,
        &request.attempt,
        &state.locations,
        previous.as_ref(),
        config.as_deref(),
    )?;

    state.record_verdict(&ctx.user_id, &verdict);

    let status = StatusCode::from_u16(verdict.http_status()).unwrap_or(StatusCode::FORBIDDEN);
    Ok((status, Json(verdict)))
}

pub async fn get_attendance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AttendanceEvent>> {
    Ok(Json(state.attendance(id)?))
}

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub name: String,
    pub version: String,
    pub fingerprint: String,
    pub is_active: bool,
}

impl From<&SpoofingDetectionConfig> for ConfigSummary {
    fn from(config: &SpoofingDetectionConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            fingerprint: config.fingerprint(),
            is_active: config.is_active,
        }
    }
}

pub async fn active_config(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let config = state.registry.read().active()?.clone();
    Ok(Json(json!({
        "fingerprint": config.fingerprint(),
        "config": config,
    })))
}

pub async fn list_configs(State(state): State<AppState>) -> Json<Vec<ConfigSummary>> {
    let registry = state.registry.read();
    let summaries = registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name).ok())
        .map(ConfigSummary::from)
        .collect();
    Json(summaries)
}

pub async fn create_config(
    State(state): State<AppState>,
    Json(config): Json<SpoofingDetectionConfig>,
) -> ApiResult<(StatusCode, Json<ConfigSummary>)> {
    let name = config.name.clone();
    let activates = config.is_active;
    let summary = {
        let mut registry = state.registry.write();
        registry.insert(config)?;
        ConfigSummary::from(registry.get(&name)?)
    };
    if activates {
        state.cache.invalidate();
        state.metrics.config_activated();
    }
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn activate_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ConfigSummary>> {
    let summary = {
        let mut registry = state.registry.write();
        ConfigSummary::from(registry.activate(&name)?)
    };
    state.cache.invalidate();
    state.metrics.config_activated();
    Ok(Json(summary))
}

pub async fn deactivate_config(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ConfigSummary>> {
    let mut registry = state.registry.write();
    registry.deactivate(&name)?;
    Ok(Json(ConfigSummary::from(registry.get(&name)?)))
}

#[derive(Debug, Deserialize)]
pub struct DetectionQuery {
    pub user_id: Option<String>,
    /// Only detections evaluated at or after this time
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_detections(
    State(state): State<AppState>,
    Query(query): Query<DetectionQuery>,
) -> Json<Vec<SpoofingDetectionResult>> {
    let audit = state.audit.read();
    let entries = match (query.pending, query.since) {
        (true, since) => audit
            .pending_review()
            .into_iter()
            .filter(|e| since.map_or(true, |since| e.evaluated_at >= since))
            .collect(),
        (false, Some(since)) => audit.entries_since(since),
        (false, None) => audit.entries().iter().collect(),
    };
    let detections = entries
        .into_iter()
        .rev()
        .filter(|e| query.user_id.as_deref().map_or(true, |u| e.user_id == u))
        .take(query.limit)
        .cloned()
        .collect();
    Json(detections)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    #[default]
    Jsonl,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
}

pub async fn export_detections(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let audit = state.audit.read();
    let (content_type, body) = match query.format {
        ExportFormat::Json => ("application/json", audit.to_json()?),
        ExportFormat::Jsonl => ("application/x-ndjson", audit.to_jsonl()?),
    };
    Ok(([(header::CONTENT_TYPE, content_type)], body))
}

pub async fn detection_stats(State(state): State<AppState>) -> Json<AuditStats> {
    Json(state.audit.read().stats())
}

pub async fn get_detection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SpoofingDetectionResult>> {
    state
        .audit
        .read()
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| GeoGuardError::DetectionNotFound(id.to_string()).into())
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub reviewer: String,
    pub decision: ReviewDecision,
    #[serde(default)]
    pub notes: Option<String>,
}

pub async fn review_detection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<ReviewRecord>> {
    let record = state.review_detection(id, request.reviewer, request.decision, request.notes)?;
    let decision = match record.decision {
        ReviewDecision::Approved => "approved",
        ReviewDecision::Rejected => "rejected",
    };
    state.metrics.reviewed(decision);
    Ok(Json(record))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let active = state.registry.read().active_name().map(str::to_string);
    let status = if active.is_some() { "ok" } else { "degraded" };
    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "version": GEOGUARD_VERSION,
            "active_config": active,
            "locations": state.locations.len(),
        })),
    )
}

pub async fn metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.encode()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

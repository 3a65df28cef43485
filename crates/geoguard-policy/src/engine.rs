//! Spoofing risk engine
//!
//! Turns detection signals and a travel assessment into a weighted score,
//! a level and an action, using the active config handed in by the caller.

use chrono::Utc;
use geoguard_core::{CheckContext, Coordinate, GeoGuardError, Result};
use uuid::Uuid;

use crate::action::SpoofingAction;
use crate::config::SpoofingDetectionConfig;
use crate::result::SpoofingDetectionResult;
use crate::risk::{total_score, RiskFactor, RiskSignal};
use crate::signals::DetectionSignals;
use crate::travel::TravelAssessment;

/// Stateless scorer; one instance can serve every request
#[derive(Debug, Clone, Copy, Default)]
pub struct SpoofingRiskEngine;

impl SpoofingRiskEngine {
    pub fn new() -> Self {
        Self
    }

    /// Score one attempt.
    ///
    /// Fails with `NoActiveConfig` when no config is given or the given one
    /// is not active, and with `InvalidConfig` when it does not validate.
    /// Never returns a partial result.
    pub fn evaluate(
        &self,
        ctx: &CheckContext,
        signals: &DetectionSignals,
        travel: &TravelAssessment,
        config: Option<&SpoofingDetectionConfig>,
    ) -> Result<SpoofingDetectionResult> {
        self.evaluate_at(ctx, signals, travel, None, config)
    }

    /// Like `evaluate`, also recording the trusted location the position
    /// falls in, if any
    pub fn evaluate_at(
        &self,
        ctx: &CheckContext,
        signals: &DetectionSignals,
        travel: &TravelAssessment,
        position: Option<&Coordinate>,
        config: Option<&SpoofingDetectionConfig>,
    ) -> Result<SpoofingDetectionResult> {
        let config = match config {
            Some(config) if config.is_active => config,
            _ => return Err(GeoGuardError::NoActiveConfig),
        };
        config.validate()?;

        let factors = Self::factors(signals, travel, config);
        let risk_score = total_score(&factors);
        let risk_level = config.thresholds.classify(risk_score);
        let policy_action = config.auto_actions.action_for(risk_level);

        let whitelist_match = config.whitelist.match_context(ctx);
        let action_taken = if whitelist_match.is_some() {
            SpoofingAction::None
        } else {
            policy_action
        };
        let trusted_location = position
            .and_then(|p| config.whitelist.trusted_location_for(p))
            .map(|t| t.name.clone());

        if action_taken.is_blocked() {
            tracing::warn!(
                user = %ctx.user_id,
                trace_id = %ctx.trace_id,
                score = risk_score,
                level = %risk_level,
                "attendance blocked by spoofing policy"
            );
        } else {
            tracing::debug!(
                user = %ctx.user_id,
                trace_id = %ctx.trace_id,
                score = risk_score,
                level = %risk_level,
                action = %action_taken,
                whitelisted = whitelist_match.is_some(),
                "spoofing risk evaluated"
            );
        }

        Ok(SpoofingDetectionResult {
            id: Uuid::new_v4(),
            user_id: ctx.user_id.clone(),
            device_id: ctx.device_id.clone(),
            trace_id: ctx.trace_id.clone(),
            evaluated_at: Utc::now(),
            config_name: config.name.clone(),
            config_version: config.version.clone(),
            config_fingerprint: config.fingerprint(),
            signals: *signals,
            travel: *travel,
            factors,
            risk_score,
            risk_level,
            policy_action,
            action_taken,
            whitelist_match,
            trusted_location,
            event_id: None,
            review: None,
        })
    }

    /// Enabled signals that fired, in a fixed order
    fn factors(
        signals: &DetectionSignals,
        travel: &TravelAssessment,
        config: &SpoofingDetectionConfig,
    ) -> Vec<RiskFactor> {
        RiskSignal::all()
            .into_iter()
            .filter(|signal| config.detection.is_enabled(*signal))
            .filter(|signal| match signal {
                RiskSignal::ImpossibleTravel => travel.is_impossible,
                other => signals.is_raised(*other),
            })
            .map(|signal| RiskFactor::new(signal, config.weights.weight_for(signal)))
            .collect()
    }
}

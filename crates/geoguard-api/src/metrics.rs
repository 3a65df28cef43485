//! Prometheus metrics served on `/metrics`
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

use geoguard_policy::AttendanceVerdict;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    checks: IntCounterVec,
    risk_score: Histogram,
    evaluation_errors: IntCounter,
    config_activations: IntCounter,
    reviews: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let checks = IntCounterVec::new(
            Opts::new("geoguard_attendance_checks_total", "Attendance checks by disposition"),
            &["disposition"],
        )?;
        let risk_score = Histogram::with_opts(
            HistogramOpts::new("geoguard_risk_score", "Spoofing risk score per evaluation")
                .buckets(vec![10.0, 20.0, 40.0, 55.0, 70.0, 85.0, 100.0]),
        )?;
        let evaluation_errors = IntCounter::new(
            "geoguard_evaluation_errors_total",
            "Spoofing evaluations that failed and were resolved by the failure policy",
        )?;
        let config_activations = IntCounter::new(
            "geoguard_config_activations_total",
            "Detection config activations",
        )?;
        let reviews = IntCounterVec::new(
            Opts::new("geoguard_reviews_total", "Admin reviews by decision"),
            &["decision"],
        )?;

        registry.register(Box::new(checks.clone()))?;
        registry.register(Box::new(risk_score.clone()))?;
        registry.register(Box::new(evaluation_errors.clone()))?;
        registry.register(Box::new(config_activations.clone()))?;
        registry.register(Box::new(reviews.clone()))?;

        Ok(Self {
            registry,
            checks,
            risk_score,
            evaluation_errors,
            config_activations,
            reviews,
        })
    }

    pub fn observe_verdict(&self, verdict: &AttendanceVerdict) {
        let disposition = match verdict.disposition {
            geoguard_policy::Disposition::Allow => "allow",
            geoguard_policy::Disposition::PendingReview => "pending_review",
            geoguard_policy::Disposition::Reject => "reject",
        };
        self.checks.with_label_values(&[disposition]).inc();
        if let Some(detection) = &verdict.detection {
            self.risk_score.observe(f64::from(detection.risk_score));
        }
        if verdict.error.is_some() {
            self.evaluation_errors.inc();
        }
    }

    pub fn config_activated(&self) {
        self.config_activations.inc();
    }

    pub fn reviewed(&self, decision: &str) {
        self.reviews.with_label_values(&[decision]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}

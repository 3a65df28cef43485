//! Service configuration from the environment
//!
//! | Variable                         | Default         |
//! |----------------------------------|-----------------|
//! | `GEOGUARD_ADDR`                  | `0.0.0.0:8787`  |
//! | `GEOGUARD_DETECTION_CONFIG`      | built-in `standard` profile |
//! | `GEOGUARD_LOCATIONS`             | none            |
//! | `GEOGUARD_CONFIG_CACHE_TTL_SECS` | `30`            |
//! | `GEOGUARD_FAILURE_POLICY`        | `fail_closed`   |

use geoguard_core::WorkLocation;
use geoguard_policy::{ConfigRegistry, FailurePolicy, SpoofingDetectionConfig, DEFAULT_CACHE_TTL};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8787";

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub addr: String,
    /// YAML or JSON detection config, activated at startup
    pub detection_config: Option<PathBuf>,
    /// YAML list of work locations
    pub locations: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            detection_config: None,
            locations: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            failure_policy: FailurePolicy::FailClosed,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` uses the process environment
    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(addr) = lookup("GEOGUARD_ADDR") {
            config.addr = addr;
        }
        config.detection_config = lookup("GEOGUARD_DETECTION_CONFIG").map(PathBuf::from);
        config.locations = lookup("GEOGUARD_LOCATIONS").map(PathBuf::from);

        if let Some(ttl) = lookup("GEOGUARD_CONFIG_CACHE_TTL_SECS") {
            let secs: u64 = ttl.trim().parse().map_err(|_| {
                ApiError::Environment(format!("GEOGUARD_CONFIG_CACHE_TTL_SECS={} is not a number", ttl))
            })?;
            config.cache_ttl = Duration::from_secs(secs);
        }

        if let Some(policy) = lookup("GEOGUARD_FAILURE_POLICY") {
            config.failure_policy = match policy.trim() {
                "fail_closed" => FailurePolicy::FailClosed,
                "allow_degraded" => FailurePolicy::AllowDegraded,
                other => {
                    return Err(ApiError::Environment(format!(
                        "GEOGUARD_FAILURE_POLICY={} (expected fail_closed or allow_degraded)",
                        other
                    )))
                }
            };
        }
        Ok(config)
    }

    /// Registry holding the `standard` preset plus the configured file,
    /// with the file's config active when one is set
    pub fn load_registry(&self) -> ApiResult<ConfigRegistry> {
        let mut registry = ConfigRegistry::new();
        registry.insert(SpoofingDetectionConfig::standard())?;
        let name = match &self.detection_config {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                match path.extension().and_then(|e| e.to_str()) {
                    Some("json") => registry.load_json(&text)?,
                    _ => registry.load_yaml(&text)?,
                }
            }
            None => "standard".to_string(),
        };
        let config = registry.activate(&name)?;
        tracing::info!(config = %config.label(), "loaded detection config");
        Ok(registry)
    }

    pub fn load_locations(&self) -> ApiResult<Vec<WorkLocation>> {
        let Some(path) = &self.locations else {
            tracing::warn!("GEOGUARD_LOCATIONS not set, no work locations loaded");
            return Ok(Vec::new());
        };
        let text = std::fs::read_to_string(path)?;
        let locations: Vec<WorkLocation> = serde_yaml::from_str(&text).map_err(|e| {
            geoguard_core::GeoGuardError::InvalidLocation(format!("{}: {}", path.display(), e))
        })?;
        for location in &locations {
            location.validate()?;
        }
        tracing::info!(count = locations.len(), "loaded work locations");
        Ok(locations)
    }
}

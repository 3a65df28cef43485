//! Config registry and active-config cache
//!
//! The registry owns every named config and guarantees at most one of them
//! is active. Configs are never removed, only deactivated, so past
//! detection results can always be traced back to the values they used.

use geoguard_core::{GeoGuardError, Result};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SpoofingDetectionConfig;

/// Default staleness window for [`ActiveConfigCache`]
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct ConfigRegistry {
    configs: BTreeMap<String, SpoofingDetectionConfig>,
    active: Option<String>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one config, already active
    pub fn with_active(config: SpoofingDetectionConfig) -> Result<Self> {
        let mut registry = Self::new();
        let name = config.name.clone();
        registry.insert(config)?;
        registry.activate(&name)?;
        Ok(registry)
    }

    /// Add or replace a config by name.
    ///
    /// The config is validated first. A config marked active takes over
    /// from the current one; replacing the active config keeps it active.
    pub fn insert(&mut self, mut config: SpoofingDetectionConfig) -> Result<()> {
        config.validate()?;
        let name = config.name.clone();
        let make_active = config.is_active || self.active.as_deref() == Some(name.as_str());
        config.is_active = false;
        self.configs.insert(name.clone(), config);

        if make_active {
            self.activate(&name)?;
        }
        tracing::debug!(config = %name, "config registered");
        Ok(())
    }

    pub fn load_yaml(&mut self, yaml: &str) -> Result<String> {
        let config = SpoofingDetectionConfig::from_yaml(yaml)?;
        let name = config.name.clone();
        self.insert(config)?;
        Ok(name)
    }

    pub fn load_json(&mut self, json: &str) -> Result<String> {
        let config = SpoofingDetectionConfig::from_json(json)?;
        let name = config.name.clone();
        self.insert(config)?;
        Ok(name)
    }

    /// Make `name` the only active config
    pub fn activate(&mut self, name: &str) -> Result<&SpoofingDetectionConfig> {
        if !self.configs.contains_key(name) {
            return Err(GeoGuardError::ConfigNotFound(name.to_string()));
        }

        for (key, config) in self.configs.iter_mut() {
            config.is_active = key == name;
        }
        let previous = self.active.replace(name.to_string());
        if previous.as_deref() != Some(name) {
            tracing::info!(
                config = %name,
                previous = previous.as_deref().unwrap_or("-"),
                "detection config activated"
            );
        }

        self.configs
            .get(name)
            .ok_or_else(|| GeoGuardError::ConfigNotFound(name.to_string()))
    }

    /// Deactivate a config that is not the active one.
    ///
    /// The active config can only be replaced by activating another, so
    /// there is never a window without one.
    pub fn deactivate(&mut self, name: &str) -> Result<()> {
        let config = self
            .configs
            .get_mut(name)
            .ok_or_else(|| GeoGuardError::ConfigNotFound(name.to_string()))?;
        if self.active.as_deref() == Some(name) {
            return Err(GeoGuardError::InvalidConfig(format!(
                "{} is the active config; activate another one instead",
                name
            )));
        }
        config.is_active = false;
        Ok(())
    }

    pub fn active(&self) -> Result<&SpoofingDetectionConfig> {
        self.active
            .as_deref()
            .and_then(|name| self.configs.get(name))
            .ok_or(GeoGuardError::NoActiveConfig)
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn get(&self, name: &str) -> Result<&SpoofingDetectionConfig> {
        self.configs
            .get(name)
            .ok_or_else(|| GeoGuardError::ConfigNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.configs.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

struct CachedConfig {
    config: Arc<SpoofingDetectionConfig>,
    loaded_at: Instant,
}

/// Read-through cache of the active config.
///
/// Readers may see a config up to `ttl` old; `invalidate` drops it at once
/// and is called whenever a different config is activated.
pub struct ActiveConfigCache {
    ttl: Duration,
    slot: RwLock<Option<CachedConfig>>,
}

impl ActiveConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached config, or the result of `load` when the entry is missing or stale
    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<SpoofingDetectionConfig>>
    where
        F: FnOnce() -> Result<SpoofingDetectionConfig>,
    {
        if let Some(cached) = self.slot.read().as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.config));
            }
        }

        let mut slot = self.slot.write();
        // Another writer may have refreshed it meanwhile
        if let Some(cached) = slot.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.config));
            }
        }

        let config = Arc::new(load()?);
        *slot = Some(CachedConfig {
            config: Arc::clone(&config),
            loaded_at: Instant::now(),
        });
        Ok(config)
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    pub fn is_warm(&self) -> bool {
        self.slot
            .read()
            .as_ref()
            .map(|c| c.loaded_at.elapsed() < self.ttl)
            .unwrap_or(false)
    }
}

impl Default for ActiveConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl std::fmt::Debug for ActiveConfigCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveConfigCache")
            .field("ttl", &self.ttl)
            .field("warm", &self.is_warm())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn registry() -> ConfigRegistry {
        let mut registry = ConfigRegistry::new();
        registry.insert(SpoofingDetectionConfig::standard()).unwrap();
        registry.insert(SpoofingDetectionConfig::strict()).unwrap();
        registry
    }

    #[test]
    fn test_no_active_until_activated() {
        let registry = registry();
        assert_eq!(registry.active().unwrap_err(), GeoGuardError::NoActiveConfig);
        assert_eq!(registry.names(), vec!["standard", "strict"]);
    }

    #[test]
    fn test_single_active() {
        let mut registry = registry();
        registry.activate("standard").unwrap();
        registry.activate("strict").unwrap();

        assert_eq!(registry.active().unwrap().name, "strict");
        assert!(!registry.get("standard").unwrap().is_active);
        let active_count = registry
            .names()
            .iter()
            .filter(|n| registry.get(n).unwrap().is_active)
            .count();
        assert_eq!(active_count, 1);
    }

    #[test]
    fn test_activate_unknown() {
        let mut registry = registry();
        assert!(matches!(
            registry.activate("night-shift"),
            Err(GeoGuardError::ConfigNotFound(_))
        ));
    }

    #[test]
    fn test_active_cannot_be_deactivated() {
        let mut registry = registry();
        registry.activate("standard").unwrap();
        assert!(registry.deactivate("standard").is_err());
        assert!(registry.deactivate("strict").is_ok());
        assert_eq!(registry.active().unwrap().name, "standard");
    }

    #[test]
    fn test_insert_active_takes_over() {
        let mut registry = registry();
        registry.activate("standard").unwrap();

        let mut tuned = SpoofingDetectionConfig::standard().activated();
        tuned.name = "ramadan".to_string();
        tuned.weights.developer_mode_weight = 5;
        registry.insert(tuned).unwrap();

        assert_eq!(registry.active_name(), Some("ramadan"));
        assert!(!registry.get("standard").unwrap().is_active);
    }

    #[test]
    fn test_replacing_active_keeps_it_active() {
        let mut registry = ConfigRegistry::with_active(SpoofingDetectionConfig::standard()).unwrap();
        let mut next = SpoofingDetectionConfig::standard();
        next.version = "1.1".to_string();
        registry.insert(next).unwrap();
        let active = registry.active().unwrap();
        assert_eq!(active.version, "1.1");
        assert!(active.is_active);
    }

    #[test]
    fn test_invalid_config_not_inserted() {
        let mut registry = registry();
        let mut broken = SpoofingDetectionConfig::standard();
        broken.name = "broken".to_string();
        broken.thresholds.critical = 120;
        assert!(registry.insert(broken).is_err());
        assert!(registry.get("broken").is_err());
    }

    #[test]
    fn test_cache_serves_until_invalidated() {
        let cache = ActiveConfigCache::new(Duration::from_secs(60));
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(SpoofingDetectionConfig::standard().activated())
        };

        cache.get_or_load(load).unwrap();
        cache.get_or_load(load).unwrap();
        assert_eq!(loads.get(), 1);
        assert!(cache.is_warm());

        cache.invalidate();
        assert!(!cache.is_warm());
        cache.get_or_load(load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_cache_expires() {
        let cache = ActiveConfigCache::new(Duration::ZERO);
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(SpoofingDetectionConfig::standard().activated())
        };
        cache.get_or_load(load).unwrap();
        cache.get_or_load(load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn test_cache_propagates_load_error() {
        let cache = ActiveConfigCache::default();
        let result = cache.get_or_load(|| Err(GeoGuardError::NoActiveConfig));
        assert_eq!(result.unwrap_err(), GeoGuardError::NoActiveConfig);
        assert!(!cache.is_warm());
    }
}

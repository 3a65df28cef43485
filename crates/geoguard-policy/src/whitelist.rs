//! Whitelisted devices, addresses and trusted locations
use geoguard_core::{CheckContext, Coordinate, GeoGuardError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistedIp {
    pub ip: IpAddr,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistedDevice {
    pub device_id: String,
    #[serde(default)]
    pub description: String,
}

/// A known-good area, e.g. a partner hospital staff rotate through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustedLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: f64,
}

impl TrustedLocation {
    pub fn contains(&self, position: &Coordinate) -> bool {
        let center = Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        };
        center.distance_to(position) <= self.radius_m
    }
}

/// Why an attempt was exempt from auto-actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WhitelistMatch {
    Device { device_id: String, description: String },
    Ip { ip: IpAddr, description: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Whitelist {
    #[serde(default)]
    pub ips: Vec<WhitelistedIp>,
    #[serde(default)]
    pub devices: Vec<WhitelistedDevice>,
    #[serde(default)]
    pub trusted_locations: Vec<TrustedLocation>,
}

impl Whitelist {
    /// Device matches are checked before addresses
    pub fn match_context(&self, ctx: &CheckContext) -> Option<WhitelistMatch> {
        if let Some(device_id) = ctx.device_id.as_deref() {
            if let Some(device) = self.devices.iter().find(|d| d.device_id == device_id) {
                return Some(WhitelistMatch::Device {
                    device_id: device.device_id.clone(),
                    description: device.description.clone(),
                });
            }
        }

        let ip = ctx.source_ip?;
        self.ips
            .iter()
            .find(|entry| entry.ip == ip)
            .map(|entry| WhitelistMatch::Ip {
                ip: entry.ip,
                description: entry.description.clone(),
            })
    }

    pub fn trusted_location_for(&self, position: &Coordinate) -> Option<&TrustedLocation> {
        self.trusted_locations.iter().find(|t| t.contains(position))
    }

    pub fn validate(&self) -> Result<()> {
        for device in &self.devices {
            if device.device_id.trim().is_empty() {
                return Err(GeoGuardError::InvalidConfig(
                    "whitelisted device id must not be empty".to_string(),
                ));
            }
        }
        for location in &self.trusted_locations {
            Coordinate::new(location.latitude, location.longitude).map_err(|e| {
                GeoGuardError::InvalidConfig(format!("trusted location {}: {}", location.name, e))
            })?;
            if !location.radius_m.is_finite() || location.radius_m <= 0.0 {
                return Err(GeoGuardError::InvalidConfig(format!(
                    "trusted location {} needs a positive radius",
                    location.name
                )));
            }
        }
        Ok(())
    }
}

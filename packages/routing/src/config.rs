//! Embedded routing provider configuration.
//!
//! Provider defaults live in `services/graphhopper.toml`, embedded at
//! compile time. Deployment-specific values (API key, URL override,
//! timeout override) come from the environment and are layered on top by
//! the caller.

use std::time::Duration;

use serde::Deserialize;

use crate::RoutingError;

const GRAPHHOPPER_TOML: &str = include_str!("../services/graphhopper.toml");

/// A routing service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingService {
    /// Unique identifier (e.g., `"graphhopper"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// API base URL without a trailing slash.
    pub base_url: String,
    /// Bound on every provider call.
    pub timeout_secs: u64,
    /// Isochrone limits.
    pub isochrone: IsochroneConfig,
}

/// Isochrone parameters. The provider is always asked for a single
/// area, so a `buckets` key is rejected rather than ignored.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsochroneConfig {
    /// Time limit used when the caller gives none.
    pub default_time_limit_secs: u32,
    /// Largest accepted time limit.
    pub max_time_limit_secs: u32,
}

impl Default for IsochroneConfig {
    fn default() -> Self {
        Self {
            default_time_limit_secs: crate::DEFAULT_TIME_LIMIT_SECS,
            max_time_limit_secs: 3600,
        }
    }
}

impl RoutingService {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parses a routing service definition.
///
/// # Errors
///
/// Returns [`RoutingError::Config`] if the TOML is malformed, has unknown
/// isochrone keys, or its default time limit is zero or above the maximum.
pub fn parse_service(toml_str: &str) -> Result<RoutingService, RoutingError> {
    let service: RoutingService =
        toml::de::from_str(toml_str).map_err(|e| RoutingError::Config {
            message: format!("Failed to parse routing service: {e}"),
        })?;

    let limits = service.isochrone;
    if limits.default_time_limit_secs == 0
        || limits.default_time_limit_secs > limits.max_time_limit_secs
    {
        return Err(RoutingError::Config {
            message: format!(
                "Routing service {}: isochrone default_time_limit_secs {} must be in 1..={}",
                service.id, limits.default_time_limit_secs, limits.max_time_limit_secs
            ),
        });
    }

    Ok(service)
}

/// Returns the embedded `GraphHopper` configuration.
///
/// # Errors
///
/// Returns [`RoutingError::Config`] if the embedded TOML is malformed.
pub fn graphhopper_service() -> Result<RoutingService, RoutingError> {
    parse_service(GRAPHHOPPER_TOML)
}

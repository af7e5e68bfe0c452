#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route and isochrone lookups against a hosted routing provider.
//!
//! Requests are validated into [`RouteRequest`] / [`IsochroneRequest`]
//! before any network call. The [`RoutingProvider`] trait is the seam the
//! server depends on; [`graphhopper::GraphHopperClient`] implements it over
//! HTTP with a bounded timeout and normalizes every provider failure into
//! [`RoutingError::Upstream`]. Calls are never retried or cached.

pub mod config;
pub mod graphhopper;
pub mod response;

pub use config::IsochroneConfig;
use safe_route_geo::GeoPoint;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Isochrone time limit used when the caller gives none, in seconds.
pub const DEFAULT_TIME_LIMIT_SECS: u32 = 600;

/// Errors from route and isochrone lookups.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Request parameters are missing or malformed. No provider call was
    /// made.
    #[error("{message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },

    /// The provider failed, timed out, or returned an unusable body.
    #[error("Routing provider error: {message}")]
    Upstream {
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        message: String,
        /// The provider's JSON error body, when it sent one.
        payload: Option<serde_json::Value>,
    },

    /// The provider configuration could not be loaded.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },
}

impl RoutingError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for RoutingError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("request timed out: {e}")
        } else {
            e.to_string()
        };
        Self::Upstream {
            status: e.status().map(|s| s.as_u16()),
            message,
            payload: None,
        }
    }
}

/// Travel mode.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Profile {
    /// Walking.
    #[default]
    Foot,
    /// Cycling.
    Bike,
    /// Driving.
    Car,
}

impl Profile {
    /// Parses an optional profile name, defaulting to [`Profile::Foot`].
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Validation`] for an unknown profile name.
    pub fn from_param(value: Option<&str>) -> Result<Self, RoutingError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(name) => name.to_lowercase().parse().map_err(|_| {
                RoutingError::validation(format!(
                    "Unknown profile {name:?}: expected foot, bike or car"
                ))
            }),
        }
    }

    /// Activity name used in isochrone labels ("10 min walking").
    #[must_use]
    pub const fn activity(self) -> &'static str {
        match self {
            Self::Foot => "walking",
            Self::Bike => "cycling",
            Self::Car => "driving",
        }
    }
}

fn parse_coordinate(name: &str, value: Option<&str>) -> Result<Option<f64>, RoutingError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| RoutingError::validation(format!("{name} is not a number: {raw:?}"))),
    }
}

fn point(lat: f64, lng: f64) -> Result<GeoPoint, RoutingError> {
    GeoPoint::new(lat, lng).map_err(|e| RoutingError::validation(e.to_string()))
}

/// A validated point-to-point route request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteRequest {
    /// Start of the route.
    pub start: GeoPoint,
    /// End of the route.
    pub end: GeoPoint,
    /// Travel mode.
    pub profile: Profile,
}

impl RouteRequest {
    /// Validates raw query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Validation`] if any coordinate is missing,
    /// not a number, or out of range, or the profile is unknown.
    pub fn from_raw(
        start_lat: Option<&str>,
        start_lng: Option<&str>,
        end_lat: Option<&str>,
        end_lng: Option<&str>,
        profile: Option<&str>,
    ) -> Result<Self, RoutingError> {
        let coords = (
            parse_coordinate("start_lat", start_lat)?,
            parse_coordinate("start_lng", start_lng)?,
            parse_coordinate("end_lat", end_lat)?,
            parse_coordinate("end_lng", end_lng)?,
        );

        let (Some(start_lat), Some(start_lng), Some(end_lat), Some(end_lng)) = coords else {
            return Err(RoutingError::validation(
                "Start and end coordinates are required",
            ));
        };

        Ok(Self {
            start: point(start_lat, start_lng)?,
            end: point(end_lat, end_lng)?,
            profile: Profile::from_param(profile)?,
        })
    }
}

/// A validated isochrone request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsochroneRequest {
    /// Origin of the reachable area.
    pub center: GeoPoint,
    /// Travel time budget in seconds.
    pub time_limit_secs: u32,
    /// Travel mode.
    pub profile: Profile,
}

impl IsochroneRequest {
    /// Validates raw query parameters. The time limit defaults to
    /// `limits.default_time_limit_secs` and must be positive and at most
    /// `limits.max_time_limit_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Validation`] if a coordinate is missing or
    /// malformed, the time limit is out of range, or the profile is unknown.
    pub fn from_raw(
        lat: Option<&str>,
        lng: Option<&str>,
        time_limit: Option<&str>,
        profile: Option<&str>,
        limits: &IsochroneConfig,
    ) -> Result<Self, RoutingError> {
        let (Some(lat), Some(lng)) = (
            parse_coordinate("lat", lat)?,
            parse_coordinate("lng", lng)?,
        ) else {
            return Err(RoutingError::validation("Coordinates are required"));
        };

        let time_limit_secs = match time_limit.map(str::trim) {
            None | Some("") => limits.default_time_limit_secs,
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                RoutingError::validation(format!(
                    "time_limit must be a whole number of seconds: {raw:?}"
                ))
            })?,
        };
        if time_limit_secs == 0 || time_limit_secs > limits.max_time_limit_secs {
            return Err(RoutingError::validation(format!(
                "time_limit must be between 1 and {} seconds",
                limits.max_time_limit_secs
            )));
        }

        Ok(Self {
            center: point(lat, lng)?,
            time_limit_secs,
            profile: Profile::from_param(profile)?,
        })
    }

    /// Human readable label such as `"10 min walking"`.
    #[must_use]
    pub fn label(&self) -> String {
        let minutes = self.time_limit_secs.div_ceil(60);
        format!("{minutes} min {}", self.profile.activity())
    }
}

/// A routing backend.
///
/// Implementations return the provider's JSON payload unchanged on success.
#[async_trait::async_trait]
pub trait RoutingProvider: Send + Sync {
    /// Computes a route between two points.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Upstream`] if the provider call fails.
    async fn route(&self, request: &RouteRequest) -> Result<serde_json::Value, RoutingError>;

    /// Computes the area reachable within the time limit.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Upstream`] if the provider call fails.
    async fn isochrone(
        &self,
        request: &IsochroneRequest,
    ) -> Result<serde_json::Value, RoutingError>;
}

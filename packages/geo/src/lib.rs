#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic primitives shared by the safe route server and client.
//!
//! The canonical in-process coordinate type is [`GeoPoint`], which names its
//! fields instead of relying on positional order. Positional
//! `(longitude, latitude)` arrays only appear at the edges of the system
//! (`GeoJSON` payloads and the `SQLite` R-tree columns) and are converted
//! through [`GeoPoint::to_lng_lat`] / [`GeoPoint::from_lng_lat`].

pub mod geometry;
pub mod polyline;

use geo::{Distance, Haversine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in metres, matching the radius `geo` uses for
/// haversine computations.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_008.8;

/// Length of one degree of latitude along a meridian, in metres.
const METERS_PER_DEGREE: f64 = EARTH_MEAN_RADIUS_M * std::f64::consts::PI / 180.0;

/// Relative padding applied to bounding boxes so that points exactly on the
/// radius are never cut off by floating point error in the prefilter.
const BBOX_PADDING: f64 = 1.01;

/// Errors from coordinate validation and geometry decoding.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// Latitude is not a finite value within `[-90, 90]`.
    #[error("Latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude is not a finite value within `[-180, 180]`.
    #[error("Longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    /// An encoded polyline string could not be decoded.
    #[error("Invalid polyline: {message}")]
    Polyline {
        /// Description of the decoding failure.
        message: String,
    },

    /// A provider geometry payload has an unrecognized shape.
    #[error("Unsupported geometry: {message}")]
    Geometry {
        /// Description of what was found.
        message: String,
    },
}

/// A WGS84 coordinate.
///
/// Serializes as `{"lat": .., "lng": ..}`, the shape used by API request
/// payloads. Deserialization goes through [`GeoPoint::new`], so an
/// out-of-range payload is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGeoPoint")]
pub struct GeoPoint {
    /// Latitude in degrees.
    #[serde(rename = "lat")]
    pub latitude: f64,
    /// Longitude in degrees.
    #[serde(rename = "lng")]
    pub longitude: f64,
}

#[derive(Deserialize)]
struct RawGeoPoint {
    #[serde(rename = "lat")]
    latitude: f64,
    #[serde(rename = "lng")]
    longitude: f64,
}

impl TryFrom<RawGeoPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(raw: RawGeoPoint) -> Result<Self, Self::Error> {
        Self::new(raw.latitude, raw.longitude)
    }
}

impl GeoPoint {
    /// Creates a validated point.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if either coordinate is non-finite or out of
    /// range.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Builds a point from a `[longitude, latitude]` pair (`GeoJSON` and
    /// R-tree order).
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if either coordinate is out of range.
    pub fn from_lng_lat(pair: [f64; 2]) -> Result<Self, GeoError> {
        Self::new(pair[1], pair[0])
    }

    /// Returns the `[longitude, latitude]` pair for `GeoJSON` and the
    /// spatial index.
    #[must_use]
    pub const fn to_lng_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Converts to a `geo` point (`x` = longitude, `y` = latitude).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }

    /// Great-circle distance to `other` in metres.
    #[must_use]
    pub fn distance_meters(self, other: Self) -> f64 {
        Haversine.distance(self.to_point(), other.to_point())
    }

    /// Moves the point due north (negative values move south) along its
    /// meridian. The result is not clamped at the poles.
    #[must_use]
    pub fn offset_north(self, meters: f64) -> Self {
        Self {
            latitude: self.latitude + meters / METERS_PER_DEGREE,
            longitude: self.longitude,
        }
    }
}

impl GeoPoint {
    /// Shortest distance from this point to any segment of `path`, in
    /// metres, or `None` for an empty path.
    ///
    /// Segments are measured in a local equirectangular projection centred
    /// on this point, which stays within a fraction of a percent of the
    /// great-circle distance over the few hundred metres this is used for.
    #[must_use]
    pub fn distance_to_path_meters(self, path: &[Self]) -> Option<f64> {
        let cos_lat = self.latitude.to_radians().cos();
        let project = |p: Self| {
            (
                (p.longitude - self.longitude) * cos_lat * METERS_PER_DEGREE,
                (p.latitude - self.latitude) * METERS_PER_DEGREE,
            )
        };

        match path {
            [] => None,
            [only] => Some(self.distance_meters(*only)),
            _ => path
                .windows(2)
                .map(|segment| {
                    let (ax, ay) = project(segment[0]);
                    let (bx, by) = project(segment[1]);
                    let (dx, dy) = (bx - ax, by - ay);
                    let length_sq = dx.mul_add(dx, dy * dy);
                    let t = if length_sq > 0.0 {
                        (-(ax.mul_add(dx, ay * dy)) / length_sq).clamp(0.0, 1.0)
                    } else {
                        0.0
                    };
                    let (cx, cy) = (t.mul_add(dx, ax), t.mul_add(dy, ay));
                    cx.hypot(cy)
                })
                .reduce(f64::min),
        }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Returns a box guaranteed to contain every point within `radius_m`
    /// metres of `center`.
    ///
    /// The box is padded slightly and widened to the full longitude range
    /// when it would touch a pole or cross the antimeridian, so it is only
    /// suitable as a prefilter ahead of an exact distance check.
    #[must_use]
    pub fn around(center: GeoPoint, radius_m: f64) -> Self {
        let lat_delta = radius_m.max(0.0) / METERS_PER_DEGREE * BBOX_PADDING;
        let south = (center.latitude - lat_delta).max(-90.0);
        let north = (center.latitude + lat_delta).min(90.0);

        if south <= -90.0 || north >= 90.0 {
            return Self::new(-180.0, south, 180.0, north);
        }

        let widest_lat = south.abs().max(north.abs()).to_radians();
        let lng_delta = lat_delta / widest_lat.cos();
        let west = center.longitude - lng_delta;
        let east = center.longitude + lng_delta;

        if lng_delta >= 180.0 || west < -180.0 || east > 180.0 {
            return Self::new(-180.0, south, 180.0, north);
        }

        Self::new(west, south, east, north)
    }

    /// Smallest box containing all `points`, or `None` when empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = GeoPoint>,
    {
        points.into_iter().fold(None, |acc, p| {
            Some(acc.map_or_else(
                || Self::new(p.longitude, p.latitude, p.longitude, p.latitude),
                |b: Self| {
                    Self::new(
                        b.west.min(p.longitude),
                        b.south.min(p.latitude),
                        b.east.max(p.longitude),
                        b.north.max(p.latitude),
                    )
                },
            ))
        })
    }

    /// Geometric centre of the box.
    #[must_use]
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: f64::midpoint(self.south, self.north),
            longitude: f64::midpoint(self.west, self.east),
        }
    }

    /// Distance from the centre to the farthest corner, in metres.
    #[must_use]
    pub fn half_diagonal_meters(&self) -> f64 {
        let center = self.center();
        [
            GeoPoint {
                latitude: self.south,
                longitude: self.west,
            },
            GeoPoint {
                latitude: self.north,
                longitude: self.east,
            },
            GeoPoint {
                latitude: self.south,
                longitude: self.east,
            },
            GeoPoint {
                latitude: self.north,
                longitude: self.west,
            },
        ]
        .into_iter()
        .map(|corner| center.distance_meters(corner))
        .fold(0.0, f64::max)
    }
}

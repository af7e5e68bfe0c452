//! Typed views of provider payloads.
//!
//! The server forwards payloads untouched; clients deserialize them into
//! these types to draw overlays. Unknown fields are ignored.

use safe_route_geo::{GeoError, GeoPoint, geometry};
use serde::{Deserialize, Serialize};

/// Route lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteResponse {
    /// Candidate paths, best first.
    #[serde(default)]
    pub paths: Vec<RoutePath>,
}

impl RouteResponse {
    /// The best path, if the provider found one.
    #[must_use]
    pub fn best(&self) -> Option<&RoutePath> {
        self.paths.first()
    }
}

/// One routed path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePath {
    /// Length in metres.
    #[serde(default)]
    pub distance: f64,
    /// Travel time in milliseconds.
    #[serde(default)]
    pub time: u64,
    /// Path geometry: an encoded polyline, a `GeoJSON` line string, or a
    /// flat coordinate array.
    pub points: serde_json::Value,
    /// Whether `points` is an encoded polyline.
    #[serde(default)]
    pub points_encoded: Option<bool>,
    /// `[min_lng, min_lat, max_lng, max_lat]`.
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    /// Turn-by-turn instructions.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl RoutePath {
    /// Decodes the path geometry into ordered points.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the geometry shape is unsupported or
    /// malformed.
    pub fn geometry(&self) -> Result<Vec<GeoPoint>, GeoError> {
        geometry::decode_path(&self.points)
    }

    /// Travel time in whole minutes, rounded up.
    #[must_use]
    pub const fn minutes(&self) -> u64 {
        self.time.div_ceil(60_000)
    }
}

/// A single turn instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Display text ("Turn left onto Main Street").
    pub text: String,
    /// Distance covered by this step, in metres.
    #[serde(default)]
    pub distance: f64,
    /// Duration of this step, in milliseconds.
    #[serde(default)]
    pub time: u64,
    /// Direction code.
    #[serde(default)]
    pub sign: i32,
    /// Start and end indices into the path geometry.
    #[serde(default)]
    pub interval: Vec<usize>,
    /// Street the step follows.
    #[serde(default)]
    pub street_name: Option<String>,
}

/// Isochrone lookup result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsochroneResponse {
    /// Reachable areas, one per bucket.
    #[serde(default)]
    pub polygons: Vec<IsochronePolygon>,
}

/// One reachable area as a `GeoJSON` feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsochronePolygon {
    /// `GeoJSON` polygon geometry.
    pub geometry: serde_json::Value,
    /// Feature properties (bucket index and so on).
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl IsochronePolygon {
    /// Exterior ring of the polygon as ordered points.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the geometry has no exterior ring or a
    /// position is malformed.
    pub fn exterior(&self) -> Result<Vec<GeoPoint>, GeoError> {
        let ring = self
            .geometry
            .get("coordinates")
            .and_then(|c| c.get(0))
            .ok_or_else(|| GeoError::Geometry {
                message: "polygon without an exterior ring".to_string(),
            })?;
        geometry::decode_path(ring)
    }
}

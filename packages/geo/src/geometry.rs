//! Detection and normalization of provider path geometry.
//!
//! Routing providers deliver a path's points in one of three shapes
//! depending on request flags and provider version. [`PathGeometry::detect`]
//! picks the shape explicitly from the JSON value and
//! [`PathGeometry::to_points`] normalizes every shape to `(latitude,
//! longitude)` [`GeoPoint`]s.

use serde_json::Value;

use crate::{GeoError, GeoPoint, polyline};

/// A path geometry in one of the supported wire shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum PathGeometry {
    /// Compact encoded polyline string (precision 5).
    Encoded(String),
    /// `GeoJSON`-style list of `[longitude, latitude, ...]` positions. Any
    /// trailing elevation value is ignored.
    Coordinates(Vec<Vec<f64>>),
    /// Flat list of alternating `longitude, latitude` values.
    Flat(Vec<f64>),
}

impl PathGeometry {
    /// Determines which shape `value` is in.
    ///
    /// Accepts a bare string, a bare array, or a `GeoJSON` geometry object
    /// whose `coordinates` member holds the array.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Geometry`] for any other shape, including arrays
    /// that mix numbers and positions.
    pub fn detect(value: &Value) -> Result<Self, GeoError> {
        match value {
            Value::String(encoded) => Ok(Self::Encoded(encoded.clone())),
            Value::Object(map) => map.get("coordinates").map_or_else(
                || {
                    Err(GeoError::Geometry {
                        message: "object without a coordinates member".to_string(),
                    })
                },
                |coords| match coords {
                    Value::Array(_) => Self::detect(coords),
                    other => Err(GeoError::Geometry {
                        message: format!("coordinates member is {}", type_name(other)),
                    }),
                },
            ),
            Value::Array(items) => detect_array(items),
            other => Err(GeoError::Geometry {
                message: format!("expected string, array or object, found {}", type_name(other)),
            }),
        }
    }

    /// Normalizes the geometry to an ordered list of points.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the encoded string is malformed, a position
    /// has fewer than two values, a flat array has odd length, or a
    /// coordinate is out of range.
    pub fn to_points(&self) -> Result<Vec<GeoPoint>, GeoError> {
        match self {
            Self::Encoded(encoded) => polyline::decode(encoded),
            Self::Coordinates(positions) => positions
                .iter()
                .map(|position| match position.as_slice() {
                    [lng, lat, ..] => GeoPoint::from_lng_lat([*lng, *lat]),
                    _ => Err(GeoError::Geometry {
                        message: format!("position with {} values", position.len()),
                    }),
                })
                .collect(),
            Self::Flat(values) => {
                if values.len() % 2 != 0 {
                    return Err(GeoError::Geometry {
                        message: format!("flat coordinate array has odd length {}", values.len()),
                    });
                }
                values
                    .chunks_exact(2)
                    .map(|pair| GeoPoint::from_lng_lat([pair[0], pair[1]]))
                    .collect()
            }
        }
    }
}

/// Detects and decodes a provider geometry value in one step.
///
/// # Errors
///
/// Returns [`GeoError`] if the value cannot be detected or decoded.
pub fn decode_path(value: &Value) -> Result<Vec<GeoPoint>, GeoError> {
    PathGeometry::detect(value)?.to_points()
}

fn detect_array(items: &[Value]) -> Result<PathGeometry, GeoError> {
    if items.is_empty() {
        return Ok(PathGeometry::Coordinates(Vec::new()));
    }

    if items.iter().all(Value::is_number) {
        return Ok(PathGeometry::Flat(
            items.iter().filter_map(Value::as_f64).collect(),
        ));
    }

    items
        .iter()
        .map(|item| {
            item.as_array()
                .and_then(|position| {
                    position
                        .iter()
                        .map(Value::as_f64)
                        .collect::<Option<Vec<f64>>>()
                })
                .ok_or_else(|| GeoError::Geometry {
                    message: format!("array element is {}, expected a position", type_name(item)),
                })
        })
        .collect::<Result<Vec<Vec<f64>>, _>>()
        .map(PathGeometry::Coordinates)
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

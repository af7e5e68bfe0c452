//! Encoded polyline codec.
//!
//! Each coordinate is stored as the delta from the previous one, scaled by
//! `10^precision`, zig-zag encoded, and written as little-endian 5-bit
//! groups offset by 63 into printable ASCII. A group with bit `0x20` set is
//! followed by another group of the same value. `GraphHopper` and Google
//! both use precision 5.

use crate::{GeoError, GeoPoint};

/// Precision used by the routing provider (`1e5`).
pub const DEFAULT_PRECISION: u32 = 5;

/// Offset added to every 5-bit group to land in printable ASCII.
const CHAR_OFFSET: i64 = 63;

/// Continuation flag within a 5-bit group.
const CONTINUATION_BIT: i64 = 0x20;

/// Payload mask of a group.
const GROUP_MASK: i64 = 0x1f;

/// Largest shift before an accumulated value would overflow `i64`.
const MAX_SHIFT: u32 = 60;

/// Decodes a precision-5 polyline into `(latitude, longitude)` points.
///
/// # Errors
///
/// Returns [`GeoError::Polyline`] if the string contains characters outside
/// the encoding alphabet or ends in the middle of a coordinate.
pub fn decode(encoded: &str) -> Result<Vec<GeoPoint>, GeoError> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

/// Decodes a polyline encoded with `precision` decimal digits.
///
/// # Errors
///
/// Returns [`GeoError::Polyline`] on malformed input, when the running sum
/// of deltas overflows, or when a decoded coordinate is out of range.
pub fn decode_with_precision(encoded: &str, precision: u32) -> Result<Vec<GeoPoint>, GeoError> {
    let factor = scale_factor(precision);
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::with_capacity(bytes.len() / 4);

    while index < bytes.len() {
        let start = index;
        lat = accumulate(lat, next_delta(bytes, &mut index)?, start)?;
        lng = accumulate(lng, next_delta(bytes, &mut index)?, start)?;

        #[allow(clippy::cast_precision_loss)]
        let point = GeoPoint::new(lat as f64 / factor, lng as f64 / factor).map_err(|e| {
            GeoError::Polyline {
                message: format!("point starting at offset {start}: {e}"),
            }
        })?;
        points.push(point);
    }

    Ok(points)
}

/// Encodes points as a precision-5 polyline.
#[must_use]
pub fn encode(points: &[GeoPoint]) -> String {
    encode_with_precision(points, DEFAULT_PRECISION)
}

/// Encodes points with `precision` decimal digits.
#[must_use]
pub fn encode_with_precision(points: &[GeoPoint], precision: u32) -> String {
    let factor = scale_factor(precision);
    let mut out = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        #[allow(clippy::cast_possible_truncation)]
        let lat = (point.latitude * factor).round() as i64;
        #[allow(clippy::cast_possible_truncation)]
        let lng = (point.longitude * factor).round() as i64;

        push_delta(lat - prev_lat, &mut out);
        push_delta(lng - prev_lng, &mut out);

        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn scale_factor(precision: u32) -> f64 {
    10_f64.powi(i32::try_from(precision).unwrap_or(i32::MAX))
}

fn accumulate(total: i64, delta: i64, start: usize) -> Result<i64, GeoError> {
    total.checked_add(delta).ok_or_else(|| GeoError::Polyline {
        message: format!("coordinate overflow in point starting at offset {start}"),
    })
}

/// Reads one zig-zag encoded value starting at `index`.
fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64, GeoError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let Some(&byte) = bytes.get(*index) else {
            return Err(GeoError::Polyline {
                message: format!("unexpected end of input at offset {index}"),
            });
        };

        let chunk = i64::from(byte) - CHAR_OFFSET;
        if !(0..=CHAR_OFFSET).contains(&chunk) {
            return Err(GeoError::Polyline {
                message: format!("invalid character {:?} at offset {index}", char::from(byte)),
            });
        }
        if shift > MAX_SHIFT {
            return Err(GeoError::Polyline {
                message: format!("value starting before offset {index} is too long"),
            });
        }

        *index += 1;
        result |= (chunk & GROUP_MASK) << shift;
        shift += 5;

        if chunk < CONTINUATION_BIT {
            break;
        }
    }

    Ok(if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

fn push_delta(value: i64, out: &mut String) {
    let mut zigzag = if value < 0 { !(value << 1) } else { value << 1 };

    while zigzag >= CONTINUATION_BIT {
        push_group((CONTINUATION_BIT | (zigzag & GROUP_MASK)) + CHAR_OFFSET, out);
        zigzag >>= 5;
    }
    push_group(zigzag + CHAR_OFFSET, out);
}

fn push_group(code: i64, out: &mut String) {
    // Every group is in 63..=126, which always fits in a `u8`.
    if let Ok(byte) = u8::try_from(code) {
        out.push(char::from(byte));
    }
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Mean earth radius used by the distance expression, in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// One certification point is worth this many metres of distance in the ranking.
pub const METRES_PER_SCORE_POINT: f64 = 100.0;
const METRES_PER_DEGREE_LATITUDE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, AppError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::BadRequest("Invalid longitude value".into()));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(AppError::BadRequest("Invalid latitude value".into()));
        }
        Ok(Self { longitude, latitude })
    }

    /// Latitude range that fully contains a circle of `radius_m` around this point.
    pub fn latitude_band(&self, radius_m: f64) -> (f64, f64) {
        let delta = radius_m / METRES_PER_DEGREE_LATITUDE;
        (
            (self.latitude - delta).max(-90.0),
            (self.latitude + delta).min(90.0),
        )
    }
}

/// SQL expression for the great-circle distance in metres between a bound point
/// (`$lat`, `$lng` placeholders) and a row's `latitude`/`longitude` columns.
///
/// Spherical law of cosines, with the cosine clamped to [-1, 1] so `acos` never sees
/// rounding noise.
pub fn distance_sql(lat_param: &str, lng_param: &str, lat_col: &str, lng_col: &str) -> String {
    format!(
        "({EARTH_RADIUS_M} * acos(LEAST(1.0, GREATEST(-1.0, \
         sin(radians({lat_param})) * sin(radians({lat_col})) + \
         cos(radians({lat_param})) * cos(radians({lat_col})) * \
         cos(radians({lng_col} - {lng_param}))))))"
    )
}

/// Escape `%`, `_` and `\` so user text is matched literally inside `ILIKE`.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// `%text%` pattern for a case-insensitive substring match, or `None` for blank input.
pub fn contains_pattern(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(q)))
}

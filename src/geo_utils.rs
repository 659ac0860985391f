//! # Geographic Utilities
//!
//! Distance metrics and planar projection helpers for GPS track geometry.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`DistanceFn`] | Strategy trait scoring the separation of two points |
//! | [`HorizontalDistance`] | Great-circle distance, elevation ignored |
//! | [`TerrainDistance`] | Hypotenuse of horizontal distance and elevation change |
//! | [`DistanceMetric`] | Value-type selector for the two standard strategies |
//! | [`haversine_distance`] | Great-circle distance between two points |
//! | [`polyline_length`] | Total length of a point sequence under a metric |
//! | [`wgs84_to_mercator`] | Web Mercator flattening used by closest-point projection |
//!
//! ## Example
//!
//! ```rust
//! use track_milestones::{DistanceMetric, Point, geo_utils};
//!
//! let track = vec![
//!     Point::new(25.1707, 121.5534).with_elevation(100.0),
//!     Point::new(25.1717, 121.5534).with_elevation(130.0),
//! ];
//!
//! let flat = geo_utils::polyline_length(&track, DistanceMetric::Horizontal.distance_fn());
//! let terrain = geo_utils::polyline_length(&track, DistanceMetric::Terrain.distance_fn());
//! assert!(terrain > flat);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Haversine Formula
//!
//! Great-circle distance on a sphere of mean Earth radius. Accurate to within 0.3%
//! for GPS tracks, which is well below receiver noise.
//!
//! ### Terrain Distance
//!
//! `sqrt(horizontal² + Δelevation²)`. Both points must carry an elevation;
//! [`DistanceFn::check`] reports the first point that does not, so a missing value
//! never turns into a silent NaN in a running sum.

use geo::{Distance, Haversine};

use crate::{Error, Point, Result};

// =============================================================================
// Distance Strategies
// =============================================================================

/// Scores the separation between two points in meters.
///
/// Implementations must be pure: the same pair always yields the same distance.
pub trait DistanceFn: Send + Sync {
    /// Distance in meters between `a` and `b` (never negative).
    fn distance(&self, a: &Point, b: &Point) -> f64;

    /// Verify that every point satisfies this metric's preconditions.
    fn check(&self, _points: &[Point]) -> Result<()> {
        Ok(())
    }
}

/// Great-circle distance ignoring elevation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalDistance;

impl DistanceFn for HorizontalDistance {
    #[inline]
    fn distance(&self, a: &Point, b: &Point) -> f64 {
        haversine_distance(a, b)
    }
}

/// Straight-line distance combining horizontal separation and elevation change.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerrainDistance;

impl DistanceFn for TerrainDistance {
    #[inline]
    fn distance(&self, a: &Point, b: &Point) -> f64 {
        let h = haversine_distance(a, b);
        let v = a.elevation.unwrap_or_default() - b.elevation.unwrap_or_default();
        h.hypot(v)
    }

    fn check(&self, points: &[Point]) -> Result<()> {
        match points.iter().position(|p| p.elevation.is_none()) {
            Some(index) => Err(Error::MissingElevation { index }),
            None => Ok(()),
        }
    }
}

/// Selects one of the two standard distance strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DistanceMetric {
    #[default]
    Horizontal,
    Terrain,
}

impl DistanceMetric {
    pub fn distance_fn(self) -> &'static dyn DistanceFn {
        match self {
            DistanceMetric::Horizontal => &HorizontalDistance,
            DistanceMetric::Terrain => &TerrainDistance,
        }
    }
}

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two points using the Haversine formula.
///
/// # Example
///
/// ```rust
/// use track_milestones::{Point, geo_utils};
///
/// let london = Point::new(51.5074, -0.1278);
/// let paris = Point::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &Point, p2: &Point) -> f64 {
    let point1 = geo::Point::new(p1.longitude, p1.latitude);
    let point2 = geo::Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a point sequence in meters.
///
/// Sums `distance_fn` over consecutive pairs. Empty or single-point sequences
/// return 0.0.
pub fn polyline_length(points: &[Point], distance_fn: &dyn DistanceFn) -> f64 {
    points
        .windows(2)
        .map(|w| distance_fn.distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Web Mercator
// =============================================================================

/// Web Mercator half-extent in meters (EPSG:3857)
pub const EARTH_MERCATOR_MAX: f64 = 20037508.34;

/// Maximum latitude that can be represented in Web Mercator
pub const MAX_LATITUDE: f64 = 85.05112878;

const LON_TO_X_FACTOR: f64 = EARTH_MERCATOR_MAX / 180.0;
const Y_FACTOR: f64 = EARTH_MERCATOR_MAX / std::f64::consts::PI;

/// Convert WGS84 (lat, lon) to Web Mercator (x, y) in meters.
///
/// Latitude is clamped to the representable range so points near the poles stay finite.
#[inline]
pub fn wgs84_to_mercator(lat: f64, lon: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = lon * LON_TO_X_FACTOR;
    let lat_rad = lat.to_radians();
    let y = (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() * Y_FACTOR;
    (x, y)
}

/// Signed longitude change from `from` to `to`, taking the short way round.
///
/// The result lies in `[-180, 180]`, so a line crossing the antimeridian is treated
/// as a short hop rather than a trip around the globe.
#[inline]
pub fn longitude_delta(from: f64, to: f64) -> f64 {
    let delta = to - from;
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

/// Wrap a longitude back into `[-180, 180]`.
#[inline]
pub fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 {
        lon - 360.0
    } else if lon < -180.0 {
        lon + 360.0
    } else {
        lon
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Track Milestones
//!
//! GPS track geometry for distance-based annotations.
//!
//! This library provides:
//! - Pluggable distance metrics (horizontal great-circle and terrain distance)
//! - Line interpolation and closest-point projection
//! - Waypoint-to-route projection with along-route mileage
//! - Route slicing at matched waypoints
//! - Milestone placement at regular intervals, optionally fitted to waypoints
//!
//! ## Features
//!
//! - **`serde`** - Serialize the track log model and option structs
//! - **`http`** - Enable HTTP elevation lookup services
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use track_milestones::{place_milestones, MilestoneOptions, NameTemplate, Point};
//!
//! // ~1.1km due north from the equator
//! let route: Vec<Point> = (0..=10)
//!     .map(|i| Point::new(i as f64 * 0.001, 0.0))
//!     .collect();
//!
//! let options = MilestoneOptions { spacing: 250.0, ..MilestoneOptions::default() };
//! let namer = NameTemplate::parse("{dist:.0}m").unwrap();
//!
//! let report = place_milestones(&route, &mut [], &options, &namer, None).unwrap();
//! assert_eq!(report.waypoints.len(), 4);
//! assert_eq!(report.waypoints[0].name.as_deref(), Some("250m"));
//! ```

use chrono::{DateTime, Utc};

pub mod command;
pub mod densify;
pub mod elevation;
pub mod geo_utils;
pub mod line;
pub mod milestone;
pub mod naming;
pub mod projection;
pub mod slicing;

// HTTP elevation services
#[cfg(feature = "http")]
pub mod http;

pub use command::{ChainedCommands, Command};
pub use densify::Interpolate;
pub use elevation::{CorrectElevation, ElevationError, ElevationService, LatLon};
pub use geo_utils::{DistanceFn, DistanceMetric, HorizontalDistance, TerrainDistance};
pub use line::{interpolate, lines, Line};
pub use milestone::{place_milestones, Direction, MilestoneOptions, MilestoneReport, Milestones};
pub use naming::{NameError, NameFn, NameTemplate, NameVariables};
pub use projection::{project_waypoints, ProjectWaypoints, Projection};
pub use slicing::{slice, slice_by_waypoints, Boundary, ReSegment, RouteSegment, Slice};

#[cfg(feature = "http")]
pub use http::{GoogleElevation, HttpConfig, OutdoorSafetyLab};

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by the geometry engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid milestone spacing: {0}")]
    InvalidSpacing(f64),

    #[error("Invalid projection threshold: {0}")]
    InvalidThreshold(f64),

    #[error("Empty route")]
    EmptyRoute,

    #[error("Point {index} has no elevation")]
    MissingElevation { index: usize },

    #[error("Expected exactly one track segment, found {0}")]
    AmbiguousRoute(usize),

    #[error("Invalid milestone name: {0}")]
    Name(#[from] NameError),

    #[error(transparent)]
    Elevation(#[from] ElevationError),
}

pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Core Types
// ============================================================================

/// A recorded or synthesized track point.
///
/// # Example
/// ```
/// use track_milestones::Point;
/// let point = Point::new(25.1707, 121.5534).with_elevation(812.0);
/// assert_eq!(point.elevation, Some(812.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub time: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl Point {
    /// Create a new point without elevation or timestamp.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            time: None,
            latitude,
            longitude,
            elevation: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    pub fn lat_lon(&self) -> LatLon {
        LatLon {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// A standalone point of interest, independent of the recorded track.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WayPoint {
    pub point: Point,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub description: Option<String>,
    pub symbol: Option<String>,
}

impl WayPoint {
    pub fn new(point: Point) -> Self {
        Self {
            point,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name of the waypoint, or an empty string when unnamed.
    pub fn name_or_default(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// One recording pass ("pen down" run) of a track.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment {
    pub points: Vec<Point>,
}

impl Segment {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

/// A named route made of one or more segments.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    pub name: Option<String>,
    pub segments: Vec<Segment>,
}

impl Track {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            name: None,
            segments,
        }
    }

    pub fn point_count(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }
}

/// The unit passed into and returned from the engine: tracks plus waypoints.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackLog {
    pub tracks: Vec<Track>,
    pub waypoints: Vec<WayPoint>,
}

impl TrackLog {
    pub fn new(tracks: Vec<Track>, waypoints: Vec<WayPoint>) -> Self {
        Self { tracks, waypoints }
    }

    /// Iterate over every segment of every track, in order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.tracks.iter().flat_map(|t| t.segments.iter())
    }

    pub fn segments_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.tracks.iter_mut().flat_map(|t| t.segments.iter_mut())
    }

    pub fn point_count(&self) -> usize {
        self.tracks.iter().map(Track::point_count).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> TrackLog {
        let first = Segment::new(vec![Point::new(25.0, 121.0), Point::new(25.001, 121.0)]);
        let second = Segment::new(vec![
            Point::new(25.002, 121.0),
            Point::new(25.003, 121.0),
            Point::new(25.004, 121.0),
        ]);
        TrackLog::new(
            vec![Track::new(vec![first]), Track::new(vec![second])],
            vec![WayPoint::new(Point::new(25.0015, 121.0)).with_name("Hut")],
        )
    }

    #[test]
    fn test_point_validation() {
        assert!(Point::new(25.1707, 121.5534).is_valid());
        assert!(!Point::new(91.0, 0.0).is_valid());
        assert!(!Point::new(0.0, 181.0).is_valid());
        assert!(!Point::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_track_log_counts() {
        let log = sample_log();
        assert_eq!(log.point_count(), 5);
        assert_eq!(log.segments().count(), 2);
    }

    #[test]
    fn test_waypoint_name_or_default() {
        let named = WayPoint::new(Point::new(0.0, 0.0)).with_name("Summit");
        let unnamed = WayPoint::new(Point::new(0.0, 0.0));
        assert_eq!(named.name_or_default(), "Summit");
        assert_eq!(unnamed.name_or_default(), "");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::EmptyRoute.to_string(), "Empty route");
        assert_eq!(
            Error::MissingElevation { index: 3 }.to_string(),
            "Point 3 has no elevation"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_track_log_serde_round_trip() {
        let log = sample_log();
        let json = serde_json::to_string(&log).unwrap();
        let back: TrackLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }
}

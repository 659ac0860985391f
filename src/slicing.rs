//! Route slicing at matched waypoints.
//!
//! Given the projections of some waypoints onto a route, [`slice`] cuts the route
//! at every projected point. Each cut ends one [`RouteSegment`] and starts the
//! next, and both carry the cut point, so joining the segments on their shared
//! boundaries gives back the route plus the inserted boundary points.

use log::{debug, info};

use crate::command::Command;
use crate::geo_utils::{DistanceFn, DistanceMetric};
use crate::projection::{project_waypoints, Projection};
use crate::{Error, Point, Result, Segment, Track, TrackLog, WayPoint};

/// A cut point: the waypoint that caused it and where it lies on the route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub waypoint: usize,
    pub point: Point,
}

/// A contiguous piece of a route between two cuts (or a route end).
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSegment {
    /// `None` for the first segment
    pub start: Option<Boundary>,
    /// `None` for the last segment
    pub end: Option<Boundary>,
    pub points: Vec<Point>,
}

impl RouteSegment {
    fn starting_at(start: Option<Boundary>) -> Self {
        Self {
            start,
            end: None,
            points: Vec::new(),
        }
    }
}

/// Cut `points` at every projection.
///
/// Projections are ordered by mileage (stable, so equal mileages keep their
/// input order). A projection that coincides with an existing point (ratio 0
/// or 1) cuts at that point without duplicating it. An empty route yields no
/// segments; otherwise there is always one more segment than projections.
pub fn slice(points: &[Point], projections: &[Projection]) -> Vec<RouteSegment> {
    let Some(last) = points.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut ordered: Vec<&Projection> = projections.iter().collect();
    ordered.sort_by(|a, b| a.mileage.total_cmp(&b.mileage).then(a.line.cmp(&b.line)));

    let mut segments = Vec::with_capacity(ordered.len() + 1);
    let mut current = RouteSegment::starting_at(None);
    // Index of the last original point already placed in `current`
    let mut placed: Option<usize> = None;

    for i in 0..last {
        if placed != Some(i) {
            current.points.push(points[i]);
            placed = Some(i);
        }

        for prj in ordered.iter().filter(|p| p.line == i) {
            let existing = if prj.ratio <= 0.0 {
                Some(i)
            } else if prj.ratio >= 1.0 {
                Some(i + 1)
            } else {
                None
            };
            match existing {
                Some(j) if placed == Some(j) => {}
                Some(j) => {
                    current.points.push(points[j]);
                    placed = Some(j);
                }
                None => current.points.push(prj.point),
            }

            let boundary = Boundary {
                waypoint: prj.waypoint,
                point: prj.point,
            };
            current.end = Some(boundary);
            let finished = std::mem::replace(&mut current, RouteSegment::starting_at(Some(boundary)));
            segments.push(finished);
            current.points.push(prj.point);
        }
    }

    if placed != Some(last) {
        current.points.push(points[last]);
    }
    segments.push(current);

    debug!(
        "[Slicing] Cut {} points into {} segments",
        points.len(),
        segments.len()
    );
    segments
}

/// A slice of a route with copies of its bounding waypoints.
///
/// The boundary waypoints carry the original waypoint's name at the projected
/// position.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub start: Option<WayPoint>,
    pub end: Option<WayPoint>,
    pub points: Vec<Point>,
}

/// Project `waypoints` onto `points` and cut the route at every match.
pub fn slice_by_waypoints(
    points: &[Point],
    waypoints: &[WayPoint],
    distance_fn: &dyn DistanceFn,
    threshold: f64,
) -> Result<Vec<Slice>> {
    let projections: Vec<Projection> = project_waypoints(points, waypoints, distance_fn, threshold)?
        .into_iter()
        .flatten()
        .collect();

    let boundary_waypoint = |b: Option<Boundary>| {
        b.map(|b| WayPoint {
            point: b.point,
            name: waypoints[b.waypoint].name.clone(),
            ..WayPoint::default()
        })
    };

    Ok(slice(points, &projections)
        .into_iter()
        .map(|segment| Slice {
            start: boundary_waypoint(segment.start),
            end: boundary_waypoint(segment.end),
            points: segment.points,
        })
        .collect())
}

// ============================================================================
// Command
// ============================================================================

/// Replace a single-segment track log with one track per waypoint-bounded slice.
///
/// Tracks are named `"<start> → <end>"` after their bounding waypoints.
#[derive(Debug, Clone)]
pub struct ReSegment {
    pub metric: DistanceMetric,
    /// Maximum waypoint distance in meters (0 = no limit)
    pub threshold: f64,
}

impl Default for ReSegment {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Horizontal,
            threshold: 30.0,
        }
    }
}

impl Command for ReSegment {
    fn name(&self) -> String {
        format!("Re-Segment by Waypoints with Threshold {}m", self.threshold)
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        let count = tracklog.segments().count();
        let points = match tracklog.segments().next() {
            Some(segment) if count == 1 => &segment.points,
            _ => return Err(Error::AmbiguousRoute(count)),
        };

        let slices = slice_by_waypoints(points, &tracklog.waypoints, self.metric.distance_fn(), self.threshold)?;
        let tracks: Vec<Track> = slices
            .into_iter()
            .map(|s| {
                let start = s.start.as_ref().map(WayPoint::name_or_default).unwrap_or_default();
                let end = s.end.as_ref().map(WayPoint::name_or_default).unwrap_or_default();
                Track {
                    name: Some(format!("{} → {}", start, end).trim().to_string()),
                    segments: vec![Segment::new(s.points)],
                }
            })
            .collect();

        info!("[Slicing] Re-segmented route into {} tracks", tracks.len());
        let n = tracks.len();
        tracklog.tracks = tracks;
        Ok(n)
    }
}

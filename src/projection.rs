//! # Waypoint Projection
//!
//! Matches waypoints to the route line they lie closest to and measures how far
//! along the route the match falls.
//!
//! ## Algorithm
//!
//! 1. Build the route's lines once
//! 2. For every waypoint, take the closest point on every line
//! 3. Keep the line whose closest point is nearest (horizontal distance, first
//!    line wins on ties)
//! 4. Drop the match if a positive threshold is exceeded
//! 5. Mileage = length of all earlier lines + distance from the line start to the
//!    projected point
//!
//! Each waypoint costs one scan over all lines, so a call is O(lines × waypoints).

use log::{debug, info};

use crate::command::Command;
use crate::geo_utils::{haversine_distance, DistanceFn, DistanceMetric};
use crate::line::lines;
use crate::{Error, Point, Result, TrackLog, WayPoint};

/// Where a waypoint lands on a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Index of the waypoint in the input slice
    pub waypoint: usize,
    /// Index of the matched line (its start point index)
    pub line: usize,
    /// Closest point on the matched line
    pub point: Point,
    /// Clamped projection parameter on the line, in `[0, 1]`
    pub ratio: f64,
    /// Horizontal distance from the waypoint to `point`, in meters
    pub distance: f64,
    /// Along-route distance from the first point to `point`, in meters
    pub mileage: f64,
}

/// Project every waypoint onto the route.
///
/// Returns one entry per waypoint, in input order; `None` for waypoints farther
/// than `threshold` meters from the route. A threshold of 0 disables the cut-off.
/// Routes with fewer than two points match nothing.
///
/// # Example
/// ```
/// use track_milestones::{project_waypoints, HorizontalDistance, Point, WayPoint};
///
/// let route = vec![Point::new(0.0, 0.0), Point::new(0.001, 0.0), Point::new(0.002, 0.0)];
/// let hut = WayPoint::new(Point::new(0.0015, 0.0001)).with_name("Hut");
///
/// let matches = project_waypoints(&route, &[hut], &HorizontalDistance, 50.0).unwrap();
/// let hit = matches[0].unwrap();
/// assert_eq!(hit.line, 1);
/// assert!(hit.distance < 12.0);
/// ```
pub fn project_waypoints(
    points: &[Point],
    waypoints: &[WayPoint],
    distance_fn: &dyn DistanceFn,
    threshold: f64,
) -> Result<Vec<Option<Projection>>> {
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(Error::InvalidThreshold(threshold));
    }
    distance_fn.check(points)?;

    let lines = lines(points, distance_fn);
    let mut offsets = Vec::with_capacity(lines.len());
    let mut mileage = 0.0;
    for line in &lines {
        offsets.push(mileage);
        mileage += line.distance;
    }

    let projections: Vec<Option<Projection>> = waypoints
        .iter()
        .enumerate()
        .map(|(w, waypoint)| {
            let mut best: Option<(usize, Point, f64, f64)> = None;
            for line in &lines {
                let (point, ratio) = line.locate(&waypoint.point);
                let distance = haversine_distance(&waypoint.point, &point);
                if best.map_or(true, |(_, _, _, d)| distance < d) {
                    best = Some((line.index, point, ratio, distance));
                }
            }

            let (index, point, ratio, distance) = best?;
            if threshold > 0.0 && distance > threshold {
                debug!(
                    "[Projection] '{}' is {:.1}m from the route, over {:.1}m",
                    waypoint.name_or_default(),
                    distance,
                    threshold
                );
                return None;
            }
            let line = &lines[index];
            Some(Projection {
                waypoint: w,
                line: index,
                point,
                ratio,
                distance,
                mileage: offsets[index] + distance_fn.distance(line.a, &point),
            })
        })
        .collect();

    debug!(
        "[Projection] Matched {}/{} waypoints against {} lines",
        projections.iter().flatten().count(),
        waypoints.len(),
        lines.len()
    );
    Ok(projections)
}

// ============================================================================
// Command
// ============================================================================

/// Move waypoints onto the nearest track segment.
///
/// Each waypoint is matched against every segment of every track and snapped to
/// the best one. With `keep_original`, the originals stay put and snapped copies
/// are appended instead.
#[derive(Debug, Clone)]
pub struct ProjectWaypoints {
    pub metric: DistanceMetric,
    /// Maximum distance in meters (0 = no limit)
    pub threshold: f64,
    pub keep_original: bool,
}

impl Default for ProjectWaypoints {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Horizontal,
            threshold: 30.0,
            keep_original: false,
        }
    }
}

impl Command for ProjectWaypoints {
    fn name(&self) -> String {
        format!("Project Waypoints with Threshold {}m", self.threshold)
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        let distance_fn = self.metric.distance_fn();
        let mut best: Vec<Option<Projection>> = vec![None; tracklog.waypoints.len()];

        for segment in tracklog.segments() {
            let found = project_waypoints(&segment.points, &tracklog.waypoints, distance_fn, self.threshold)?;
            for (slot, candidate) in best.iter_mut().zip(found) {
                if let Some(candidate) = candidate {
                    if slot.map_or(true, |current| candidate.distance < current.distance) {
                        *slot = Some(candidate);
                    }
                }
            }
        }

        let mut copies = Vec::new();
        let mut n = 0;
        for (waypoint, projection) in tracklog.waypoints.iter_mut().zip(&best) {
            let Some(projection) = projection else {
                debug!("[Projection] No projection for '{}'", waypoint.name_or_default());
                continue;
            };
            if self.keep_original {
                let mut copy = waypoint.clone();
                copy.point = projection.point;
                copies.push(copy);
            } else {
                waypoint.point = projection.point;
            }
            n += 1;
        }
        tracklog.waypoints.extend(copies);

        info!("[Projection] Projected {} waypoints", n);
        Ok(n)
    }
}

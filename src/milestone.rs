//! # Milestone Placement
//!
//! Places named markers at regular intervals along a route.
//!
//! ## Modes
//!
//! **Unconstrained**: markers at `spacing`, `2 × spacing`, … measured from the
//! first point. A marker that would land on the route's final point (at
//! millimeter resolution) is not emitted.
//!
//! **Fit to waypoints**: the route is cut at every waypoint that projects onto it
//! within `fit_threshold`. Each piece of length `L` gets `n = round(L / spacing)`
//! markers spaced `L / n` apart, so the last marker of a piece lands exactly on
//! the waypoint closing it. That marker is not synthesized; its name is appended
//! to the waypoint's (`"Hut/2.0K"`). The last piece has no closing waypoint, so
//! its last marker is synthesized at the route's final point.
//!
//! ## Atomicity
//!
//! All work happens on copies. Names are generated and waypoints renamed only
//! after every geometric step and every elevation lookup has succeeded, so an
//! error leaves the caller's data untouched.

use std::sync::Arc;

use log::{debug, info};

use crate::command::Command;
use crate::elevation::{correct_points, ElevationService};
use crate::geo_utils::{DistanceFn, DistanceMetric};
use crate::line::{lines, Line};
use crate::naming::{NameFn, NameTemplate, NameVariables};
use crate::projection::{project_waypoints, Projection};
use crate::slicing::slice;
use crate::{Error, Point, Result, TrackLog, WayPoint};

/// Which end of the route milestones are counted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// From the first point
    #[default]
    Forward,
    /// From the last point
    Reverse,
}

/// Configuration for milestone placement.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MilestoneOptions {
    /// Distance between milestones in meters.
    /// Default: 100.0
    pub spacing: f64,

    /// Default: Forward
    pub direction: Direction,

    /// Snap the milestone grid to waypoints on the route.
    /// Default: false
    pub fit_waypoints: bool,

    /// Maximum waypoint distance from the route when fitting (0 = no limit).
    /// Default: None (half the spacing)
    pub fit_threshold: Option<f64>,

    /// Default: Horizontal
    pub metric: DistanceMetric,

    /// Symbol given to synthesized milestones.
    /// Default: "Milestone"
    pub symbol: Option<String>,
}

impl Default for MilestoneOptions {
    fn default() -> Self {
        Self {
            spacing: 100.0,
            direction: Direction::Forward,
            fit_waypoints: false,
            fit_threshold: None,
            metric: DistanceMetric::Horizontal,
            symbol: Some("Milestone".to_string()),
        }
    }
}

impl MilestoneOptions {
    /// Waypoint matching threshold in effect.
    pub fn threshold(&self) -> f64 {
        self.fit_threshold.unwrap_or(self.spacing / 2.0)
    }
}

/// Result of a placement run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MilestoneReport {
    /// New milestone waypoints, in route order
    pub waypoints: Vec<WayPoint>,
    /// Number of existing waypoints renamed with a milestone name
    pub merged: usize,
}

impl MilestoneReport {
    /// Milestones placed, synthesized and merged.
    pub fn total(&self) -> usize {
        self.waypoints.len() + self.merged
    }
}

/// A milestone before naming.
#[derive(Debug, Clone, Copy)]
struct Milestone {
    number: usize,
    /// Along-route distance in meters
    distance: f64,
    point: Point,
    /// Waypoint the milestone merges into, if any
    merge: Option<usize>,
}

/// Place milestones along `points`.
///
/// In fit mode, `waypoints` are matched against the route and the ones closing
/// a piece are renamed in place. Otherwise they are ignored. `elevation`, when
/// given, corrects the route before measuring and every milestone before naming.
///
/// # Errors
///
/// - [`Error::InvalidSpacing`] / [`Error::InvalidThreshold`] for bad options
/// - [`Error::EmptyRoute`] for a route without points
/// - [`Error::Name`] when `namer` fails, either up front or for a milestone
/// - [`Error::MissingElevation`] for terrain distance on points without elevation
/// - [`Error::Elevation`] when a lookup fails
///
/// On error neither `waypoints` nor any output is produced.
pub fn place_milestones(
    points: &[Point],
    waypoints: &mut [WayPoint],
    options: &MilestoneOptions,
    namer: &dyn NameFn,
    elevation: Option<&dyn ElevationService>,
) -> Result<MilestoneReport> {
    if !options.spacing.is_finite() || options.spacing <= 0.0 {
        return Err(Error::InvalidSpacing(options.spacing));
    }
    let threshold = options.threshold();
    if options.fit_waypoints && (!threshold.is_finite() || threshold < 0.0) {
        return Err(Error::InvalidThreshold(threshold));
    }
    if points.is_empty() {
        return Err(Error::EmptyRoute);
    }
    namer.validate()?;

    let mut route = points.to_vec();
    if options.direction == Direction::Reverse {
        route.reverse();
    }
    if let Some(service) = elevation {
        correct_points(service, &mut route)?;
    }

    let distance_fn = options.metric.distance_fn();
    distance_fn.check(&route)?;

    let milestones = if options.fit_waypoints {
        fit_to_waypoints(&route, waypoints, distance_fn, options.spacing, threshold)?
    } else {
        along_route(&route, distance_fn, options.spacing)
    };

    let mut positions: Vec<Point> = milestones.iter().map(|m| m.point).collect();
    if let Some(service) = elevation {
        correct_points(service, &mut positions)?;
    }

    let total = milestones.len();
    let mut names = Vec::with_capacity(total);
    for (m, p) in milestones.iter().zip(&positions) {
        names.push(namer.name(&NameVariables {
            number: m.number,
            total,
            distance: m.distance,
            latitude: p.latitude,
            longitude: p.longitude,
            elevation: p.elevation,
        })?);
    }

    let mut report = MilestoneReport::default();
    let mut renames = Vec::new();
    for ((m, point), name) in milestones.iter().zip(positions).zip(names) {
        match m.merge {
            Some(w) => renames.push((w, name)),
            None => report.waypoints.push(WayPoint {
                point,
                name: Some(name),
                symbol: options.symbol.clone(),
                ..WayPoint::default()
            }),
        }
    }
    for (w, name) in renames {
        let waypoint = &mut waypoints[w];
        waypoint.name = Some(match waypoint.name.take() {
            Some(existing) => format!("{}/{}", existing, name),
            None => name,
        });
        report.merged += 1;
    }

    info!(
        "[Milestones] Placed {} milestones every {}m ({} merged into waypoints)",
        total, options.spacing, report.merged
    );
    Ok(report)
}

/// Milestone distances compared at millimeter resolution.
#[inline]
fn millimeters(meters: f64) -> i64 {
    (meters * 1000.0).round() as i64
}

/// Number of multiples of `spacing` strictly before `total`.
fn count_before_end(total: f64, spacing: f64) -> usize {
    let mut n = (total / spacing).floor() as usize;
    while n > 0 && millimeters(n as f64 * spacing) >= millimeters(total) {
        n -= 1;
    }
    n
}

/// Interpolate a point for every target distance, walking the lines once.
///
/// Targets must be increasing. Each line covers `[start, end)`; targets at or
/// past the final point are not placed.
fn walk(lines: &[Line], targets: &[f64]) -> Vec<Point> {
    let mut placed = Vec::with_capacity(targets.len());
    let mut next = 0;
    let mut start = 0.0;
    for line in lines {
        let end = start + line.distance;
        while next < targets.len() && millimeters(targets[next]) < millimeters(end) {
            let ratio = if line.distance > 0.0 {
                ((targets[next] - start) / line.distance).clamp(0.0, 1.0)
            } else {
                0.0
            };
            placed.push(line.interpolate(ratio));
            next += 1;
        }
        start = end;
    }
    placed
}

fn along_route(route: &[Point], distance_fn: &dyn DistanceFn, spacing: f64) -> Vec<Milestone> {
    let lines = lines(route, distance_fn);
    let total: f64 = lines.iter().map(|l| l.distance).sum();
    let count = count_before_end(total, spacing);
    debug!(
        "[Milestones] Route is {:.1}m long, {} milestones every {}m",
        total, count, spacing
    );

    let targets: Vec<f64> = (1..=count).map(|i| i as f64 * spacing).collect();
    walk(&lines, &targets)
        .into_iter()
        .zip(&targets)
        .enumerate()
        .map(|(i, (point, &distance))| Milestone {
            number: i + 1,
            distance,
            point,
            merge: None,
        })
        .collect()
}

fn fit_to_waypoints(
    route: &[Point],
    waypoints: &[WayPoint],
    distance_fn: &dyn DistanceFn,
    spacing: f64,
    threshold: f64,
) -> Result<Vec<Milestone>> {
    let projections: Vec<Projection> = project_waypoints(route, waypoints, distance_fn, threshold)?
        .into_iter()
        .flatten()
        .collect();
    let segments = slice(route, &projections);

    let mut milestones = Vec::new();
    let mut offset = 0.0;
    for (k, segment) in segments.iter().enumerate() {
        let lines = lines(&segment.points, distance_fn);
        let length: f64 = lines.iter().map(|l| l.distance).sum();
        let n = (length / spacing).round() as usize;
        debug!(
            "[Milestones] Segment {}: {:.1}m from {:.1}m, {} milestones",
            k, length, offset, n
        );
        if n == 0 {
            offset += length;
            continue;
        }

        let step = length / n as f64;
        let targets: Vec<f64> = (1..n).map(|j| j as f64 * step).collect();
        for (point, target) in walk(&lines, &targets).into_iter().zip(&targets) {
            milestones.push(Milestone {
                number: milestones.len() + 1,
                distance: offset + target,
                point,
                merge: None,
            });
        }

        let closing = match (segment.end, segment.points.last()) {
            (Some(boundary), _) => Some((boundary.point, Some(boundary.waypoint))),
            (None, Some(&last)) => Some((last, None)),
            (None, None) => None,
        };
        if let Some((point, merge)) = closing {
            milestones.push(Milestone {
                number: milestones.len() + 1,
                distance: offset + length,
                point,
                merge,
            });
        }
        offset += length;
    }
    Ok(milestones)
}

// ============================================================================
// Command
// ============================================================================

/// Place milestones on every segment of every track and append them to the log.
///
/// In fit mode each segment is matched against the log's waypoints as they were
/// before the command ran. The log is only modified once all segments succeed.
pub struct Milestones {
    pub options: MilestoneOptions,
    pub namer: Box<dyn NameFn>,
    pub service: Option<Arc<dyn ElevationService>>,
}

impl Milestones {
    pub fn new(options: MilestoneOptions) -> Self {
        Self {
            options,
            namer: Box::new(NameTemplate::default()),
            service: None,
        }
    }

    pub fn with_namer(mut self, namer: impl NameFn + 'static) -> Self {
        self.namer = Box::new(namer);
        self
    }

    pub fn with_service(mut self, service: Arc<dyn ElevationService>) -> Self {
        self.service = Some(service);
        self
    }
}

impl Command for Milestones {
    fn name(&self) -> String {
        "Create Milestones".to_string()
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        let mut waypoints = tracklog.waypoints.clone();
        let mut created = Vec::new();
        let mut n = 0;

        for segment in tracklog.segments() {
            let report = place_milestones(
                &segment.points,
                &mut waypoints,
                &self.options,
                self.namer.as_ref(),
                self.service.as_deref(),
            )?;
            debug!(
                "[Milestones] Appending {} milestones, {} merged",
                report.waypoints.len(),
                report.merged
            );
            n += report.total();
            created.extend(report.waypoints);
        }

        waypoints.extend(created);
        tracklog.waypoints = waypoints;
        Ok(n)
    }
}

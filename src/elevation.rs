//! Elevation lookup and correction.
//!
//! [`ElevationService`] is the seam to external elevation providers (see the
//! `http` feature for the bundled clients). Correction replaces a point's
//! elevation with the looked-up value rounded to whole meters. Values the
//! service cannot provide (`None` or NaN) are skipped and the prior elevation is
//! kept.

use std::sync::Arc;

use log::{debug, info};

use crate::command::Command;
use crate::{Point, Result, TrackLog};

/// A bare coordinate sent to an elevation service.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    #[error("Elevation request failed: {0}")]
    Request(String),

    #[error("Elevation service returned HTTP {0}")]
    Status(u16),

    #[error("Invalid elevation response: {0}")]
    Decode(String),

    #[error("Elevation service returned {actual} values for {expected} coordinates")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Elevation runtime error: {0}")]
    Runtime(String),

    #[error("Elevation service error: {0}")]
    Service(String),
}

/// Looks up terrain elevation for a batch of coordinates.
///
/// The result holds one entry per input coordinate, in order. `None` (or NaN)
/// marks a coordinate the service has no data for.
pub trait ElevationService: Send + Sync {
    fn lookup(&self, points: &[LatLon]) -> std::result::Result<Vec<Option<f64>>, ElevationError>;
}

/// Run one batched lookup and verify the service answered for every coordinate.
pub fn lookup(
    service: &dyn ElevationService,
    points: &[LatLon],
) -> std::result::Result<Vec<Option<f64>>, ElevationError> {
    if points.is_empty() {
        return Ok(Vec::new());
    }
    let elevations = service.lookup(points)?;
    if elevations.len() != points.len() {
        return Err(ElevationError::LengthMismatch {
            expected: points.len(),
            actual: elevations.len(),
        });
    }
    Ok(elevations)
}

/// A looked-up value usable as an elevation.
#[inline]
pub fn is_valid(elevation: Option<f64>) -> bool {
    matches!(elevation, Some(e) if !e.is_nan())
}

/// Correct the elevation of `points` in place.
///
/// Returns how many points received a new elevation. On error nothing is
/// modified.
pub fn correct_points(service: &dyn ElevationService, points: &mut [Point]) -> Result<usize> {
    let coords: Vec<LatLon> = points.iter().map(Point::lat_lon).collect();
    let elevations = lookup(service, &coords)?;
    Ok(apply(points.iter_mut(), &elevations))
}

/// Return a copy of `points` with corrected elevations.
pub fn corrected(service: &dyn ElevationService, points: &[Point]) -> Result<Vec<Point>> {
    let mut copy = points.to_vec();
    correct_points(service, &mut copy)?;
    Ok(copy)
}

fn apply<'a>(points: impl Iterator<Item = &'a mut Point>, elevations: &[Option<f64>]) -> usize {
    let mut n = 0;
    for (point, elevation) in points.zip(elevations) {
        if let Some(e) = elevation.filter(|e| !e.is_nan()) {
            point.elevation = Some(e.round());
            n += 1;
        }
    }
    n
}

// ============================================================================
// Command
// ============================================================================

/// Correct the elevation of every track point, and optionally every waypoint.
///
/// Each segment is one batched lookup; the waypoints are one more.
pub struct CorrectElevation {
    pub service: Arc<dyn ElevationService>,
    pub waypoints: bool,
}

impl CorrectElevation {
    pub fn new(service: Arc<dyn ElevationService>) -> Self {
        Self {
            service,
            waypoints: false,
        }
    }

    pub fn with_waypoints(mut self, waypoints: bool) -> Self {
        self.waypoints = waypoints;
        self
    }
}

impl Command for CorrectElevation {
    fn name(&self) -> String {
        "Correct Elevation".to_string()
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        let service = self.service.as_ref();

        // Look everything up before touching the log so a failure leaves it intact.
        let waypoint_elevations = if self.waypoints {
            let coords: Vec<LatLon> = tracklog.waypoints.iter().map(|w| w.point.lat_lon()).collect();
            lookup(service, &coords)?
        } else {
            Vec::new()
        };
        let mut segment_elevations = Vec::new();
        for segment in tracklog.segments() {
            let coords: Vec<LatLon> = segment.points.iter().map(Point::lat_lon).collect();
            segment_elevations.push(lookup(service, &coords)?);
        }

        let mut n = 0;
        if self.waypoints {
            let corrected = apply(
                tracklog.waypoints.iter_mut().map(|w| &mut w.point),
                &waypoint_elevations,
            );
            info!("[Elevation] Corrected {} way points", corrected);
            n += corrected;
        }
        for (i, (segment, elevations)) in tracklog
            .segments_mut()
            .zip(&segment_elevations)
            .enumerate()
        {
            let corrected = apply(segment.points.iter_mut(), elevations);
            debug!("[Elevation] Segment {}: corrected {} points", i, corrected);
            n += corrected;
        }
        info!("[Elevation] Corrected {} points in total", n);
        Ok(n)
    }
}

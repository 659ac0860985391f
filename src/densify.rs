//! Densify tracks by inserting evenly spaced points into long lines.

use std::sync::Arc;

use log::{debug, info};

use crate::command::Command;
use crate::elevation::{correct_points, ElevationService};
use crate::geo_utils::{DistanceFn, DistanceMetric};
use crate::line::lines;
use crate::{Error, Point, Result, TrackLog};

/// Insert points so that no line is much longer than `distance`.
///
/// A line of length `len` gets `round(len / distance) - 1` interior points at
/// equal ratios. With a service, the inserted points (and only those) get their
/// elevation looked up in one batch per segment.
pub struct Interpolate {
    /// Target spacing in meters
    pub distance: f64,
    pub metric: DistanceMetric,
    pub service: Option<Arc<dyn ElevationService>>,
}

impl Interpolate {
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            metric: DistanceMetric::Horizontal,
            service: None,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn ElevationService>) -> Self {
        self.service = Some(service);
        self
    }

    fn densify(&self, points: &[Point], distance_fn: &dyn DistanceFn) -> Result<(Vec<Point>, usize)> {
        let lines = lines(points, distance_fn);
        let Some(last) = lines.last() else {
            return Ok((points.to_vec(), 0));
        };

        let mut out = Vec::with_capacity(points.len());
        let mut inserted = Vec::new();
        for line in &lines {
            out.push(*line.a);
            let num = (line.distance / self.distance).round() as usize;
            for i in 1..num {
                inserted.push(out.len());
                out.push(line.interpolate(i as f64 / num as f64));
            }
        }
        out.push(*last.b);

        if let Some(service) = self.service.as_deref() {
            let mut fresh: Vec<Point> = inserted.iter().map(|&i| out[i]).collect();
            correct_points(service, &mut fresh)?;
            for (&i, point) in inserted.iter().zip(fresh) {
                out[i] = point;
            }
        }
        Ok((out, inserted.len()))
    }
}

impl Command for Interpolate {
    fn name(&self) -> String {
        format!("Interpolate by Distance {}m", self.distance)
    }

    fn run(&self, tracklog: &mut TrackLog) -> Result<usize> {
        if !self.distance.is_finite() || self.distance <= 0.0 {
            return Err(Error::InvalidSpacing(self.distance));
        }
        let distance_fn = self.metric.distance_fn();

        let mut densified = Vec::new();
        for segment in tracklog.segments() {
            distance_fn.check(&segment.points)?;
            densified.push(self.densify(&segment.points, distance_fn)?);
        }

        let mut n = 0;
        for (segment, (points, inserted)) in tracklog.segments_mut().zip(densified) {
            debug!("[Interpolate] Inserted {} points into a segment of {}", inserted, segment.points.len());
            segment.points = points;
            n += inserted;
        }
        info!("[Interpolate] Inserted {} points", n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elevation::tests::{FailingService, FakeService};
    use crate::{Segment, Track};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn log(points: Vec<Point>) -> TrackLog {
        TrackLog::new(vec![Track::new(vec![Segment::new(points)])], vec![])
    }

    #[test]
    fn test_inserts_evenly_spaced_points() {
        // ~111m and ~22m lines
        let mut tracklog = log(vec![
            Point::new(1.0, 0.0).with_elevation(10.0),
            Point::new(1.001, 0.0).with_elevation(20.0),
            Point::new(1.0012, 0.0).with_elevation(20.0),
        ]);
        let n = Interpolate::new(25.0).run(&mut tracklog).unwrap();

        // round(111.2 / 25) = 4 -> 3 new points; round(22.2 / 25) = 1 -> none
        assert_eq!(n, 3);
        let points = &tracklog.tracks[0].segments[0].points;
        assert_eq!(points.len(), 6);
        assert!(approx_eq(points[2].latitude, 1.0005, 1e-12));
        assert!(approx_eq(points[2].elevation.unwrap(), 15.0, 1e-9));
        assert_eq!(points[4].latitude, 1.001);
        assert_eq!(points[5].latitude, 1.0012);
    }

    #[test]
    fn test_service_corrects_only_new_points() {
        let mut tracklog = log(vec![
            Point::new(1.0, 0.0).with_elevation(10.0),
            Point::new(1.001, 0.0).with_elevation(20.0),
        ]);
        let command = Interpolate::new(50.0).with_service(Arc::new(FakeService::default()));
        assert_eq!(command.run(&mut tracklog).unwrap(), 1);
        let points = &tracklog.tracks[0].segments[0].points;
        assert_eq!(points[0].elevation, Some(10.0));
        assert_eq!(points[1].elevation, Some(1001.0));
        assert_eq!(points[2].elevation, Some(20.0));
    }

    #[test]
    fn test_short_segments_are_kept() {
        let mut tracklog = log(vec![Point::new(1.0, 0.0)]);
        assert_eq!(Interpolate::new(10.0).run(&mut tracklog).unwrap(), 0);
        assert_eq!(tracklog.point_count(), 1);
    }

    #[test]
    fn test_failures_leave_log_untouched() {
        let mut tracklog = log(vec![Point::new(1.0, 0.0), Point::new(1.001, 0.0)]);
        let before = tracklog.clone();

        assert!(matches!(
            Interpolate::new(0.0).run(&mut tracklog),
            Err(Error::InvalidSpacing(_))
        ));
        let failing = Interpolate::new(10.0).with_service(Arc::new(FailingService));
        assert!(failing.run(&mut tracklog).is_err());
        assert_eq!(tracklog, before);
    }
}

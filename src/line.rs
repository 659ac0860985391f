//! Line primitive: a directed pair of consecutive points.
//!
//! Lines are derived fresh from a point slice for every operation and borrow
//! their endpoints from it; they never span two slices.

use chrono::Duration;

use crate::geo_utils::{longitude_delta, wgs84_to_mercator, wrap_longitude, DistanceFn};
use crate::Point;

/// Two adjacent points of a route with precomputed length, duration and speed.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    /// Index of `a` in the source slice (`b` is at `index + 1`)
    pub index: usize,
    pub a: &'a Point,
    pub b: &'a Point,
    /// Length in meters under the distance function used to build the line
    pub distance: f64,
    /// Time from `a` to `b`, when both carry timestamps
    pub duration: Option<Duration>,
    /// Meters per second, when both carry timestamps (0 for a zero duration)
    pub speed: Option<f64>,
}

/// Build the N-1 lines of an N-point sequence.
pub fn lines<'a>(points: &'a [Point], distance_fn: &dyn DistanceFn) -> Vec<Line<'a>> {
    points
        .windows(2)
        .enumerate()
        .map(|(index, w)| Line::new(index, &w[0], &w[1], distance_fn))
        .collect()
}

impl<'a> Line<'a> {
    pub fn new(index: usize, a: &'a Point, b: &'a Point, distance_fn: &dyn DistanceFn) -> Self {
        let distance = distance_fn.distance(a, b);
        let duration = match (a.time, b.time) {
            (Some(t1), Some(t2)) => Some(t2 - t1),
            _ => None,
        };
        let speed = duration.map(|d| {
            let secs = seconds(d);
            if secs != 0.0 {
                distance / secs
            } else {
                0.0
            }
        });

        Self {
            index,
            a,
            b,
            distance,
            duration,
            speed,
        }
    }

    /// Point at `ratio` of the way from `a` to `b`.
    #[inline]
    pub fn interpolate(&self, ratio: f64) -> Point {
        interpolate(self.a, self.b, ratio)
    }

    /// Closest point on this line to `p`.
    pub fn closest_point(&self, p: &Point) -> Point {
        self.locate(p).0
    }

    /// Closest point on this line to `p`, with its clamped projection parameter.
    ///
    /// The dot product is taken in Web Mercator meters, with longitudes unwrapped
    /// relative to `a`, so lat/lon distortion does not skew the projection. A
    /// parameter of exactly 0 or 1 means the endpoint itself is returned.
    pub fn locate(&self, p: &Point) -> (Point, f64) {
        let a = self.a;
        let b = self.b;
        let (ax, ay) = wgs84_to_mercator(a.latitude, a.longitude);
        let (bx, by) = wgs84_to_mercator(
            b.latitude,
            a.longitude + longitude_delta(a.longitude, b.longitude),
        );
        let (px, py) = wgs84_to_mercator(
            p.latitude,
            a.longitude + longitude_delta(a.longitude, p.longitude),
        );

        let dx = bx - ax;
        let dy = by - ay;
        let len_sq = dx * dx + dy * dy;
        if len_sq == 0.0 {
            return (*a, 0.0);
        }

        let t = ((px - ax) * dx + (py - ay) * dy) / len_sq;
        if t <= 0.0 {
            (*a, 0.0)
        } else if t >= 1.0 {
            (*b, 1.0)
        } else {
            (interpolate(a, b, t), t)
        }
    }
}

/// Linear interpolation between two points.
///
/// Latitude and longitude are always interpolated; elevation and time only when
/// both endpoints carry them. A ratio of 0 (or less) returns `a` and a ratio of
/// 1 (or more) returns `b` unchanged.
///
/// # Example
/// ```
/// use track_milestones::{interpolate, Point};
///
/// let a = Point::new(0.0, 0.0).with_elevation(100.0);
/// let b = Point::new(1.0, 2.0).with_elevation(200.0);
/// let mid = interpolate(&a, &b, 0.5);
/// assert_eq!(mid.latitude, 0.5);
/// assert_eq!(mid.longitude, 1.0);
/// assert_eq!(mid.elevation, Some(150.0));
/// ```
pub fn interpolate(a: &Point, b: &Point, ratio: f64) -> Point {
    if ratio <= 0.0 {
        return *a;
    }
    if ratio >= 1.0 {
        return *b;
    }

    let latitude = lerp(a.latitude, b.latitude, ratio);
    let longitude =
        wrap_longitude(a.longitude + longitude_delta(a.longitude, b.longitude) * ratio);
    let elevation = match (a.elevation, b.elevation) {
        (Some(e1), Some(e2)) => Some(lerp(e1, e2, ratio)),
        _ => None,
    };
    let time = match (a.time, b.time) {
        (Some(t1), Some(t2)) => Some(t1 + scale(t2 - t1, ratio)),
        _ => None,
    };

    Point {
        time,
        latitude,
        longitude,
        elevation,
    }
}

#[inline]
fn lerp(from: f64, to: f64, ratio: f64) -> f64 {
    from * (1.0 - ratio) + to * ratio
}

fn seconds(d: Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(nanos) => nanos as f64 / 1e9,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}

fn scale(d: Duration, ratio: f64) -> Duration {
    match d.num_nanoseconds() {
        Some(nanos) => Duration::nanoseconds((nanos as f64 * ratio).round() as i64),
        None => Duration::milliseconds((d.num_milliseconds() as f64 * ratio).round() as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::HorizontalDistance;
    use chrono::{TimeZone, Utc};

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    fn timed(lat: f64, lon: f64, secs: i64) -> Point {
        let time = Utc.timestamp_opt(1_620_000_000 + secs, 0).unwrap();
        Point::new(lat, lon).with_time(time)
    }

    #[test]
    fn test_lines_count_and_indices() {
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(0.001, 0.0),
            Point::new(0.002, 0.0),
        ];
        let lines = lines(&points, &HorizontalDistance);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].index, 1);
        assert!(std::ptr::eq(lines[1].a, &points[1]));
        assert!(lines[0].distance > 100.0 && lines[0].distance < 120.0);
    }

    #[test]
    fn test_lines_empty_and_single() {
        assert!(lines(&[], &HorizontalDistance).is_empty());
        assert!(lines(&[Point::new(1.0, 1.0)], &HorizontalDistance).is_empty());
    }

    #[test]
    fn test_duration_and_speed() {
        let points = vec![timed(0.0, 0.0, 0), timed(0.001, 0.0, 20)];
        let line = lines(&points, &HorizontalDistance)[0];
        assert_eq!(line.duration, Some(Duration::seconds(20)));
        let speed = line.speed.unwrap();
        assert!(approx_eq(speed, line.distance / 20.0, 1e-9));
    }

    #[test]
    fn test_zero_duration_speed_is_zero() {
        let points = vec![timed(0.0, 0.0, 5), timed(0.001, 0.0, 5)];
        let line = lines(&points, &HorizontalDistance)[0];
        assert_eq!(line.speed, Some(0.0));
    }

    #[test]
    fn test_untimed_line_has_no_speed() {
        let points = vec![timed(0.0, 0.0, 5), Point::new(0.001, 0.0)];
        let line = lines(&points, &HorizontalDistance)[0];
        assert!(line.duration.is_none());
        assert!(line.speed.is_none());
    }

    #[test]
    fn test_interpolate_endpoints() {
        let a = timed(25.17, 121.55, 0).with_elevation(10.0);
        let b = timed(25.18, 121.56, 60).with_elevation(20.0);
        assert_eq!(interpolate(&a, &b, 0.0), a);
        assert_eq!(interpolate(&a, &b, 1.0), b);
    }

    #[test]
    fn test_interpolate_time_is_proportional() {
        let a = timed(0.0, 0.0, 0);
        let b = timed(0.0, 0.001, 100);
        let p = interpolate(&a, &b, 0.25);
        assert_eq!(p.time, Some(a.time.unwrap() + Duration::seconds(25)));
    }

    #[test]
    fn test_interpolate_elevation_requires_both() {
        let a = Point::new(0.0, 0.0).with_elevation(10.0);
        let b = Point::new(0.0, 0.001);
        assert_eq!(interpolate(&a, &b, 0.5).elevation, None);
    }

    #[test]
    fn test_interpolate_across_antimeridian() {
        let a = Point::new(0.0, 179.9);
        let b = Point::new(0.0, -179.9);
        let mid = interpolate(&a, &b, 0.5);
        assert!(approx_eq(mid.longitude.abs(), 180.0, 1e-9));
        let quarter = interpolate(&a, &b, 0.25);
        assert!(approx_eq(quarter.longitude, 179.95, 1e-9));
    }

    #[test]
    fn test_closest_point_interior() {
        // East-west line along the equator, point north of its 40% mark
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.01);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        let (p, t) = line.locate(&Point::new(0.001, 0.004));
        assert!(approx_eq(t, 0.4, 1e-12));
        assert!(approx_eq(p.latitude, 0.0, 1e-12));
        assert!(approx_eq(p.longitude, 0.004, 1e-12));
    }

    #[test]
    fn test_closest_point_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.01);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        assert_eq!(line.locate(&Point::new(0.001, -0.005)), (a, 0.0));
        assert_eq!(line.locate(&Point::new(-0.001, 0.02)), (b, 1.0));
    }

    #[test]
    fn test_closest_point_at_endpoint_is_not_synthesized() {
        let a = Point::new(0.0, 0.0).with_elevation(5.0);
        let b = Point::new(0.001, 0.0).with_elevation(9.0);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        assert_eq!(line.closest_point(&b), b);
        assert_eq!(line.closest_point(&a), a);
    }

    #[test]
    fn test_degenerate_line_returns_a() {
        let a = Point::new(10.0, 10.0).with_elevation(1.0);
        let b = Point::new(10.0, 10.0).with_elevation(2.0);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        assert_eq!(line.distance, 0.0);
        assert_eq!(line.closest_point(&Point::new(11.0, 11.0)), a);
    }

    #[test]
    fn test_closest_point_is_idempotent() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.01);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        let once = line.closest_point(&Point::new(0.003, 0.006));
        let twice = line.closest_point(&once);
        assert!(approx_eq(once.latitude, twice.latitude, 1e-12));
        assert!(approx_eq(once.longitude, twice.longitude, 1e-12));

        // Diagonal line at mid latitude
        let c = Point::new(45.0, 7.0);
        let d = Point::new(45.01, 7.01);
        let diagonal = Line::new(0, &c, &d, &HorizontalDistance);
        let once = diagonal.closest_point(&Point::new(45.008, 7.001));
        let twice = diagonal.closest_point(&once);
        assert!(approx_eq(once.latitude, twice.latitude, 1e-6));
        assert!(approx_eq(once.longitude, twice.longitude, 1e-6));
    }

    #[test]
    fn test_closest_point_across_antimeridian() {
        let a = Point::new(0.0, 179.99);
        let b = Point::new(0.0, -179.99);
        let line = Line::new(0, &a, &b, &HorizontalDistance);
        let (p, t) = line.locate(&Point::new(0.001, 180.0));
        assert!(approx_eq(t, 0.5, 1e-9));
        assert!(approx_eq(p.longitude.abs(), 180.0, 1e-9));
    }
}

//! Place kilometer markers along a short hiking route.
//!
//! Run with: cargo run --example place_milestones

use track_milestones::{
    place_milestones, Command, Direction, MilestoneOptions, Milestones, NameTemplate, Point,
    ReSegment, Segment, Track, TrackLog, WayPoint,
};

fn main() {
    // ~3.3km north-east through Yangmingshan, one point every ~110m
    let route: Vec<Point> = (0..=30)
        .map(|i| {
            let t = i as f64;
            Point::new(25.1500 + t * 0.0008, 121.5400 + t * 0.0005)
                .with_elevation(400.0 + t * 12.0)
        })
        .collect();

    let mut waypoints = vec![
        WayPoint::new(Point::new(25.1620, 121.5476)).with_name("Pavilion"),
        WayPoint::new(Point::new(25.1700, 121.5600)).with_name("Off route"),
    ];

    let namer = NameTemplate::parse("{km:.1}K").unwrap();

    println!("Milestone Placement Examples\n");

    // Every 500m from the trailhead
    let options = MilestoneOptions {
        spacing: 500.0,
        ..MilestoneOptions::default()
    };
    println!("1. Every {}m, forward:", options.spacing);
    let report = place_milestones(&route, &mut [], &options, &namer, None).unwrap();
    for w in &report.waypoints {
        println!(
            "   {:>6} at ({:.5}, {:.5}) elev {:.0}m",
            w.name_or_default(),
            w.point.latitude,
            w.point.longitude,
            w.point.elevation.unwrap_or_default()
        );
    }

    // Counted from the summit
    let reverse = MilestoneOptions {
        direction: Direction::Reverse,
        ..options.clone()
    };
    let report = place_milestones(&route, &mut [], &reverse, &namer, None).unwrap();
    println!("\n2. Reverse: {} milestones, first at ({:.5}, {:.5})",
        report.waypoints.len(),
        report.waypoints[0].point.latitude,
        report.waypoints[0].point.longitude);

    // Snap the grid to the pavilion
    let fitted = MilestoneOptions {
        fit_waypoints: true,
        ..options.clone()
    };
    let report = place_milestones(&route, &mut waypoints, &fitted, &namer, None).unwrap();
    println!("\n3. Fitted to waypoints: {} synthesized, {} merged", report.waypoints.len(), report.merged);
    for w in &waypoints {
        println!("   waypoint: {}", w.name_or_default());
    }

    // The same operations as track log commands
    let mut log = TrackLog::new(
        vec![Track::new(vec![Segment::new(route)])],
        vec![WayPoint::new(Point::new(25.1620, 121.5476)).with_name("Pavilion")],
    );
    let resegment = ReSegment::default();
    let n = resegment.run(&mut log).unwrap();
    println!("\n4. {}: {} tracks", resegment.name(), n);
    for track in &log.tracks {
        println!("   {} ({} points)", track.name.as_deref().unwrap_or("?"), track.point_count());
    }

    let milestones = Milestones::new(options).with_namer(namer);
    let n = milestones.run(&mut log).unwrap();
    println!("\n5. {}: {} milestones, {} waypoints in the log", milestones.name(), n, log.waypoints.len());
}

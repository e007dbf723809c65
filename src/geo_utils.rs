use chrono::{DateTime, Utc};
use itertools::Itertools;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RoutePoint {
    pub coordinate: Coordinate,
    pub timestamp: DateTime<Utc>,
}

/// Great-circle distance between two coordinates in meters (haversine).
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Sum of pairwise distances along a route. 0 for fewer than two points.
pub fn total_distance(points: &[RoutePoint]) -> f64 {
    points
        .iter()
        .tuple_windows()
        .map(|(a, b)| haversine_distance(&a.coordinate, &b.coordinate))
        .sum()
}

/// Movement-threshold acceptance rule. The first point (no previous one)
/// is always accepted.
pub fn should_save_point(
    new_point: &Coordinate,
    last_saved: Option<&Coordinate>,
    threshold_m: f64,
) -> bool {
    match last_saved {
        None => true,
        Some(last) => haversine_distance(last, new_point) > threshold_m,
    }
}

pub fn average_speed_kmh(points: &[RoutePoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let meters = total_distance(points);
    let duration = points.last().unwrap().timestamp - points.first().unwrap().timestamp;
    let hours = duration.num_milliseconds() as f64 / (1000.0 * 60.0 * 60.0);
    if hours <= 0.0 {
        return 0.0;
    }
    (meters / 1000.0) / hours
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

pub fn bounding_box(points: &[Coordinate]) -> Option<Bounds> {
    if points.is_empty() {
        return None;
    }
    let mut bounds = Bounds {
        min_lat: f64::MAX,
        max_lat: f64::MIN,
        min_lng: f64::MAX,
        max_lng: f64::MIN,
    };
    for p in points {
        bounds.min_lat = bounds.min_lat.min(p.latitude);
        bounds.max_lat = bounds.max_lat.max(p.latitude);
        bounds.min_lng = bounds.min_lng.min(p.longitude);
        bounds.max_lng = bounds.max_lng.max(p.longitude);
    }
    Some(bounds)
}

pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{} m", meters.round() as i64)
    }
}

//! Great-circle helpers over [`Coordinate`].

use ::geo::{HaversineBearing, HaversineDistance, Point};

use crate::models::Coordinate;

fn point(c: Coordinate) -> Point<f64> {
    Point::new(c.lng, c.lat)
}

/// Haversine distance between two coordinates, in meters.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }
    point(a).haversine_distance(&point(b))
}

/// Initial compass bearing from `a` to `b`, in degrees within `[0, 360)`.
/// Identical points yield `0.0`.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }
    let bearing = point(a).haversine_bearing(point(b)).rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

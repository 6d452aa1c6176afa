//! # Geographic Utilities
//!
//! Geometry helpers for parsed GPX tracks.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of one track line in meters |
//! | [`total_length`] | Summed length of all lines of a track |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`middle_point`] | Point at the middle index of a sequence |
//!
//! ## Example
//!
//! ```rust
//! use track_map::{GpsPoint, geo_utils};
//!
//! let line = vec![
//!     GpsPoint::new(-13.16, -72.54), // Machu Picchu
//!     GpsPoint::new(-13.53, -71.97), // Cusco
//!     GpsPoint::new(-15.84, -70.02), // Puno
//! ];
//!
//! let km = geo_utils::polyline_length(&line) / 1000.0;
//! println!("Track length: {:.0}km", km);
//!
//! assert_eq!(geo_utils::middle_point(&line), Some(line[1]));
//! ```
//!
//! All functions expect WGS84 coordinates in degrees.

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two GPS points in meters.
///
/// ```rust
/// use track_map::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0);
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Length of a polyline in meters. Empty or single-point lines return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Length of a multi-line track. Gaps between lines are not counted.
pub fn total_length(lines: &[Vec<GpsPoint>]) -> f64 {
    lines.iter().map(|line| polyline_length(line)).sum()
}

// =============================================================================
// Shape Functions
// =============================================================================

/// Bounding box of the given points.
///
/// For empty input the bounds are inverted (`min > max`) and intersect nothing.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

/// The point at index `len / 2`, or `None` for an empty sequence.
///
/// This is an index midpoint, not a distance midpoint: dense stretches of a
/// track pull it towards them.
#[inline]
pub fn middle_point(points: &[GpsPoint]) -> Option<GpsPoint> {
    points.get(points.len() / 2).copied()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(-33.45, -70.66);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(1.0, 0.0);
        assert!(approx_eq(haversine_distance(&a, &b), 111_195.0, 500.0));
    }

    #[test]
    fn test_polyline_length_degenerate() {
        assert_eq!(polyline_length(&[]), 0.0);
        assert_eq!(polyline_length(&[GpsPoint::new(1.0, 1.0)]), 0.0);
    }

    #[test]
    fn test_total_length_ignores_gaps() {
        let first = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(1.0, 0.0)];
        let second = vec![GpsPoint::new(10.0, 0.0), GpsPoint::new(11.0, 0.0)];
        let total = total_length(&[first.clone(), second]);
        assert!(approx_eq(total, 2.0 * polyline_length(&first), 1.0));
    }

    #[test]
    fn test_compute_bounds() {
        let points = vec![
            GpsPoint::new(-20.0, -65.0),
            GpsPoint::new(-18.5, -66.0),
            GpsPoint::new(-19.0, -64.5),
        ];
        let bounds = compute_bounds(&points);
        assert_eq!(bounds.min_lat, -20.0);
        assert_eq!(bounds.max_lat, -18.5);
        assert_eq!(bounds.min_lng, -66.0);
        assert_eq!(bounds.max_lng, -64.5);
    }

    #[test]
    fn test_empty_bounds_intersect_nothing() {
        let empty = compute_bounds(&[]);
        let world = Bounds { min_lat: -90.0, max_lat: 90.0, min_lng: -180.0, max_lng: 180.0 };
        assert!(!empty.intersects(&world));
    }

    #[test]
    fn test_middle_point() {
        let points: Vec<GpsPoint> = (0..4).map(|i| GpsPoint::new(i as f64, 0.0)).collect();
        assert_eq!(middle_point(&points), Some(GpsPoint::new(2.0, 0.0)));
        assert_eq!(middle_point(&points[..1]), Some(GpsPoint::new(0.0, 0.0)));
        assert_eq!(middle_point(&[]), None);
    }
}

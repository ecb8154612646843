//! Geodesy and planar geometry utilities
//!
//! Pure, stateless functions. Great-circle math is used for distances and
//! bearings; gate-line crossing tests are done in a local planar frame
//! (gate widths are kilometers, so projection error is negligible).
//! Degenerate input (coincident points, zero-length segments) yields
//! `None` / 0 rather than an error.

use crate::domain::types::GeoPoint;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator)
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Great-circle distance between two points in meters (haversine)
pub fn distance_m(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Initial bearing from `a` to `b` in degrees [0, 360)
pub fn bearing_deg(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Signed smallest rotation taking heading `from` onto heading `to`
///
/// Positive is clockwise. Range (-180, 180].
pub fn heading_difference_deg(from: f64, to: f64) -> f64 {
    let mut diff = (to - from) % 360.0;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff <= -180.0 {
        diff += 360.0;
    }
    diff
}

/// Signed perpendicular offset in meters of `point` from the great-circle
/// leg `start` -> `end`
///
/// Positive means the point lies right of the leg when facing `end`.
pub fn cross_track_distance_m(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> f64 {
    let d13 = distance_m(start, point) / EARTH_RADIUS_M;
    let brg13 = bearing_deg(start, point).to_radians();
    let brg12 = bearing_deg(start, end).to_radians();

    (d13.sin() * (brg13 - brg12).sin()).asin() * EARTH_RADIUS_M
}

/// Offset in meters of `point` along the great-circle leg `start` -> `end`
pub fn along_track_distance_m(start: GeoPoint, end: GeoPoint, point: GeoPoint) -> f64 {
    let d13 = distance_m(start, point) / EARTH_RADIUS_M;
    let xtd = cross_track_distance_m(start, end, point) / EARTH_RADIUS_M;

    (d13.cos() / xtd.cos()).clamp(-1.0, 1.0).acos() * EARTH_RADIUS_M
}

/// A point in a local planar frame, meters east/north of a reference point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPoint {
    pub x: f64,
    pub y: f64,
}

/// Project a geographic point into the local meter frame anchored at `reference`
pub fn to_local(reference: GeoPoint, point: GeoPoint) -> LocalPoint {
    let cos_lat = reference.latitude.to_radians().cos();
    LocalPoint {
        x: (point.longitude - reference.longitude) * cos_lat * METERS_PER_DEGREE,
        y: (point.latitude - reference.latitude) * METERS_PER_DEGREE,
    }
}

/// Intersection point of two planar segments `p1->p2` and `q1->q2`
///
/// Returns `None` for parallel, non-overlapping, or degenerate
/// (coincident-point) input.
pub fn segment_intersection(
    p1: LocalPoint,
    p2: LocalPoint,
    q1: LocalPoint,
    q2: LocalPoint,
) -> Option<LocalPoint> {
    let r = (p2.x - p1.x, p2.y - p1.y);
    let s = (q2.x - q1.x, q2.y - q1.y);

    let denom = r.0 * s.1 - r.1 * s.0;
    if denom.abs() < f64::EPSILON {
        return None;
    }

    let qp = (q1.x - p1.x, q1.y - p1.y);
    let t = (qp.0 * s.1 - qp.1 * s.0) / denom;
    let u = (qp.0 * r.1 - qp.1 * r.0) / denom;

    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }

    Some(LocalPoint { x: p1.x + t * r.0, y: p1.y + t * r.1 })
}

/// Interpolation fraction t in [0, 1] of `point` along the planar segment
/// `p1->p2`
///
/// A zero-length segment yields 0.
pub fn fraction_along(p1: LocalPoint, p2: LocalPoint, point: LocalPoint) -> f64 {
    let d = (p2.x - p1.x, p2.y - p1.y);
    let len_sq = d.0 * d.0 + d.1 * d.1;
    if len_sq < f64::EPSILON {
        return 0.0;
    }

    let t = ((point.x - p1.x) * d.0 + (point.y - p1.y) * d.1) / len_sq;
    t.clamp(0.0, 1.0)
}

use super::{Point2, Vector2};

/// Bearing from `from` to `to` in degrees.
///
/// North (+y) is 0°, angles grow clockwise (east = 90°), range `[0, 360)`.
/// Coincident points give 0°.
#[must_use]
pub fn azimuth_deg(from: &Point2, to: &Point2) -> f64 {
    let d = to - from;
    let az = d.x.atan2(d.y).to_degrees();
    if az < 0.0 {
        az + 360.0
    } else {
        az
    }
}

/// Acute angle between the lines carrying `u` and `v`, in degrees `[0, 90]`.
///
/// NaN when either vector is zero-length or contains NaN.
#[must_use]
pub fn line_angle_deg(u: &Vector2, v: &Vector2) -> f64 {
    let denom = u.norm() * v.norm();
    if !denom.is_finite() || denom <= 0.0 {
        return f64::NAN;
    }
    let cos = (u.dot(v).abs() / denom).min(1.0);
    cos.acos().to_degrees()
}

/// How far the line carrying `edge` deviates from the normal of `sight`, in degrees.
///
/// 0° means the edge is perpendicular to the sightline (a wall facing it
/// head on), 90° means the edge runs along the sightline.
#[must_use]
pub fn normal_deviation_deg(edge: &Vector2, sight: &Vector2) -> f64 {
    90.0 - line_angle_deg(edge, sight)
}

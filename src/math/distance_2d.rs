use super::Point2;

/// Squared Euclidean distance between two points.
#[must_use]
pub fn dist2(a: &Point2, b: &Point2) -> f64 {
    nalgebra::distance_squared(a, b)
}

/// Returns the point of segment `a → b` closest to `p`.
///
/// NaN endpoints propagate into the result.
#[must_use]
pub fn closest_point_on_segment(p: &Point2, a: &Point2, b: &Point2) -> Point2 {
    let d = b - a;
    let len_sq = d.norm_squared();

    if len_sq < 1e-20 {
        // Degenerate segment (zero length).
        return *a;
    }

    // Project point onto the infinite line, clamp to [0, 1].
    let t = ((p - a).dot(&d) / len_sq).clamp(0.0, 1.0);
    a + d * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::nan_point;

    const TOL: f64 = 1e-10;

    #[test]
    fn closest_point_projects_inside_segment() {
        let c = closest_point_on_segment(
            &Point2::new(1.0, 1.0),
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 0.0),
        );
        assert!((c.x - 1.0).abs() < TOL && c.y.abs() < TOL);
    }

    #[test]
    fn closest_point_on_degenerate_segment_is_endpoint() {
        let a = Point2::new(0.0, 0.0);
        let c = closest_point_on_segment(&Point2::new(3.0, 4.0), &a, &a);
        assert_eq!(c, a);
        assert!((dist2(&Point2::new(3.0, 4.0), &c) - 25.0).abs() < TOL);
    }

    #[test]
    fn closest_point_clamps_to_far_endpoint() {
        let c = closest_point_on_segment(
            &Point2::new(9.0, 3.0),
            &Point2::new(0.0, 0.0),
            &Point2::new(4.0, 0.0),
        );
        assert!((c.x - 4.0).abs() < TOL && c.y.abs() < TOL);
    }

    #[test]
    fn closest_point_with_nan_endpoint_is_nan() {
        let c = closest_point_on_segment(&Point2::new(1.0, 1.0), &Point2::new(0.0, 0.0), &nan_point());
        assert!(c.x.is_nan());
    }

    #[test]
    fn dist2_is_squared() {
        assert!((dist2(&Point2::new(0.0, 0.0), &Point2::new(3.0, 4.0)) - 25.0).abs() < TOL);
    }
}

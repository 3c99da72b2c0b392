//! The shielding predicate: does urban vertex W block the line of sight
//! from urban vertex V to flammable point F?

use tracing::trace;

use crate::config::InterfaceParams;
use crate::math::angle_2d::normal_deviation_deg;
use crate::math::Point2;

use super::ring::VertexTriplet;

/// A candidate protector and the two boundary points adjacent to it.
#[derive(Debug, Clone, Copy)]
pub struct Shield {
    pub point: Point2,
    pub prev: Point2,
    pub next: Point2,
}

impl From<&VertexTriplet> for Shield {
    fn from(t: &VertexTriplet) -> Self {
        Self {
            point: t.point,
            prev: t.prev,
            next: t.next,
        }
    }
}

/// Outcome of every rule for one `(V, F, W)` evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionTrace {
    /// Both legs lie within the search radius.
    pub reach: bool,
    /// `|VW| + |WF|` stays within the triangle threshold of `|VF|`.
    pub triangle: bool,
    /// Neither leg is a sliver of the V-W-F perimeter.
    pub legs: bool,
    /// A wall at W faces the sightline closely enough.
    pub angle: bool,
}

impl DecisionTrace {
    #[must_use]
    pub fn shields(&self) -> bool {
        self.reach && self.triangle && self.legs && self.angle
    }
}

/// Thresholds of the shielding predicate.
///
/// Any NaN reaching a rule makes that rule fail, so missing ring neighbours
/// or sentinel coordinates never shield.
#[derive(Debug, Clone, Copy)]
pub struct ProtectionTest {
    pub min_leg_fraction: f64,
    pub max_distance: f64,
    pub triangle_threshold: f64,
    pub angle_threshold_deg: f64,
    pub epsilon: f64,
    pub log_decisions: bool,
}

impl ProtectionTest {
    #[must_use]
    pub fn from_params(params: &InterfaceParams) -> Self {
        Self {
            min_leg_fraction: params.min_leg_fraction,
            max_distance: params.search_radius,
            triangle_threshold: params.triangle_threshold,
            angle_threshold_deg: params.angle_threshold_deg,
            epsilon: params.sentinels.small_n,
            log_decisions: params.log_decisions,
        }
    }

    /// Evaluates every rule for protector `w` between `v` and `f`.
    #[must_use]
    pub fn evaluate(&self, v: &Point2, f: &Point2, w: &Shield) -> DecisionTrace {
        let vw = nalgebra::distance(v, &w.point);
        let wf = nalgebra::distance(&w.point, f);
        let vf = nalgebra::distance(v, f);

        let reach = vw <= self.max_distance && wf <= self.max_distance;
        let triangle = vf > self.epsilon && vw + wf <= self.triangle_threshold * vf + self.epsilon;
        let legs = vw.min(wf) >= self.min_leg_fraction * (vw + wf + vf);

        let sight = f - v;
        let deviation_prev = normal_deviation_deg(&(w.point - w.prev), &sight);
        let deviation_next = normal_deviation_deg(&(w.next - w.point), &sight);
        let angle = !deviation_prev.is_nan()
            && !deviation_next.is_nan()
            && deviation_prev.min(deviation_next) <= self.angle_threshold_deg;

        DecisionTrace {
            reach,
            triangle,
            legs,
            angle,
        }
    }

    /// Returns `true` if `w` shields `v` from `f`.
    #[must_use]
    pub fn decide(&self, v: &Point2, f: &Point2, w: &Shield) -> bool {
        let result = self.evaluate(v, f, w);
        if self.log_decisions {
            trace!(
                vx = v.x,
                vy = v.y,
                fx = f.x,
                fy = f.y,
                wx = w.point.x,
                wy = w.point.y,
                reach = result.reach,
                triangle = result.triangle,
                legs = result.legs,
                angle = result.angle,
                "protection decision"
            );
        }
        result.shields()
    }
}

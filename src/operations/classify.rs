//! Per-vertex interface classification.
//!
//! For every urban vertex V the classifier walks its K nearest flammable
//! vertices. Each flammable vertex F is looked at from three viewpoints
//! (F itself and the closest points to V on the two boundary edges leaving
//! F). A viewpoint is protected when any urban candidate near V or near the
//! viewpoint passes the [`ProtectionTest`]. V is an interface vertex unless
//! every viewpoint of every flammable neighbour is protected.

use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::InterfaceParams;
use crate::error::{Result, StructuralError};
use crate::geometry::{VertexRecord, VertexSet};
use crate::math::angle_2d::azimuth_deg;
use crate::math::distance_2d::{closest_point_on_segment, dist2};
use crate::math::{is_finite_point, Point2};

use super::decision::{ProtectionTest, Shield};
use super::neighbors::{Neighbor, NeighborIndex, NeighborTable};
use super::ring::{triplet, VertexTriplet};

/// Where a flammable neighbour is seen from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewpoint {
    /// The flammable vertex itself.
    Vertex,
    /// Closest point to V on the edge towards the previous ring vertex.
    RingPrev,
    /// Closest point to V on the edge towards the next ring vertex.
    RingNext,
}

impl Viewpoint {
    pub const ALL: [Self; 3] = [Self::Vertex, Self::RingPrev, Self::RingNext];

    /// Resolves the viewpoint for urban vertex `v`. Edge viewpoints fall
    /// back to the vertex itself when the part has a single point.
    #[must_use]
    pub fn locate(self, v: &Point2, f: &VertexTriplet) -> Point2 {
        let end = match self {
            Self::Vertex => return f.point,
            Self::RingPrev => f.prev,
            Self::RingNext => f.next,
        };
        if is_finite_point(&end) {
            closest_point_on_segment(v, &f.point, &end)
        } else {
            f.point
        }
    }
}

/// Which urban neighbourhood supplies protector candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectorGroup {
    /// The KF nearest urban vertices of V.
    NeighborsOfV,
    /// The KF nearest urban vertices of the current viewpoint.
    NeighborsOfF,
}

impl ProtectorGroup {
    pub const ALL: [Self; 2] = [Self::NeighborsOfV, Self::NeighborsOfF];
}

/// The closest unprotected flammable neighbour found so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    /// Distance from V to the flammable vertex.
    pub distance: f64,
    /// Bearing from V to the nearest viewpoint, degrees clockwise from north.
    pub azimuth: f64,
    /// Feature of the flammable vertex.
    pub feature_id: u32,
    pub vertex_id: u32,
}

/// Exposure tracking for one urban vertex. Starts at the "protected"
/// ceiling and only ever tightens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureState {
    ceiling: f64,
    best: Option<Exposure>,
}

impl ExposureState {
    #[must_use]
    pub fn new(ceiling: f64) -> Self {
        Self {
            ceiling,
            best: None,
        }
    }

    /// Current tracked distance; the ceiling while nothing is exposed.
    #[must_use]
    pub fn distance(&self) -> f64 {
        self.best.map_or(self.ceiling, |e| e.distance)
    }

    #[must_use]
    pub fn best(&self) -> Option<Exposure> {
        self.best
    }

    /// Adopts `candidate` if it is strictly closer. Returns whether it did.
    pub fn tighten(&mut self, candidate: Exposure) -> bool {
        if candidate.distance < self.distance() {
            self.best = Some(candidate);
            true
        } else {
            false
        }
    }
}

/// Classification result of one urban vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexClassification {
    pub vertex_id: u32,
    pub is_interface: bool,
    pub exposure: Option<Exposure>,
    /// Rank-1 flammable neighbour (sentinel when none is in range).
    pub nearest: Neighbor,
    /// Flammable ranks whose three viewpoints were all protected.
    pub protected_ranks: usize,
}

/// Classifier output, indexed by urban vertex id (row 0 is the sentinel).
#[derive(Debug, Clone)]
pub struct Classification {
    rows: Vec<VertexClassification>,
}

impl Classification {
    #[must_use]
    pub fn rows(&self) -> &[VertexClassification] {
        &self.rows
    }

    #[must_use]
    pub fn get(&self, vertex_id: u32) -> Option<&VertexClassification> {
        self.rows.get(usize::try_from(vertex_id).ok()?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of interface vertices.
    #[must_use]
    pub fn interface_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_interface).count()
    }

    /// Urban vertices that had a flammable neighbour in range but were
    /// protected from all of them.
    #[must_use]
    pub fn protected_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| !r.is_interface && !r.nearest.is_sentinel())
            .count()
    }
}

/// Classifies every urban vertex as interface or protected.
pub struct ClassifyInterface<'a> {
    urban: &'a VertexSet,
    flammable: &'a VertexSet,
    params: &'a InterfaceParams,
}

impl<'a> ClassifyInterface<'a> {
    #[must_use]
    pub fn new(urban: &'a VertexSet, flammable: &'a VertexSet, params: &'a InterfaceParams) -> Self {
        Self {
            urban,
            flammable,
            params,
        }
    }

    /// Runs the classification.
    ///
    /// # Errors
    ///
    /// Returns a `StructuralError` when a neighbour table does not line up
    /// with the urban vertex set or references a vertex that does not exist.
    pub fn execute(&self) -> Result<Classification> {
        let radius = self.params.search_radius;
        let big_n = self.params.sentinels.big_n;

        let flammable_index = NeighborIndex::build(self.flammable, radius, big_n);
        let urban_index = NeighborIndex::build(self.urban, radius, big_n);

        let flammable_of_v = flammable_index.query_set(self.urban, self.params.k, false);
        let urban_of_v = urban_index.query_set(self.urban, self.params.kf, true);
        for (table, rows) in [
            ("flammable neighbour table", flammable_of_v.rows()),
            ("urban neighbour table", urban_of_v.rows()),
        ] {
            if rows != self.urban.len() {
                return Err(StructuralError::VertexIndexMismatch {
                    table,
                    rows,
                    expected: self.urban.len(),
                }
                .into());
            }
        }

        let pass = ClassifierPass {
            urban: self.urban,
            flammable: self.flammable,
            urban_index: &urban_index,
            flammable_of_v: &flammable_of_v,
            urban_of_v: &urban_of_v,
            test: ProtectionTest::from_params(self.params),
            kf: self.params.kf,
            ceiling: self.params.sentinels.pos_value,
        };

        let rows: Vec<VertexClassification> = maybe_par_iter!(self.urban.records())
            .map(|record| pass.classify(record))
            .collect::<Result<_>>()?;

        let classification = Classification { rows };
        info!(
            urban = self.urban.real().len(),
            flammable = self.flammable.real().len(),
            interface = classification.interface_count(),
            protected = classification.protected_count(),
            "classified urban vertices"
        );
        Ok(classification)
    }
}

/// Read-only state shared by every vertex of one classification run.
struct ClassifierPass<'a> {
    urban: &'a VertexSet,
    flammable: &'a VertexSet,
    urban_index: &'a NeighborIndex,
    flammable_of_v: &'a NeighborTable,
    urban_of_v: &'a NeighborTable,
    test: ProtectionTest,
    kf: usize,
    ceiling: f64,
}

impl ClassifierPass<'_> {
    fn classify(&self, record: &VertexRecord) -> Result<VertexClassification> {
        let row = usize::try_from(record.vertex_id).unwrap_or(usize::MAX);
        let flammable_neighbors = self.flammable_of_v.row(row);
        let nearest = flammable_neighbors.first().copied().unwrap_or(Neighbor {
            vertex_id: 0,
            distance: self.ceiling,
        });

        let mut state = ExposureState::new(self.ceiling);
        let mut protected_ranks = 0;
        let mut not_interface = true;

        if !record.is_sentinel() {
            let v = record.point;
            let near_v = self.urban_of_v.row(row);
            for neighbor in flammable_neighbors {
                // Missing ranks have nothing to be exposed to.
                if neighbor.is_sentinel() {
                    protected_ranks += 1;
                    continue;
                }
                let f = triplet(self.flammable, neighbor.vertex_id)?;
                let viewpoints = Viewpoint::ALL.map(|vp| vp.locate(&v, &f));

                let mut three_times_protected = true;
                for p in &viewpoints {
                    if !self.viewpoint_protected(&v, p, near_v)? {
                        three_times_protected = false;
                        break;
                    }
                }

                if three_times_protected {
                    protected_ranks += 1;
                    continue;
                }
                not_interface = false;
                let closest = viewpoints
                    .iter()
                    .min_by(|a, b| dist2(&v, a).total_cmp(&dist2(&v, b)))
                    .copied()
                    .unwrap_or(f.point);
                state.tighten(Exposure {
                    distance: dist2(&v, &closest).sqrt(),
                    azimuth: azimuth_deg(&v, &closest),
                    feature_id: f.feature_id,
                    vertex_id: f.vertex_id,
                });
            }
            debug!(
                vertex_id = record.vertex_id,
                protected_ranks,
                exposed = !not_interface,
                distance = state.distance(),
                "vertex classified"
            );
        }

        Ok(VertexClassification {
            vertex_id: record.vertex_id,
            is_interface: !not_interface && !nearest.is_sentinel(),
            exposure: state.best(),
            nearest,
            protected_ranks,
        })
    }

    /// `true` if any candidate of either protector group shields `v` from `p`.
    fn viewpoint_protected(&self, v: &Point2, p: &Point2, near_v: &[Neighbor]) -> Result<bool> {
        for group in ProtectorGroup::ALL {
            let near_p;
            let candidates = match group {
                ProtectorGroup::NeighborsOfV => near_v,
                ProtectorGroup::NeighborsOfF => {
                    near_p = self.urban_index.query_point(p, self.kf, None);
                    near_p.as_slice()
                }
            };
            for w in candidates {
                // Sentinels are sorted last.
                if w.is_sentinel() {
                    break;
                }
                let shield = Shield::from(&triplet(self.urban, w.vertex_id)?);
                if self.test.decide(v, p, &shield) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

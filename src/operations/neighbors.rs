//! Radius-bounded k-nearest-neighbour search over a vertex set.

use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geometry::VertexSet;
use crate::math::{is_finite_point, Point2};

type IndexedVertex = GeomWithData<[f64; 2], u32>;

/// One neighbour hit: a vertex id and its distance to the query point.
///
/// A miss is reported as vertex 0 (the sentinel) at the sentinel distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub vertex_id: u32,
    pub distance: f64,
}

impl Neighbor {
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.vertex_id == 0
    }
}

/// Spatial index over the real vertices of one [`VertexSet`].
#[derive(Debug)]
pub struct NeighborIndex {
    tree: RTree<IndexedVertex>,
    radius: f64,
    miss: Neighbor,
}

impl NeighborIndex {
    /// Bulk-loads the real vertices of `set`. The sentinel is never indexed.
    #[must_use]
    pub fn build(set: &VertexSet, radius: f64, big_n: f64) -> Self {
        let items: Vec<IndexedVertex> = set
            .real()
            .iter()
            .map(|r| GeomWithData::new([r.point.x, r.point.y], r.vertex_id))
            .collect();
        debug!(layer = %set.layer(), size = items.len(), radius, "built neighbour index");
        Self {
            tree: RTree::bulk_load(items),
            radius,
            miss: Neighbor {
                vertex_id: 0,
                distance: big_n,
            },
        }
    }

    /// Number of indexed vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// The `k` nearest vertices to `p` within the search radius, nearest first.
    ///
    /// Equal distances are ordered by vertex id. `exclude` drops one id from
    /// the candidates (used for self-queries). The result always has exactly
    /// `k` entries; missing slots are filled with the sentinel miss.
    #[must_use]
    pub fn query_point(&self, p: &Point2, k: usize, exclude: Option<u32>) -> Vec<Neighbor> {
        let mut found: Vec<(f64, u32)> = Vec::with_capacity(k);
        if k > 0 && is_finite_point(p) {
            let r2 = self.radius * self.radius;
            for (item, d2) in self.tree.nearest_neighbor_iter_with_distance_2(&[p.x, p.y]) {
                if d2 > r2 {
                    break;
                }
                if Some(item.data) == exclude {
                    continue;
                }
                // Keep collecting ties with the k-th distance so the id
                // order below is independent of the tree layout.
                if found.len() >= k && d2 > found[k - 1].0 {
                    break;
                }
                found.push((d2, item.data));
            }
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.truncate(k);

        let mut out: Vec<Neighbor> = found
            .into_iter()
            .map(|(d2, vertex_id)| Neighbor {
                vertex_id,
                distance: d2.sqrt(),
            })
            .collect();
        out.resize(k, self.miss);
        out
    }

    /// Queries every record of `queries`, sentinel row included, so row `i`
    /// belongs to vertex id `i`. With `exclude_self` each vertex skips its own id.
    #[must_use]
    pub fn query_set(&self, queries: &VertexSet, k: usize, exclude_self: bool) -> NeighborTable {
        let rows: Vec<Vec<Neighbor>> = maybe_par_iter!(queries.records())
            .map(|r| {
                if r.is_sentinel() {
                    vec![self.miss; k]
                } else {
                    self.query_point(&r.point, k, exclude_self.then_some(r.vertex_id))
                }
            })
            .collect();
        NeighborTable {
            k,
            entries: rows.into_iter().flatten().collect(),
        }
    }
}

/// Fixed-width neighbour rows, one per query vertex.
#[derive(Debug, Clone)]
pub struct NeighborTable {
    k: usize,
    entries: Vec<Neighbor>,
}

impl NeighborTable {
    /// Neighbours per row.
    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.entries.len().checked_div(self.k).unwrap_or(0)
    }

    /// Row `i`, nearest first. Out-of-range rows are empty.
    #[must_use]
    pub fn row(&self, i: usize) -> &[Neighbor] {
        let start = i.saturating_mul(self.k);
        self.entries.get(start..start.saturating_add(self.k)).unwrap_or(&[])
    }
}

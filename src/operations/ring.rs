use crate::error::{Result, StructuralError};
use crate::geometry::VertexSet;
use crate::math::{nan_point, Point2};

/// Coordinates of the ring-adjacent vertices of one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingNeighbors {
    pub prev: Point2,
    pub next: Point2,
}

/// A vertex with its ring-adjacent points and owning feature.
#[derive(Debug, Clone, Copy)]
pub struct VertexTriplet {
    pub vertex_id: u32,
    pub feature_id: u32,
    pub point: Point2,
    pub prev: Point2,
    pub next: Point2,
}

/// Finds the predecessor and successor of `vertex_id` within its part,
/// wrapping around at the ring ends.
///
/// A part with a single vertex (including the sentinel) has no neighbours;
/// both points are NaN.
///
/// # Errors
///
/// Returns `StructuralError::UnknownVertex` if the id is not in the set.
pub fn ring_neighbors(set: &VertexSet, vertex_id: u32) -> Result<RingNeighbors> {
    let span = set.part_span(vertex_id).ok_or(StructuralError::UnknownVertex {
        layer: set.layer().name(),
        vertex_id,
    })?;
    if span.len() < 2 {
        return Ok(RingNeighbors {
            prev: nan_point(),
            next: nan_point(),
        });
    }

    let records = set.records();
    // part_span succeeded, so the id is a valid position.
    let position = usize::try_from(vertex_id).unwrap_or(span.start);
    let prev = if position == span.start { span.end - 1 } else { position - 1 };
    let next = if position + 1 == span.end { span.start } else { position + 1 };
    Ok(RingNeighbors {
        prev: records[prev].point,
        next: records[next].point,
    })
}

/// Looks up a vertex together with its ring neighbours.
///
/// # Errors
///
/// Returns `StructuralError::UnknownVertex` if the id is not in the set.
pub fn triplet(set: &VertexSet, vertex_id: u32) -> Result<VertexTriplet> {
    let neighbors = ring_neighbors(set, vertex_id)?;
    let record = set.get(vertex_id).ok_or(StructuralError::UnknownVertex {
        layer: set.layer().name(),
        vertex_id,
    })?;
    Ok(VertexTriplet {
        vertex_id,
        feature_id: record.feature_id,
        point: record.point,
        prev: neighbors.prev,
        next: neighbors.next,
    })
}

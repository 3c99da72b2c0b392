use std::collections::BTreeSet;

use tracing::info;

use crate::error::{Result, StructuralError};
use crate::geometry::PartKey;
use crate::math::Point2;

/// A table row reduced to what segment assembly needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TypedVertex {
    pub part: PartKey,
    pub point: Point2,
    pub vert_type: u32,
}

/// A polyline of consecutive vertices sharing part and type.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub part: PartKey,
    pub vert_type: u32,
    pub points: Vec<Point2>,
}

impl Segment {
    fn start(vertex: &TypedVertex, points: Vec<Point2>) -> Self {
        Self {
            part: vertex.part,
            vert_type: vertex.vert_type,
            points,
        }
    }
}

/// Groups typed vertices into polylines.
///
/// Vertices must be ordered by part, then ring position. A type change
/// inside a part closes the current run at the midpoint of the changing
/// edge and opens the next run there, so consecutive segments touch. A part
/// change closes the run outright. Runs shorter than two points and runs of
/// `max_type` or above are dropped.
#[derive(Debug, Clone, Copy)]
pub struct AssembleSegments {
    max_type: u32,
}

impl AssembleSegments {
    #[must_use]
    pub fn new(max_type: u32) -> Self {
        Self { max_type }
    }

    /// Runs the assembly.
    ///
    /// # Errors
    ///
    /// Returns `StructuralError::NonContiguousPart` when a part reappears
    /// after another part has started.
    pub fn execute(&self, vertices: &[TypedVertex]) -> Result<Vec<Segment>> {
        let mut segments = Vec::new();
        let mut current: Option<Segment> = None;
        let mut closed: BTreeSet<PartKey> = BTreeSet::new();

        for vertex in vertices {
            if closed.contains(&vertex.part) {
                return Err(StructuralError::NonContiguousPart {
                    part: vertex.part.to_string(),
                }
                .into());
            }
            let next = match current.take() {
                Some(mut run) if run.part == vertex.part && run.vert_type == vertex.vert_type => {
                    run.points.push(vertex.point);
                    run
                }
                Some(mut run) if run.part == vertex.part => {
                    let mid = run
                        .points
                        .last()
                        .map_or(vertex.point, |last| nalgebra::center(last, &vertex.point));
                    run.points.push(mid);
                    self.finish(run, &mut segments);
                    Segment::start(vertex, vec![mid, vertex.point])
                }
                Some(run) => {
                    closed.insert(run.part);
                    self.finish(run, &mut segments);
                    Segment::start(vertex, vec![vertex.point])
                }
                None => Segment::start(vertex, vec![vertex.point]),
            };
            current = Some(next);
        }
        if let Some(run) = current {
            self.finish(run, &mut segments);
        }

        info!(vertices = vertices.len(), segments = segments.len(), "assembled segments");
        Ok(segments)
    }

    fn finish(&self, run: Segment, segments: &mut Vec<Segment>) {
        if run.points.len() >= 2 && run.vert_type < self.max_type {
            segments.push(run);
        }
    }
}

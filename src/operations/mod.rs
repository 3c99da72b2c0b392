//! Pipeline stages: extraction, neighbour search, classification,
//! selection and segment assembly.

/// Iterates a slice in parallel when the `parallel` feature is on.
macro_rules! maybe_par_iter {
    ($slice:expr) => {{
        #[cfg(feature = "parallel")]
        {
            $slice.par_iter()
        }
        #[cfg(not(feature = "parallel"))]
        {
            $slice.iter()
        }
    }};
}

pub mod assemble;
pub mod classify;
pub mod decision;
pub mod extract;
pub mod neighbors;
pub mod ring;
pub mod select;
pub mod study_area;

pub use assemble::{AssembleSegments, Segment, TypedVertex};
pub use classify::{
    Classification, ClassifyInterface, Exposure, ExposureState, ProtectorGroup, VertexClassification,
    Viewpoint,
};
pub use decision::{DecisionTrace, ProtectionTest, Shield};
pub use extract::{ExtractOptions, ExtractVertices};
pub use neighbors::{Neighbor, NeighborIndex, NeighborTable};
pub use ring::{ring_neighbors, triplet, RingNeighbors, VertexTriplet};
pub use select::{BuildInterfaceTable, DistanceBands, InterfaceRow};
pub use study_area::StudyArea;

pub mod feature;
pub mod vertex;

pub use feature::{FeatureLayer, LayerRole, Polygon2, PolygonFeature};
pub use vertex::{PartKey, PartPacking, VertexRecord, VertexSet};

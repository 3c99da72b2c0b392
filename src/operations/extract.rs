use std::collections::{BTreeMap, HashSet};

use tracing::{info, warn};

use crate::config::{BufferedFlag, InterfaceParams};
use crate::error::{GeometryInputError, Result, StructuralError};
use crate::geometry::{FeatureLayer, LayerRole, PartKey, VertexRecord, VertexSet};
use crate::math::{is_finite_point, Point2};

/// Settings that shape vertex extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    /// Decimal places kept before deduplication.
    pub decimals: i32,
    /// Coordinate of the sentinel vertex.
    pub big_n: f64,
    /// Attribute marking buffered copies, if the layer has them.
    pub buffered: Option<&'a BufferedFlag>,
    /// Attributes copied onto each vertex.
    pub echo: &'a [String],
}

/// Flattens a polygon layer into a deduplicated [`VertexSet`].
///
/// Vertices keep their ring order. Coordinates are rounded, then rows with
/// the same `(x, y, part)` are collapsed to the first occurrence (this also
/// removes the closing point of closed rings). Ids are assigned 1..N in
/// extraction order and the sentinel is prepended as id 0.
#[derive(Debug)]
pub struct ExtractVertices<'a> {
    layer: &'a FeatureLayer,
    role: LayerRole,
    options: ExtractOptions<'a>,
}

impl<'a> ExtractVertices<'a> {
    #[must_use]
    pub fn new(layer: &'a FeatureLayer, role: LayerRole, options: ExtractOptions<'a>) -> Self {
        Self {
            layer,
            role,
            options,
        }
    }

    /// Takes the options for `role` from the run parameters. Only the urban
    /// layer carries a buffered flag.
    #[must_use]
    pub fn from_params(layer: &'a FeatureLayer, role: LayerRole, params: &'a InterfaceParams) -> Self {
        let (buffered, echo) = match role {
            LayerRole::Urban => (Some(&params.buffered), params.echo.urban.as_slice()),
            LayerRole::Flammable => (None, params.echo.flammable.as_slice()),
        };
        Self::new(
            layer,
            role,
            ExtractOptions {
                decimals: params.coordinate_decimals,
                big_n: params.sentinels.big_n,
                buffered,
                echo,
            },
        )
    }

    /// Runs the extraction.
    ///
    /// # Errors
    ///
    /// Returns `GeometryInputError::EmptyLayer` when no feature has a vertex,
    /// `GeometryInputError::NonFiniteCoordinate` for NaN/inf input, and
    /// `StructuralError::FeatureIndexMismatch` when the highest feature index
    /// that produced vertices differs from the number of features.
    pub fn execute(&self) -> Result<VertexSet> {
        let layer_name = self.role.name();
        let declared = self.layer.len();
        let scale = 10_f64.powi(self.options.decimals);

        let mut records = vec![VertexRecord::sentinel(self.options.big_n)];
        let mut seen: HashSet<(u64, u64, PartKey)> = HashSet::new();
        let mut max_feature = 0_u32;
        let mut raw_count = 0_usize;

        for (index, feature) in self.layer.features.iter().enumerate() {
            let feature_id = to_u32(index + 1, "feature index", declared)?;
            if feature.is_empty() {
                warn!(layer = layer_name, feature_id, "feature has no vertices");
                continue;
            }

            let is_buffered = self.options.buffered.is_some_and(|flag| {
                feature.attributes.get(&flag.column).is_some_and(|v| *v == flag.value)
            });
            let extra: BTreeMap<String, String> = self
                .options
                .echo
                .iter()
                .filter_map(|key| feature.attributes.get(key).map(|v| (key.clone(), v.clone())))
                .collect();

            for (polygon_index, polygon) in feature.polygons.iter().enumerate() {
                let polygon_id = to_u32(polygon_index, "polygon index", declared)?;
                for (ring_index, ring) in polygon.rings().enumerate() {
                    let part = PartKey::new(feature_id, polygon_id, to_u32(ring_index, "ring index", declared)?);
                    for p in ring {
                        if !is_finite_point(p) {
                            return Err(GeometryInputError::NonFiniteCoordinate {
                                feature: index + 1,
                                x: p.x,
                                y: p.y,
                            }
                            .into());
                        }
                        raw_count += 1;
                        let x = round_to(p.x, scale);
                        let y = round_to(p.y, scale);
                        if seen.insert((x.to_bits(), y.to_bits(), part)) {
                            let vertex_id = to_u32(records.len(), "vertex id", declared)?;
                            records.push(VertexRecord {
                                point: Point2::new(x, y),
                                feature_id,
                                part,
                                vertex_id,
                                is_buffered,
                                extra: extra.clone(),
                            });
                        }
                    }
                }
            }
            max_feature = feature_id;
        }

        if records.len() == 1 {
            return Err(GeometryInputError::EmptyLayer {
                layer: self.layer.name.clone(),
            }
            .into());
        }
        if usize::try_from(max_feature).ok() != Some(declared) {
            return Err(StructuralError::FeatureIndexMismatch {
                layer: layer_name,
                max_feature,
                declared,
            }
            .into());
        }

        info!(
            layer = layer_name,
            features = declared,
            raw = raw_count,
            kept = records.len() - 1,
            "extracted vertices"
        );
        VertexSet::from_records(self.role, records)
    }
}

/// Rounds to the grid implied by `scale`, folding `-0.0` into `0.0`.
fn round_to(v: f64, scale: f64) -> f64 {
    (v * scale).round() / scale + 0.0
}

fn to_u32(value: usize, table: &'static str, expected: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        StructuralError::VertexIndexMismatch {
            table,
            rows: value,
            expected,
        }
        .into()
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::InterfaceError;
    use crate::geometry::{Polygon2, PolygonFeature};

    fn square(x0: f64, y0: f64, side: f64) -> Polygon2 {
        Polygon2::from_coords(&[
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
            (x0, y0),
        ])
    }

    fn options() -> ExtractOptions<'static> {
        ExtractOptions {
            decimals: 0,
            big_n: 1e6,
            buffered: None,
            echo: &[],
        }
    }

    #[test]
    fn closed_square_yields_four_vertices_and_sentinel() {
        let layer = FeatureLayer::new("urban", vec![PolygonFeature::new(vec![square(0.0, 0.0, 10.0)])]);
        let set = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap();
        assert_eq!(set.len(), 5);
        assert!(set.records()[0].is_sentinel());
        assert_eq!(set.records()[0].point, Point2::new(1e6, 1e6));
        let ids: Vec<u32> = set.real().iter().map(|r| r.vertex_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(set.real().iter().all(|r| r.part == PartKey::new(1, 0, 0)));
    }

    #[test]
    fn rounding_merges_close_points_within_a_part() {
        let poly = Polygon2::from_coords(&[(0.0, 0.0), (0.2, 0.1), (10.0, 0.0), (10.0, 10.0)]);
        let layer = FeatureLayer::new("urban", vec![PolygonFeature::new(vec![poly])]);
        let set = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap();
        assert_eq!(set.real().len(), 3);
    }

    #[test]
    fn decimals_keep_sub_unit_detail() {
        let poly = Polygon2::from_coords(&[(0.0, 0.0), (0.2, 0.1), (10.0, 0.0), (10.0, 10.0)]);
        let layer = FeatureLayer::new("urban", vec![PolygonFeature::new(vec![poly])]);
        let opts = ExtractOptions {
            decimals: 1,
            ..options()
        };
        let set = ExtractVertices::new(&layer, LayerRole::Urban, opts).execute().unwrap();
        assert_eq!(set.real().len(), 4);
        assert_eq!(set.real()[1].point, Point2::new(0.2, 0.1));
    }

    #[test]
    fn shared_corner_survives_in_both_parts() {
        let layer = FeatureLayer::new(
            "urban",
            vec![
                PolygonFeature::new(vec![square(0.0, 0.0, 10.0)]),
                PolygonFeature::new(vec![square(10.0, 0.0, 10.0)]),
            ],
        );
        let set = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap();
        assert_eq!(set.real().len(), 8);
        let shared = set
            .real()
            .iter()
            .filter(|r| r.point == Point2::new(10.0, 0.0))
            .count();
        assert_eq!(shared, 2);
        assert_eq!(set.part_count(), 3);
    }

    #[test]
    fn holes_and_parts_get_distinct_keys() {
        let mut with_hole = square(0.0, 0.0, 10.0);
        with_hole.interiors.push(vec![
            Point2::new(2.0, 2.0),
            Point2::new(4.0, 2.0),
            Point2::new(4.0, 4.0),
        ]);
        let layer = FeatureLayer::new(
            "flammable",
            vec![PolygonFeature::new(vec![with_hole, square(20.0, 0.0, 5.0)])],
        );
        let set = ExtractVertices::new(&layer, LayerRole::Flammable, options()).execute().unwrap();
        let parts: HashSet<PartKey> = set.real().iter().map(|r| r.part).collect();
        assert_eq!(
            parts,
            HashSet::from([PartKey::new(1, 0, 0), PartKey::new(1, 0, 1), PartKey::new(1, 1, 0)])
        );
    }

    #[test]
    fn buffered_flag_and_echo_attributes() {
        let flag = BufferedFlag::default();
        let echo = vec!["fid_1".to_owned()];
        let layer = FeatureLayer::new(
            "urban",
            vec![
                PolygonFeature::new(vec![square(0.0, 0.0, 10.0)]).with_attribute("fid_1", "7"),
                PolygonFeature::new(vec![square(-2.0, -2.0, 14.0)]).with_attribute("layer", "Buffered"),
            ],
        );
        let opts = ExtractOptions {
            buffered: Some(&flag),
            echo: &echo,
            ..options()
        };
        let set = ExtractVertices::new(&layer, LayerRole::Urban, opts).execute().unwrap();
        let first = &set.real()[0];
        assert!(!first.is_buffered);
        assert_eq!(first.extra.get("fid_1").map(String::as_str), Some("7"));
        let last = set.real().last().unwrap();
        assert!(last.is_buffered);
        assert!(last.extra.is_empty());
    }

    #[test]
    fn extraction_is_idempotent() {
        let layer = FeatureLayer::new(
            "urban",
            vec![
                PolygonFeature::new(vec![square(0.4, 0.6, 10.0), square(30.0, 0.0, 3.0)]),
                PolygonFeature::new(vec![square(10.0, 0.0, 10.0)]),
            ],
        );
        let a = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap();
        let b = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap();
        assert_eq!(a.records(), b.records());
    }

    #[test]
    fn empty_layer_is_input_error() {
        let layer = FeatureLayer::new("flam", vec![]);
        let err = ExtractVertices::new(&layer, LayerRole::Flammable, options()).execute().unwrap_err();
        assert!(matches!(err, InterfaceError::GeometryInput(GeometryInputError::EmptyLayer { .. })));
    }

    #[test]
    fn trailing_empty_feature_breaks_indexing() {
        let layer = FeatureLayer::new(
            "urban",
            vec![
                PolygonFeature::new(vec![square(0.0, 0.0, 10.0)]),
                PolygonFeature::new(vec![]),
            ],
        );
        let err = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Structural(StructuralError::FeatureIndexMismatch {
                max_feature: 1,
                declared: 2,
                ..
            })
        ));
    }

    #[test]
    fn nan_coordinate_is_input_error() {
        let poly = Polygon2::from_coords(&[(0.0, 0.0), (f64::NAN, 1.0), (1.0, 1.0)]);
        let layer = FeatureLayer::new("urban", vec![PolygonFeature::new(vec![poly])]);
        let err = ExtractVertices::new(&layer, LayerRole::Urban, options()).execute().unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::GeometryInput(GeometryInputError::NonFiniteCoordinate { feature: 1, .. })
        ));
    }
}

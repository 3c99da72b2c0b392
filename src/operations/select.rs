use std::collections::BTreeMap;

use tracing::info;

use crate::config::InterfaceParams;
use crate::error::{Result, StructuralError};
use crate::geometry::{PartKey, VertexSet};
use crate::math::angle_2d::azimuth_deg;
use crate::math::Point2;

use super::assemble::TypedVertex;
use super::classify::Classification;

/// Distance bands that turn an exposure distance into a vertex type.
///
/// Type 1 is direct interface (`d <= tolerance`), types `2..` follow the
/// band edges, and [`DistanceBands::max_type`] marks vertices beyond the
/// last edge or with no exposure at all.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceBands {
    tolerance: f64,
    edges: Vec<f64>,
}

impl DistanceBands {
    /// `edges` are the band upper bounds after the tolerance, ascending.
    #[must_use]
    pub fn new(tolerance: f64, edges: Vec<f64>) -> Self {
        Self { tolerance, edges }
    }

    #[must_use]
    pub fn from_params(params: &InterfaceParams) -> Self {
        let mut edges = params.bands.edges.clone();
        edges.push(params.outer_band());
        Self::new(params.tolerance, edges)
    }

    /// The "excluded" type, one past the last band.
    #[must_use]
    pub fn max_type(&self) -> u32 {
        u32::try_from(self.edges.len() + 2).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn vert_type(&self, distance: Option<f64>) -> u32 {
        let Some(d) = distance else {
            return self.max_type();
        };
        if d <= self.tolerance {
            return 1;
        }
        self.edges
            .iter()
            .position(|&edge| d <= edge)
            .and_then(|i| u32::try_from(i + 2).ok())
            .unwrap_or_else(|| self.max_type())
    }
}

/// One exported urban vertex with its classification and neighbourhood links.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceRow {
    pub vertex_id: u32,
    pub point: Point2,
    pub part: PartKey,
    pub feature_id: u32,
    pub is_interface: bool,
    /// Exposure distance; `None` when protected or out of range.
    pub distance: Option<f64>,
    /// Bearing towards the exposing flammable viewpoint.
    pub azimuth: Option<f64>,
    /// Feature of the exposing flammable vertex.
    pub exposing_feature: Option<u32>,
    /// Feature and distance of the nearest flammable vertex.
    pub nearest_feature: Option<u32>,
    pub nearest_distance: Option<f64>,
    pub vert_type: u32,
    /// Linked to the next row of the table.
    pub link_next: bool,
    /// Linked to the previous row of the table.
    pub link_prev: bool,
    pub length_next: Option<f64>,
    pub length_prev: Option<f64>,
    pub azimuth_next: Option<f64>,
    pub azimuth_prev: Option<f64>,
    /// Run number of consecutive linked rows.
    pub segment: Option<u32>,
    pub extra: BTreeMap<String, String>,
}

impl InterfaceRow {
    #[must_use]
    pub fn typed_vertex(&self) -> TypedVertex {
        TypedVertex {
            part: self.part,
            point: self.point,
            vert_type: self.vert_type,
        }
    }
}

/// Builds the exported interface table from a classification.
///
/// Buffered vertices and the sentinel are left out; rows are in vertex id
/// order, so each part is a contiguous run.
pub struct BuildInterfaceTable<'a> {
    urban: &'a VertexSet,
    flammable: &'a VertexSet,
    classification: &'a Classification,
    bands: DistanceBands,
}

impl<'a> BuildInterfaceTable<'a> {
    #[must_use]
    pub fn new(
        urban: &'a VertexSet,
        flammable: &'a VertexSet,
        classification: &'a Classification,
        bands: DistanceBands,
    ) -> Self {
        Self {
            urban,
            flammable,
            classification,
            bands,
        }
    }

    /// Runs the selection.
    ///
    /// # Errors
    ///
    /// Returns `StructuralError::VertexIndexMismatch` if the classification
    /// does not have one row per urban vertex.
    pub fn execute(&self) -> Result<Vec<InterfaceRow>> {
        if self.classification.len() != self.urban.len() {
            return Err(StructuralError::VertexIndexMismatch {
                table: "classification",
                rows: self.classification.len(),
                expected: self.urban.len(),
            }
            .into());
        }

        let mut rows: Vec<InterfaceRow> = Vec::with_capacity(self.urban.real().len());
        for (record, class) in self.urban.records().iter().zip(self.classification.rows()) {
            if record.is_sentinel() || record.is_buffered {
                continue;
            }
            let distance = class.exposure.map(|e| e.distance);
            let nearest = (!class.nearest.is_sentinel()).then_some(class.nearest);
            rows.push(InterfaceRow {
                vertex_id: record.vertex_id,
                point: record.point,
                part: record.part,
                feature_id: record.feature_id,
                is_interface: class.is_interface,
                distance,
                azimuth: class.exposure.map(|e| e.azimuth),
                exposing_feature: class.exposure.map(|e| e.feature_id),
                nearest_feature: nearest
                    .and_then(|n| self.flammable.get(n.vertex_id))
                    .map(|r| r.feature_id),
                nearest_distance: nearest.map(|n| n.distance),
                vert_type: self.bands.vert_type(distance),
                link_next: false,
                link_prev: false,
                length_next: None,
                length_prev: None,
                azimuth_next: None,
                azimuth_prev: None,
                segment: None,
                extra: record.extra.clone(),
            });
        }

        link_rows(&mut rows);
        number_segments(&mut rows);

        info!(
            rows = rows.len(),
            interface = rows.iter().filter(|r| r.is_interface).count(),
            segments = rows.iter().filter_map(|r| r.segment).max().unwrap_or(0),
            "built interface table"
        );
        Ok(rows)
    }
}

/// Fills lengths, azimuths and links between each row and its successor.
fn link_rows(rows: &mut [InterfaceRow]) {
    for i in 1..rows.len() {
        let (head, tail) = rows.split_at_mut(i);
        let a = &mut head[i - 1];
        let b = &mut tail[0];
        if a.part != b.part {
            continue;
        }
        let length = nalgebra::distance(&a.point, &b.point);
        a.length_next = Some(length);
        b.length_prev = Some(length);
        a.azimuth_next = Some(azimuth_deg(&a.point, &b.point));
        b.azimuth_prev = Some(azimuth_deg(&b.point, &a.point));

        let adjacent = b.vertex_id.abs_diff(a.vertex_id) <= 1;
        let linked = adjacent && (a.is_interface || b.is_interface);
        a.link_next = linked;
        b.link_prev = linked;
    }
}

/// Numbers maximal runs of linked rows 1, 2, ...
fn number_segments(rows: &mut [InterfaceRow]) {
    let mut current = 0;
    for row in rows {
        if !row.link_prev && !row.link_next {
            continue;
        }
        if !row.link_prev {
            current += 1;
        }
        row.segment = Some(current);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::error::InterfaceError;
    use crate::geometry::{FeatureLayer, LayerRole, Polygon2, PolygonFeature};
    use crate::operations::classify::ClassifyInterface;
    use crate::operations::extract::ExtractVertices;

    #[test]
    fn band_types() {
        let bands = DistanceBands::from_params(&InterfaceParams::default());
        assert_eq!(bands.max_type(), 5);
        assert_eq!(bands.vert_type(Some(0.0)), 1);
        assert_eq!(bands.vert_type(Some(3.0)), 1);
        assert_eq!(bands.vert_type(Some(50.0)), 2);
        assert_eq!(bands.vert_type(Some(100.0)), 2);
        assert_eq!(bands.vert_type(Some(200.0)), 3);
        assert_eq!(bands.vert_type(Some(400.0)), 4);
        assert_eq!(bands.vert_type(Some(501.0)), 5);
        assert_eq!(bands.vert_type(None), 5);
    }

    fn run(params: &InterfaceParams, urban: Vec<PolygonFeature>) -> Vec<InterfaceRow> {
        let urban_layer = FeatureLayer::new("urban", urban);
        let flammable_layer = FeatureLayer::new(
            "flammable",
            vec![PolygonFeature::new(vec![Polygon2::from_coords(&[
                (15.0, 0.0),
                (25.0, 0.0),
                (25.0, 10.0),
                (15.0, 10.0),
            ])])],
        );
        let urban = ExtractVertices::from_params(&urban_layer, LayerRole::Urban, params)
            .execute()
            .unwrap();
        let flammable = ExtractVertices::from_params(&flammable_layer, LayerRole::Flammable, params)
            .execute()
            .unwrap();
        let classification = ClassifyInterface::new(&urban, &flammable, params).execute().unwrap();
        BuildInterfaceTable::new(&urban, &flammable, &classification, DistanceBands::from_params(params))
            .execute()
            .unwrap()
    }

    fn urban_square() -> PolygonFeature {
        PolygonFeature::new(vec![Polygon2::from_coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
        ])])
    }

    #[test]
    fn links_follow_interface_rows() {
        let params = InterfaceParams {
            search_radius: 12.0,
            ..InterfaceParams::default()
        };
        let rows = run(&params, vec![urban_square()]);
        assert_eq!(rows.len(), 4);
        let ids: Vec<u32> = rows.iter().map(|r| r.vertex_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        // (0,0) far, (10,0) and (10,10) exposed, (0,10) far.
        let interface: Vec<bool> = rows.iter().map(|r| r.is_interface).collect();
        assert_eq!(interface, vec![false, true, true, false]);
        assert_eq!(rows[1].vert_type, 2);
        assert_eq!(rows[0].vert_type, 5);
        assert_eq!(rows[1].nearest_feature, Some(1));
        assert_eq!(rows[0].nearest_feature, None);

        let link_next: Vec<bool> = rows.iter().map(|r| r.link_next).collect();
        assert_eq!(link_next, vec![true, true, true, false]);
        let link_prev: Vec<bool> = rows.iter().map(|r| r.link_prev).collect();
        assert_eq!(link_prev, vec![false, true, true, true]);
        assert!(rows.iter().all(|r| r.segment == Some(1)));

        assert_abs_diff_eq!(rows[0].length_next.unwrap(), 10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[0].azimuth_next.unwrap(), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(rows[1].azimuth_prev.unwrap(), 270.0, epsilon = 1e-9);
        assert!(rows[0].length_prev.is_none());
        assert!(rows[3].length_next.is_none());
    }

    #[test]
    fn buffered_rows_are_dropped_and_break_links() {
        let params = InterfaceParams {
            search_radius: 12.0,
            ..InterfaceParams::default()
        };
        let buffered = PolygonFeature::new(vec![Polygon2::from_coords(&[
            (-1.0, -1.0),
            (11.0, -1.0),
            (11.0, 11.0),
            (-1.0, 11.0),
        ])])
        .with_attribute("layer", "Buffered");
        let rows = run(&params, vec![urban_square(), buffered]);
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|r| r.feature_id == 1));
    }

    #[test]
    fn separate_parts_never_link() {
        let params = InterfaceParams {
            search_radius: 12.0,
            ..InterfaceParams::default()
        };
        let second = PolygonFeature::new(vec![Polygon2::from_coords(&[
            (10.0, 20.0),
            (12.0, 20.0),
            (12.0, 22.0),
        ])]);
        let rows = run(&params, vec![urban_square(), second]);
        let last_of_first = rows.iter().position(|r| r.vertex_id == 4).unwrap();
        assert!(!rows[last_of_first].link_next);
        assert!(rows[last_of_first].length_next.is_none());
        assert!(!rows[last_of_first + 1].link_prev);
    }

    #[test]
    fn segments_restart_after_gap() {
        let mut rows: Vec<InterfaceRow> = (1..=5)
            .map(|i| InterfaceRow {
                vertex_id: i,
                point: Point2::new(f64::from(i), 0.0),
                part: PartKey::new(1, 0, 0),
                feature_id: 1,
                is_interface: i != 3,
                distance: None,
                azimuth: None,
                exposing_feature: None,
                nearest_feature: None,
                nearest_distance: None,
                vert_type: 1,
                link_next: false,
                link_prev: false,
                length_next: None,
                length_prev: None,
                azimuth_next: None,
                azimuth_prev: None,
                segment: None,
                extra: BTreeMap::new(),
            })
            .collect();
        // The id gap left by vertex 3 splits the run.
        rows.remove(2);
        link_rows(&mut rows);
        number_segments(&mut rows);
        let segments: Vec<Option<u32>> = rows.iter().map(|r| r.segment).collect();
        assert_eq!(segments, vec![Some(1), Some(1), Some(2), Some(2)]);
    }

    #[test]
    fn classification_size_is_checked() {
        let params = InterfaceParams::default();
        let layer = FeatureLayer::new("urban", vec![urban_square()]);
        let urban = ExtractVertices::from_params(&layer, LayerRole::Urban, &params)
            .execute()
            .unwrap();
        let other = FeatureLayer::new(
            "urban",
            vec![PolygonFeature::new(vec![Polygon2::from_coords(&[(0.0, 0.0), (1.0, 0.0)])])],
        );
        let small = ExtractVertices::from_params(&other, LayerRole::Urban, &params)
            .execute()
            .unwrap();
        let classification = ClassifyInterface::new(&small, &small, &params).execute().unwrap();
        let err = BuildInterfaceTable::new(&urban, &small, &classification, DistanceBands::from_params(&params))
            .execute()
            .unwrap_err();
        assert!(matches!(
            err,
            InterfaceError::Structural(StructuralError::VertexIndexMismatch { .. })
        ));
    }
}

//! End-to-end interface detection over two polygon layers.

use std::borrow::Cow;

use tracing::info;

use crate::config::InterfaceParams;
use crate::error::{GeometryInputError, InterfaceError, Result, Stage};
use crate::geometry::{FeatureLayer, LayerRole, VertexSet};
use crate::operations::{
    AssembleSegments, BuildInterfaceTable, Classification, ClassifyInterface, DistanceBands,
    ExtractVertices, InterfaceRow, Segment, StudyArea,
};

/// Everything produced by one run.
#[derive(Debug, Clone)]
pub struct InterfaceRun {
    /// Study area after snapping, if one was configured.
    pub study_area: Option<StudyArea>,
    pub urban: VertexSet,
    pub flammable: VertexSet,
    pub classification: Classification,
    pub table: Vec<InterfaceRow>,
    pub segments: Vec<Segment>,
}

/// Runs extraction, classification, selection and assembly in order.
///
/// Any failure is reported with the stage that raised it.
pub struct InterfacePipeline<'a> {
    params: &'a InterfaceParams,
}

impl<'a> InterfacePipeline<'a> {
    #[must_use]
    pub fn new(params: &'a InterfaceParams) -> Self {
        Self { params }
    }

    /// Runs the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for invalid parameters, otherwise an
    /// `InterfaceError::StageFailed` naming the stage that failed.
    pub fn run(&self, urban: &FeatureLayer, flammable: &FeatureLayer) -> Result<InterfaceRun> {
        self.params.validate()?;

        let study_area = self
            .params
            .study_area()
            .map(|area| area.snap_to_boundary(urban))
            .transpose()
            .map_err(|e| e.in_stage(Stage::StudyArea))?;
        let (urban, flammable) = match &study_area {
            Some(area) => {
                info!(
                    x0 = area.center().x,
                    y0 = area.center().y,
                    half_width = area.half_width(),
                    "applying study area"
                );
                let urban = area.clip_layer(urban);
                let flammable = area.clip_layer(flammable);
                for layer in [&urban, &flammable] {
                    if layer.is_empty() {
                        let err: InterfaceError = GeometryInputError::EmptyLayer {
                            layer: layer.name.clone(),
                        }
                        .into();
                        return Err(err.in_stage(Stage::StudyArea));
                    }
                }
                (Cow::Owned(urban), Cow::Owned(flammable))
            }
            None => (Cow::Borrowed(urban), Cow::Borrowed(flammable)),
        };

        let urban_vertices = ExtractVertices::from_params(&urban, LayerRole::Urban, self.params)
            .execute()
            .map_err(|e| e.in_stage(Stage::Extraction))?;
        let flammable_vertices = ExtractVertices::from_params(&flammable, LayerRole::Flammable, self.params)
            .execute()
            .map_err(|e| e.in_stage(Stage::Extraction))?;

        let classification = ClassifyInterface::new(&urban_vertices, &flammable_vertices, self.params)
            .execute()
            .map_err(|e| e.in_stage(Stage::Classification))?;

        let bands = DistanceBands::from_params(self.params);
        let max_type = bands.max_type();
        let table = BuildInterfaceTable::new(&urban_vertices, &flammable_vertices, &classification, bands)
            .execute()
            .map_err(|e| e.in_stage(Stage::Selection))?;

        let typed: Vec<_> = table.iter().map(InterfaceRow::typed_vertex).collect();
        let segments = AssembleSegments::new(max_type)
            .execute(&typed)
            .map_err(|e| e.in_stage(Stage::Assembly))?;

        Ok(InterfaceRun {
            study_area,
            urban: urban_vertices,
            flammable: flammable_vertices,
            classification,
            table,
            segments,
        })
    }
}

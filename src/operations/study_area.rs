use geo::{Area, BooleanOps, Closest, ClosestPoint, Coord, Point, Polygon, Rect};
use tracing::{info, warn};

use crate::error::{GeometryInputError, Result};
use crate::geometry::{FeatureLayer, Polygon2, PolygonFeature};
use crate::math::{Point2, TOLERANCE};

/// A square analysis window centred on `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudyArea {
    center: Point2,
    half_width: f64,
}

impl StudyArea {
    #[must_use]
    pub fn new(center: Point2, half_width: f64) -> Self {
        Self { center, half_width }
    }

    #[must_use]
    pub fn center(&self) -> Point2 {
        self.center
    }

    #[must_use]
    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    /// Lower-left and upper-right corners.
    #[must_use]
    pub fn bounds(&self) -> (Point2, Point2) {
        let d = self.half_width;
        (
            Point2::new(self.center.x - d, self.center.y - d),
            Point2::new(self.center.x + d, self.center.y + d),
        )
    }

    fn window(&self) -> Polygon<f64> {
        let (min, max) = self.bounds();
        Rect::new(Coord { x: min.x, y: min.y }, Coord { x: max.x, y: max.y }).to_polygon()
    }

    /// Moves the centre to the nearest point on any ring of `layer`.
    ///
    /// # Errors
    ///
    /// Returns `GeometryInputError::EmptyLayer` when the layer has no
    /// boundary to snap to.
    pub fn snap_to_boundary(&self, layer: &FeatureLayer) -> Result<Self> {
        let target = Point::new(self.center.x, self.center.y);
        let nearest = layer
            .features
            .iter()
            .flat_map(|feature| &feature.polygons)
            .map(Polygon::from)
            .flat_map(|polygon| {
                std::iter::once(polygon.exterior().clone())
                    .chain(polygon.interiors().iter().cloned())
                    .collect::<Vec<_>>()
            })
            .filter_map(|ring| match ring.closest_point(&target) {
                Closest::SinglePoint(p) | Closest::Intersection(p) => {
                    let point = Point2::new(p.x(), p.y());
                    Some((point, nalgebra::distance_squared(&point, &self.center)))
                }
                Closest::Indeterminate => None,
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((point, _)) => Ok(Self::new(point, self.half_width)),
            None => Err(GeometryInputError::EmptyLayer {
                layer: layer.name.clone(),
            }
            .into()),
        }
    }

    /// Clips every polygon of `layer` to the window.
    ///
    /// A polygon cut into several pieces yields one polygon per piece.
    /// Polygons and holes that vanish are dropped, and features left
    /// without polygons are removed.
    #[must_use]
    pub fn clip_layer(&self, layer: &FeatureLayer) -> FeatureLayer {
        let window = self.window();
        let mut dropped_polygons = 0_usize;
        let mut dropped_holes = 0_usize;
        let mut features = Vec::with_capacity(layer.len());

        for feature in &layer.features {
            let mut polygons = Vec::new();
            for polygon in &feature.polygons {
                let pieces: Vec<Polygon<f64>> = Polygon::from(polygon)
                    .intersection(&window)
                    .into_iter()
                    .filter(|piece| piece.unsigned_area() > TOLERANCE)
                    .collect();
                if pieces.is_empty() {
                    dropped_polygons += 1;
                    continue;
                }
                let kept_holes: usize = pieces.iter().map(|piece| piece.interiors().len()).sum();
                dropped_holes += polygon.interiors.len().saturating_sub(kept_holes);
                polygons.extend(pieces.iter().map(Polygon2::from));
            }
            if !polygons.is_empty() {
                features.push(PolygonFeature {
                    polygons,
                    attributes: feature.attributes.clone(),
                });
            }
        }

        if dropped_polygons > 0 || dropped_holes > 0 {
            warn!(
                layer = %layer.name,
                dropped_polygons,
                dropped_holes,
                "rings collapsed by study area clipping"
            );
        }
        info!(
            layer = %layer.name,
            kept = features.len(),
            dropped = layer.len() - features.len(),
            "clipped layer to study area"
        );
        FeatureLayer::new(layer.name.clone(), features)
    }
}

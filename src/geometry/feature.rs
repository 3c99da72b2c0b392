use std::collections::BTreeMap;
use std::fmt;

use crate::math::Point2;

/// Which input layer a vertex set was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    Urban,
    Flammable,
}

impl LayerRole {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Urban => "urban",
            Self::Flammable => "flammable",
        }
    }
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single polygon: one exterior ring and zero or more holes.
///
/// Rings may be given open or closed (first point repeated at the end).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polygon2 {
    pub exterior: Vec<Point2>,
    pub interiors: Vec<Vec<Point2>>,
}

impl Polygon2 {
    /// Creates a polygon without holes.
    #[must_use]
    pub fn new(exterior: Vec<Point2>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Creates a polygon from `(x, y)` pairs.
    #[must_use]
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    /// Iterates the rings, exterior first.
    pub fn rings(&self) -> impl Iterator<Item = &[Point2]> {
        std::iter::once(self.exterior.as_slice()).chain(self.interiors.iter().map(Vec::as_slice))
    }
}

impl From<&geo_types::Polygon<f64>> for Polygon2 {
    fn from(poly: &geo_types::Polygon<f64>) -> Self {
        let ring = |ls: &geo_types::LineString<f64>| -> Vec<Point2> {
            ls.coords().map(|c| Point2::new(c.x, c.y)).collect()
        };
        Self {
            exterior: ring(poly.exterior()),
            interiors: poly.interiors().iter().map(ring).collect(),
        }
    }
}

impl From<&Polygon2> for geo_types::Polygon<f64> {
    fn from(poly: &Polygon2) -> Self {
        let ring = |points: &[Point2]| -> geo_types::LineString<f64> {
            points.iter().map(|p| (p.x, p.y)).collect()
        };
        // geo-types closes both rings.
        Self::new(
            ring(&poly.exterior),
            poly.interiors.iter().map(|hole| ring(hole)).collect(),
        )
    }
}

/// A (possibly multi-part) polygon feature with its attributes.
#[derive(Debug, Clone, Default)]
pub struct PolygonFeature {
    pub polygons: Vec<Polygon2>,
    pub attributes: BTreeMap<String, String>,
}

impl PolygonFeature {
    /// Creates a feature without attributes.
    #[must_use]
    pub fn new(polygons: Vec<Polygon2>) -> Self {
        Self {
            polygons,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute, builder style.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Returns `true` if the feature has no ring with at least one point.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons
            .iter()
            .all(|p| p.rings().all(<[Point2]>::is_empty))
    }
}

/// An ordered collection of polygon features.
#[derive(Debug, Clone)]
pub struct FeatureLayer {
    pub name: String,
    pub features: Vec<PolygonFeature>,
}

impl FeatureLayer {
    #[must_use]
    pub fn new(name: impl Into<String>, features: Vec<PolygonFeature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

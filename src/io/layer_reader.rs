//! Tab-separated feature tables with a WKT geometry column.
//!
//! The first non-comment line is the header. The column named `wkt` or
//! `geometry` (any case) holds a `POLYGON` or `MULTIPOLYGON`; every other
//! column becomes a feature attribute. Blank lines and lines starting with
//! `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use geo_types::Geometry;
use tracing::info;
use wkt::TryFromWkt;

use crate::error::{GeometryInputError, InterfaceError, Result, Stage};
use crate::geometry::{FeatureLayer, Polygon2, PolygonFeature};

const GEOMETRY_COLUMNS: [&str; 2] = ["wkt", "geometry"];

/// Reads a feature table from disk. The layer is named after the file stem.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read, or a
/// `GeometryInputError` for malformed content.
pub fn read_layer(path: &Path) -> Result<FeatureLayer> {
    let file = File::open(path).map_err(|e| InterfaceError::io(path, e))?;
    let name = path
        .file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
    parse_layer(BufReader::new(file), &name).map_err(|e| match e {
        InterfaceError::Io { source, .. } => InterfaceError::io(path, source),
        other => other,
    })
}

/// Reads the urban and flammable layers of a run. Failures are tagged
/// with the input stage.
///
/// # Errors
///
/// See [`read_layer`].
pub fn read_layers(urban: &Path, flammable: &Path) -> Result<(FeatureLayer, FeatureLayer)> {
    let urban = read_layer(urban).map_err(|e| e.in_stage(Stage::Input))?;
    let flammable = read_layer(flammable).map_err(|e| e.in_stage(Stage::Input))?;
    Ok((urban, flammable))
}

/// Parses a feature table from any buffered reader.
///
/// # Errors
///
/// Returns `GeometryInputError::MissingColumn` without a geometry column,
/// `MalformedRow` for rows with the wrong field count, `Wkt` for
/// unparsable geometry and `UnsupportedGeometry` for non-polygons.
pub fn parse_layer<R: BufRead>(reader: R, name: &str) -> Result<FeatureLayer> {
    let mut header: Option<(Vec<String>, usize)> = None;
    let mut features = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| InterfaceError::io(name, e))?;
        let line_no = index + 1;
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split('\t').collect();

        if header.is_none() {
            header = Some(parse_header(&fields)?);
            continue;
        }
        let Some((columns, geometry_column)) = &header else {
            continue;
        };

        if fields.len() != columns.len() {
            return Err(GeometryInputError::MalformedRow {
                line: line_no,
                expected: columns.len(),
                found: fields.len(),
            }
            .into());
        }

        let polygons = parse_polygons(fields[*geometry_column], line_no)?;
        let mut feature = PolygonFeature::new(polygons);
        for (i, (column, value)) in columns.iter().zip(&fields).enumerate() {
            if i != *geometry_column {
                feature.attributes.insert(column.clone(), (*value).to_owned());
            }
        }
        features.push(feature);
    }

    if header.is_none() {
        return Err(GeometryInputError::MissingColumn {
            column: GEOMETRY_COLUMNS[0].to_owned(),
        }
        .into());
    }
    info!(layer = name, features = features.len(), "read layer");
    Ok(FeatureLayer::new(name, features))
}

/// Column names and the position of the geometry column.
fn parse_header(fields: &[&str]) -> Result<(Vec<String>, usize)> {
    let columns: Vec<String> = fields.iter().map(|f| f.trim().to_owned()).collect();
    let geometry_column = columns
        .iter()
        .position(|c| GEOMETRY_COLUMNS.iter().any(|g| c.eq_ignore_ascii_case(g)))
        .ok_or_else(|| GeometryInputError::MissingColumn {
            column: GEOMETRY_COLUMNS[0].to_owned(),
        })?;
    Ok((columns, geometry_column))
}

fn parse_polygons(text: &str, line: usize) -> Result<Vec<Polygon2>> {
    let geometry = Geometry::<f64>::try_from_wkt_str(text.trim()).map_err(|e| GeometryInputError::Wkt {
        line,
        message: e.to_string(),
    })?;
    match geometry {
        Geometry::Polygon(p) => Ok(vec![Polygon2::from(&p)]),
        Geometry::MultiPolygon(mp) => Ok(mp.0.iter().map(Polygon2::from).collect()),
        other => Err(GeometryInputError::UnsupportedGeometry {
            line,
            kind: geometry_kind(&other).to_owned(),
        }
        .into()),
    }
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) => "LINE",
        Geometry::LineString(_) => "LINESTRING",
        Geometry::Polygon(_) => "POLYGON",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::MultiPolygon(_) => "MULTIPOLYGON",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) => "RECT",
        Geometry::Triangle(_) => "TRIANGLE",
    }
}

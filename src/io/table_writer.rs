//! Interface table and segment exports.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use geo_types::LineString;
use tracing::info;
use wkt::ToWkt;

use crate::config::{InterfaceParams, Sentinels};
use crate::error::{InterfaceError, Result};
use crate::geometry::PartPacking;
use crate::operations::{InterfaceRow, Segment};
use crate::pipeline::InterfaceRun;

/// Column set of the exported interface table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableSchema {
    /// The nine columns read by the existing map styling.
    #[default]
    Compatible,
    /// Adds features, azimuths, lengths, segment numbers and echoed attributes.
    Extended,
}

const COMPATIBLE_COLUMNS: [&str; 9] = [
    "x", "y", "vert_type", "linkL", "linkR", "idx_vert_u", "idx_part_u", "interface", "d",
];

const EXTENDED_COLUMNS: [&str; 10] = [
    "idx_feat_u",
    "idx_feat_f",
    "dist_feat_f",
    "az",
    "iF",
    "lengthL",
    "lengthR",
    "azimuthL",
    "azimuthR",
    "segment",
];

/// Paths written by [`write_run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutputs {
    pub table: PathBuf,
    pub lines: PathBuf,
}

/// Writes the interface table as CSV.
///
/// Missing values are written as the `neg_value` sentinel, as is a `d`
/// still at `pos_value`. Booleans are written as `1`/`0`.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_interface_table<W: Write>(
    mut out: W,
    rows: &[InterfaceRow],
    packing: &PartPacking,
    sentinels: &Sentinels,
    schema: TableSchema,
) -> std::io::Result<()> {
    let extras: BTreeSet<&str> = match schema {
        TableSchema::Compatible => BTreeSet::new(),
        TableSchema::Extended => rows
            .iter()
            .flat_map(|r| r.extra.keys().map(String::as_str))
            .collect(),
    };

    let mut header: Vec<&str> = COMPATIBLE_COLUMNS.to_vec();
    if schema == TableSchema::Extended {
        header.extend(EXTENDED_COLUMNS);
        header.extend(extras.iter().copied());
    }
    writeln!(out, "{}", header.iter().map(|h| csv_field(h)).collect::<Vec<_>>().join(","))?;

    let missing = sentinels.neg_value.to_string();
    let number = |v: Option<f64>| -> String {
        match v {
            Some(x) if x.is_finite() => x.to_string(),
            _ => missing.clone(),
        }
    };
    // A distance still at the ceiling means the vertex was never exposed.
    let exposure = |v: Option<f64>| -> String {
        number(v.filter(|x| (x - sentinels.pos_value).abs() > f64::EPSILON))
    };
    let id = |v: Option<u32>| -> String { v.map_or_else(|| missing.clone(), |x| x.to_string()) };

    for row in rows {
        let mut fields = vec![
            row.point.x.to_string(),
            row.point.y.to_string(),
            row.vert_type.to_string(),
            flag(row.link_next),
            flag(row.link_prev),
            row.vertex_id.to_string(),
            packing.pack(&row.part).to_string(),
            flag(row.is_interface),
            exposure(row.distance),
        ];
        if schema == TableSchema::Extended {
            fields.extend([
                row.feature_id.to_string(),
                id(row.nearest_feature),
                number(row.nearest_distance),
                number(row.azimuth),
                id(row.exposing_feature),
                number(row.length_next),
                number(row.length_prev),
                number(row.azimuth_next),
                number(row.azimuth_prev),
                id(row.segment),
            ]);
            fields.extend(
                extras
                    .iter()
                    .map(|key| row.extra.get(*key).map_or_else(String::new, |v| csv_field(v))),
            );
        }
        writeln!(out, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Writes segments as `type<TAB>LINESTRING` rows.
///
/// # Errors
///
/// Propagates write errors from `out`.
pub fn write_segments<W: Write>(mut out: W, segments: &[Segment]) -> std::io::Result<()> {
    writeln!(out, "type\twkt")?;
    for segment in segments {
        let line: LineString<f64> = segment.points.iter().map(|p| (p.x, p.y)).collect();
        writeln!(out, "{}\t{}", segment.vert_type, line.wkt_string())?;
    }
    Ok(())
}

/// Writes `<stem>.csv` and `<stem>_lines.tsv` into `dir`.
///
/// # Errors
///
/// Returns an I/O error naming the file that could not be written.
pub fn write_run(
    dir: &Path,
    stem: &str,
    run: &InterfaceRun,
    params: &InterfaceParams,
    schema: TableSchema,
) -> Result<RunOutputs> {
    let table = dir.join(format!("{stem}.csv"));
    let lines = dir.join(format!("{stem}_lines.tsv"));

    let packing = run.urban.part_packing();
    write_file(&table, |out| {
        write_interface_table(out, &run.table, &packing, &params.sentinels, schema)
    })?;
    write_file(&lines, |out| write_segments(out, &run.segments))?;

    info!(
        table = %table.display(),
        lines = %lines.display(),
        rows = run.table.len(),
        segments = run.segments.len(),
        "wrote run outputs"
    );
    Ok(RunOutputs { table, lines })
}

fn write_file(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<()> {
    let file = File::create(path).map_err(|e| InterfaceError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    body(&mut writer)
        .and_then(|()| writer.flush())
        .map_err(|e| InterfaceError::io(path, e))
}

fn flag(value: bool) -> String {
    String::from(if value { "1" } else { "0" })
}

/// Quotes a CSV field when it contains a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for an interface run.
#[derive(Debug, Error)]
pub enum InterfaceError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    GeometryInput(#[from] GeometryInputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<InterfaceError>,
    },
}

impl InterfaceError {
    /// Tags the error with the pipeline stage that raised it.
    ///
    /// Already-tagged errors keep the stage they were first tagged with.
    #[must_use]
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            tagged @ Self::StageFailed { .. } => tagged,
            other => Self::StageFailed {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Returns the stage that failed, if the error was tagged.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Builds an I/O error tied to a path.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Pipeline stages, used to report where a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    StudyArea,
    Extraction,
    Classification,
    Selection,
    Assembly,
    Export,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::StudyArea => "study area",
            Self::Extraction => "extraction",
            Self::Classification => "classification",
            Self::Selection => "selection",
            Self::Assembly => "assembly",
            Self::Export => "export",
        };
        f.write_str(name)
    }
}

/// Inconsistent indexing between vertex tables. Always fatal.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("{layer} layer: highest feature index {max_feature} does not match {declared} declared features")]
    FeatureIndexMismatch {
        layer: &'static str,
        max_feature: u32,
        declared: usize,
    },

    #[error("vertex set does not start with the sentinel vertex")]
    SentinelMissing,

    #[error("vertex at position {position} carries id {vertex_id}")]
    VertexIdGap { position: usize, vertex_id: u32 },

    #[error("part {part} is split into non-contiguous runs")]
    NonContiguousPart { part: String },

    #[error("{table} has {rows} rows, expected {expected}")]
    VertexIndexMismatch {
        table: &'static str,
        rows: usize,
        expected: usize,
    },

    #[error("{layer} layer has no vertex {vertex_id}")]
    UnknownVertex { layer: &'static str, vertex_id: u32 },
}

/// Invalid or unreadable polygon input. Always fatal.
#[derive(Debug, Error)]
pub enum GeometryInputError {
    #[error("{layer} layer has no polygon features")]
    EmptyLayer { layer: String },

    #[error("feature {feature} has a non-finite coordinate ({x}, {y})")]
    NonFiniteCoordinate { feature: usize, x: f64, y: f64 },

    #[error("line {line}: unsupported geometry {kind}, expected POLYGON or MULTIPOLYGON")]
    UnsupportedGeometry { line: usize, kind: String },

    #[error("line {line}: invalid WKT: {message}")]
    Wkt { line: usize, message: String },

    #[error("missing column `{column}`")]
    MissingColumn { column: String },

    #[error("line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
}

/// Rejected run parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter {parameter} = {value} is invalid: {reason}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

/// Convenience type alias for results using [`InterfaceError`].
pub type Result<T> = std::result::Result<T, InterfaceError>;

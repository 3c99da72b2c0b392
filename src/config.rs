//! Run parameters for interface detection.
//!
//! Every threshold is a runtime value carried in [`InterfaceParams`] and
//! passed explicitly into each stage. Keys also accept the short legacy
//! names as aliases (`K`, `KF`, `limiar`, ...).

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, InterfaceError, Result};
use crate::math::Point2;
use crate::operations::study_area::StudyArea;

/// All tunable parameters of one run.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct InterfaceParams {
    /// Flammable neighbours examined per urban vertex.
    #[serde(alias = "K")]
    pub k: usize,

    /// Urban protector candidates per group.
    #[serde(alias = "KF")]
    pub kf: usize,

    /// `|VW| + |WF|` may exceed `|VF|` by at most this factor.
    #[serde(alias = "limiar")]
    pub triangle_threshold: f64,

    /// Maximum deviation (degrees) of a shielding wall from the sightline normal.
    #[serde(alias = "limiartheta")]
    pub angle_threshold_deg: f64,

    /// Minimum share of the V-W-F perimeter each leg must cover.
    pub min_leg_fraction: f64,

    /// Neighbour searches ignore points farther than this.
    #[serde(alias = "KDTREE_DIST_UPPERBOUND")]
    pub search_radius: f64,

    /// Exposure distances up to this value count as direct interface.
    pub tolerance: f64,

    /// Decimal places kept when rounding coordinates before deduplication.
    pub coordinate_decimals: i32,

    pub sentinels: Sentinels,

    pub bands: BandParams,

    /// Optional analysis window.
    pub study_area: Option<StudyAreaParams>,

    pub buffered: BufferedFlag,

    pub echo: EchoAttributes,

    /// Emit a trace event for every protection decision.
    #[serde(alias = "verbose")]
    pub log_decisions: bool,
}

/// Surrogate values standing in for infinity, "nothing found" and epsilon.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    /// Coordinate of the sentinel vertex and distance of missing neighbours.
    #[serde(alias = "bigN")]
    pub big_n: f64,

    /// Numeric tolerance of the protection predicate.
    #[serde(alias = "smallN")]
    pub small_n: f64,

    /// Initial "fully protected" exposure distance.
    #[serde(alias = "POSVALUE")]
    pub pos_value: f64,

    /// Written in place of missing values in exported tables.
    #[serde(alias = "NEGVALUE")]
    pub neg_value: f64,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            big_n: 1e6,
            small_n: 1e-6,
            pos_value: 9999.0,
            neg_value: -1.0,
        }
    }
}

/// Distance bands used to type interface vertices.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BandParams {
    /// Interior band edges, strictly increasing.
    pub edges: Vec<f64>,

    /// Outermost band edge; defaults to the search radius.
    #[serde(alias = "D")]
    pub outer: Option<f64>,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            edges: vec![100.0, 250.0],
            outer: None,
        }
    }
}

/// Centre and half-width of the square analysis window.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct StudyAreaParams {
    pub x0: f64,
    pub y0: f64,
    #[serde(alias = "d_box")]
    pub half_width: f64,
}

/// Attribute that marks buffered copies of urban polygons.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BufferedFlag {
    pub column: String,
    pub value: String,
}

impl Default for BufferedFlag {
    fn default() -> Self {
        Self {
            column: "layer".to_owned(),
            value: "Buffered".to_owned(),
        }
    }
}

/// Feature attributes copied onto every vertex of the feature.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct EchoAttributes {
    pub urban: Vec<String>,
    pub flammable: Vec<String>,
}

impl Default for InterfaceParams {
    fn default() -> Self {
        Self {
            k: 60,
            kf: 60,
            triangle_threshold: 1.05,
            angle_threshold_deg: 60.0,
            min_leg_fraction: 0.05,
            search_radius: 500.0,
            tolerance: 3.0,
            coordinate_decimals: 0,
            sentinels: Sentinels::default(),
            bands: BandParams::default(),
            study_area: None,
            buffered: BufferedFlag::default(),
            echo: EchoAttributes::default(),
            log_decisions: false,
        }
    }
}

impl InterfaceParams {
    /// Loads parameters from a TOML file. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or
    /// `ConfigError::Parse` if it is not valid TOML for this struct.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InterfaceError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Parses parameters from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` on malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self = toml::from_str(text).map_err(ConfigError::from)?;
        Ok(params)
    }

    /// Outermost distance band edge.
    #[must_use]
    pub fn outer_band(&self) -> f64 {
        self.bands.outer.unwrap_or(self.search_radius)
    }

    /// The configured study area, if any.
    #[must_use]
    pub fn study_area(&self) -> Option<StudyArea> {
        self.study_area
            .map(|s| StudyArea::new(Point2::new(s.x0, s.y0), s.half_width))
    }

    /// Output file stem that encodes the main parameters and, when given,
    /// the snapped study area of the run.
    #[must_use]
    pub fn file_stem(&self, label: &str, study_area: Option<&StudyArea>) -> String {
        let mut stem = format!(
            "interface_K{}_KF{}_limiar{}_theta{}_QT{}_{label}",
            self.k,
            self.kf,
            (self.triangle_threshold * 100.0).round(),
            self.angle_threshold_deg,
            (self.min_leg_fraction * 100.0).round(),
        );
        if let Some(area) = study_area {
            let center = area.center();
            stem.push_str(&format!(
                "_{}_y_{}_d_{}",
                center.x.round(),
                center.y.round(),
                area.half_width()
            ));
        }
        stem
    }

    /// Checks that the parameters describe a runnable configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidParameter` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(invalid("k", self.k, "must be at least 1"));
        }
        if self.kf == 0 {
            return Err(invalid("kf", self.kf, "must be at least 1"));
        }
        positive("triangle_threshold", self.triangle_threshold)?;
        positive("angle_threshold_deg", self.angle_threshold_deg)?;
        positive("search_radius", self.search_radius)?;
        if !(0.0..=0.5).contains(&self.min_leg_fraction) {
            return Err(invalid(
                "min_leg_fraction",
                self.min_leg_fraction,
                "must lie in [0, 0.5]",
            ));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(invalid("tolerance", self.tolerance, "must be finite and >= 0"));
        }
        if !(0..=12).contains(&self.coordinate_decimals) {
            return Err(invalid(
                "coordinate_decimals",
                self.coordinate_decimals,
                "must lie in [0, 12]",
            ));
        }

        let s = &self.sentinels;
        if !s.big_n.is_finite() || s.big_n <= self.search_radius {
            return Err(invalid("big_n", s.big_n, "must exceed search_radius"));
        }
        if !s.pos_value.is_finite() || s.pos_value <= self.search_radius {
            return Err(invalid("pos_value", s.pos_value, "must exceed search_radius"));
        }
        if !s.neg_value.is_finite() || s.neg_value >= 0.0 {
            return Err(invalid("neg_value", s.neg_value, "must be negative"));
        }
        if !s.small_n.is_finite() || s.small_n < 0.0 {
            return Err(invalid("small_n", s.small_n, "must be finite and >= 0"));
        }

        let outer = self.outer_band();
        positive("bands.outer", outer)?;
        let mut last = self.tolerance;
        for &edge in &self.bands.edges {
            if !edge.is_finite() || edge <= last || edge >= outer {
                return Err(invalid(
                    "bands.edges",
                    edge,
                    "must increase strictly between tolerance and the outer edge",
                ));
            }
            last = edge;
        }

        if let Some(area) = self.study_area {
            positive("study_area.half_width", area.half_width)?;
            if !area.x0.is_finite() || !area.y0.is_finite() {
                return Err(invalid("study_area", format!("({}, {})", area.x0, area.y0), "centre must be finite"));
            }
        }
        Ok(())
    }
}

fn invalid(parameter: &'static str, value: impl ToString, reason: &'static str) -> InterfaceError {
    ConfigError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason,
    }
    .into()
}

fn positive(parameter: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, value, "must be finite and > 0"))
    }
}

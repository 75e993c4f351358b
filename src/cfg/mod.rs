use std::{collections::BTreeMap, path::PathBuf, str::FromStr};

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Deserialize;

use crate::{
    constants::{COVERAGE_RATIO, MAX_ITERATIONS},
    prelude::{Constellation, SV},
};

/// Configuration Error
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown observation combination \"{0}\"")]
    UnknownObsCombination(String),
}

/// Observation combination the estimator works with
#[derive(Default, Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub enum ObsCombination {
    /// Ionosphere free combination of two frequencies
    #[default]
    IonosphereFree,
    /// Uncombined (raw) observations
    Uncombined,
}

impl std::fmt::Display for ObsCombination {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::IonosphereFree => write!(fmt, "IF"),
            Self::Uncombined => write!(fmt, "UC"),
        }
    }
}

impl FromStr for ObsCombination {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IF" => Ok(Self::IonosphereFree),
            "UC" => Ok(Self::Uncombined),
            _ => Err(Error::UnknownObsCombination(s.to_string())),
        }
    }
}

/// Residual dispersion thresholds used to flag bad stations and satellites.
/// Thresholds are expressed in the unit of the residual file (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct ResidualThresholds {
    /// Maximal residual RMS of a station
    pub site_rms: f64,
    /// Maximal residual RMS of a satellite
    pub sat_rms: f64,
    /// Groups with fewer residuals are never flagged
    #[cfg_attr(feature = "serde", serde(default = "default_min_samples"))]
    pub min_samples: usize,
    /// Factor applied to both thresholds on each new iteration
    #[cfg_attr(feature = "serde", serde(default = "default_tightening"))]
    pub tightening: f64,
    /// Thresholds never tighten below this value
    #[cfg_attr(feature = "serde", serde(default = "default_floor"))]
    pub floor: f64,
}

impl Default for ResidualThresholds {
    fn default() -> Self {
        Self {
            site_rms: 0.05,
            sat_rms: 0.05,
            min_samples: default_min_samples(),
            tightening: default_tightening(),
            floor: default_floor(),
        }
    }
}

impl ResidualThresholds {
    /// Returns (site, satellite) thresholds to apply at given iteration.
    pub fn at_iteration(&self, iteration: usize) -> (f64, f64) {
        let factor = self.tightening.powi(iteration as i32);
        (
            (self.site_rms * factor).max(self.floor),
            (self.sat_rms * factor).max(self.floor),
        )
    }
}

/// Residual editing thresholds, forwarded to the ambiguity editor.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct EditingThresholds {
    /// Bad residual threshold
    pub bad: u32,
    /// Jump (cycle slip) threshold
    pub jump: u32,
    /// Shortest arc to retain (in seconds)
    pub nshort: u32,
}

impl EditingThresholds {
    /// Loosest thresholds, used after the first solution
    pub fn loose() -> Self {
        Self {
            bad: 80,
            jump: 80,
            nshort: 600,
        }
    }

    /// Tighter thresholds, used after the refined solution
    pub fn tight() -> Self {
        Self {
            bad: 40,
            jump: 40,
            nshort: 600,
        }
    }

    /// Command line arguments understood by the editor
    pub fn to_args(&self) -> Vec<String> {
        vec![
            "-bad".to_string(),
            self.bad.to_string(),
            "-jump".to_string(),
            self.jump.to_string(),
            "-nshort".to_string(),
            self.nshort.to_string(),
        ]
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_bin_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_interval() -> f64 {
    300.0
}

fn default_ambfix_interval() -> f64 {
    30.0
}

fn default_constellations() -> Vec<Constellation> {
    vec![Constellation::GPS]
}

fn default_ref_centers() -> Vec<String> {
    ["com", "gbm", "wum", "esm"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_excluded_satellites() -> Vec<SV> {
    [1, 2, 3, 4, 5, 59, 60, 39, 40, 41, 42, 43, 44, 45, 46]
        .iter()
        .map(|prn| SV::new(Constellation::BeiDou, *prn))
        .collect()
}

fn default_max_iterations() -> usize {
    MAX_ITERATIONS
}

fn default_early_accept_sigma() -> f64 {
    10.0
}

fn default_max_sigma() -> f64 {
    200.0
}

fn default_min_samples() -> usize {
    10
}

fn default_tightening() -> f64 {
    0.8
}

fn default_floor() -> f64 {
    0.02
}

fn default_first_editing() -> EditingThresholds {
    EditingThresholds::loose()
}

fn default_second_editing() -> EditingThresholds {
    EditingThresholds::tight()
}

fn default_min_ambiguity_observations() -> usize {
    1000
}

fn default_coverage_ratio() -> f64 {
    COVERAGE_RATIO
}

fn default_min_orbit_epochs() -> usize {
    230
}

/// Default file category templates, relative to the work directory.
fn default_files() -> BTreeMap<String, String> {
    [
        ("site_list", "site_list"),
        ("ics", "ics_{yyyy}{doy}"),
        ("orb", "orb_{yyyy}{doy}"),
        ("satclk", "satclk_{yyyy}{doy}"),
        ("recclk", "recclk_{yyyy}{doy}"),
        ("recover", "res_{yyyy}{doy}"),
        ("ambflag", "log_tb/{site}{doy}0.{yy}o.log"),
        ("orbdif", "orbdif/orbdif_{yyyy}{doy}_{cen}"),
        ("clkdif", "clkdif/clkdif_{yyyy}{doy}_{cen}_{sys}"),
        ("sp3_out", "grt_{yyyy}{doy}.sp3"),
        ("clk_out", "grt_{yyyy}{doy}.clk"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct Config {
    /// Directory holding intermediate files. One run per directory.
    #[cfg_attr(feature = "serde", serde(default = "default_work_dir"))]
    pub work_dir: PathBuf,
    /// Directory where validated results are archived
    #[cfg_attr(feature = "serde", serde(default))]
    pub result_dir: Option<PathBuf>,
    /// Directory holding the external solvers
    #[cfg_attr(feature = "serde", serde(default = "default_bin_dir"))]
    pub bin_dir: PathBuf,
    /// Processing interval (in seconds)
    #[cfg_attr(feature = "serde", serde(default = "default_interval"))]
    pub interval_s: f64,
    /// Processing interval during ambiguity fixing (in seconds)
    #[cfg_attr(feature = "serde", serde(default = "default_ambfix_interval"))]
    pub ambfix_interval_s: f64,
    /// [ObsCombination] the estimator works with
    #[cfg_attr(feature = "serde", serde(default))]
    pub obs_combination: ObsCombination,
    /// Processed constellations
    #[cfg_attr(feature = "serde", serde(default = "default_constellations"))]
    pub constellations: Vec<Constellation>,
    /// Analysis centers whose products serve as comparison reference
    #[cfg_attr(feature = "serde", serde(default = "default_ref_centers"))]
    pub ref_centers: Vec<String>,
    /// Satellites excluded from the start of each day
    #[cfg_attr(feature = "serde", serde(default = "default_excluded_satellites"))]
    pub excluded_satellites: Vec<SV>,
    /// Maximal number of estimator invocations in the outlier detection
    #[cfg_attr(feature = "serde", serde(default = "default_max_iterations"))]
    pub max_iterations: usize,
    /// Sigma under which a re-processed solution is accepted right away
    #[cfg_attr(feature = "serde", serde(default = "default_early_accept_sigma"))]
    pub early_accept_sigma: f64,
    /// Solutions with greater sigma are rejected
    #[cfg_attr(feature = "serde", serde(default = "default_max_sigma"))]
    pub max_sigma: f64,
    /// Residual thresholds applied by the outlier detection
    #[cfg_attr(feature = "serde", serde(default))]
    pub residual_thresholds: ResidualThresholds,
    /// Editing thresholds applied after the first solution
    #[cfg_attr(feature = "serde", serde(default = "default_first_editing"))]
    pub first_editing: EditingThresholds,
    /// Editing thresholds applied after the refined solution
    #[cfg_attr(feature = "serde", serde(default = "default_second_editing"))]
    pub second_editing: EditingThresholds,
    /// Minimal number of observations for an ambiguity flag file to be valid
    #[cfg_attr(
        feature = "serde",
        serde(default = "default_min_ambiguity_observations")
    )]
    pub min_ambiguity_observations: usize,
    /// Share of days a satellite must be present on, to be summarized
    #[cfg_attr(feature = "serde", serde(default = "default_coverage_ratio"))]
    pub coverage_ratio: f64,
    /// Minimal number of epochs for a daily orbit difference series to be summarized
    #[cfg_attr(feature = "serde", serde(default = "default_min_orbit_epochs"))]
    pub min_orbit_epochs: usize,
    /// File category templates
    #[cfg_attr(feature = "serde", serde(default = "default_files"))]
    pub files: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            result_dir: None,
            bin_dir: default_bin_dir(),
            interval_s: default_interval(),
            ambfix_interval_s: default_ambfix_interval(),
            obs_combination: ObsCombination::default(),
            constellations: default_constellations(),
            ref_centers: default_ref_centers(),
            excluded_satellites: default_excluded_satellites(),
            max_iterations: default_max_iterations(),
            early_accept_sigma: default_early_accept_sigma(),
            max_sigma: default_max_sigma(),
            residual_thresholds: ResidualThresholds::default(),
            first_editing: default_first_editing(),
            second_editing: default_second_editing(),
            min_ambiguity_observations: default_min_ambiguity_observations(),
            coverage_ratio: default_coverage_ratio(),
            min_orbit_epochs: default_min_orbit_epochs(),
            files: default_files(),
        }
    }
}

impl Config {
    /// Returns [Config] for ionosphere free processing in given directory.
    /// You can then customize [Self] as you will.
    pub fn ionosphere_free_preset(work_dir: PathBuf) -> Self {
        let mut s = Self::default();
        s.work_dir = work_dir;
        s.obs_combination = ObsCombination::IonosphereFree;
        s
    }

    /// Returns [Config] for uncombined processing in given directory.
    /// Note that ambiguity fixing is not available in this mode.
    pub fn uncombined_preset(work_dir: PathBuf) -> Self {
        let mut s = Self::default();
        s.work_dir = work_dir;
        s.obs_combination = ObsCombination::Uncombined;
        s.interval_s = default_ambfix_interval();
        s
    }
}

#[cfg(test)]
mod test {
    use super::{Config, EditingThresholds, ObsCombination, ResidualThresholds};
    use std::str::FromStr;

    #[test]
    fn obs_combination() {
        assert_eq!(
            ObsCombination::from_str("if").unwrap(),
            ObsCombination::IonosphereFree
        );
        assert_eq!(
            ObsCombination::from_str(" UC").unwrap(),
            ObsCombination::Uncombined
        );
        assert!(ObsCombination::from_str("IF2").is_err());
        assert_eq!(ObsCombination::Uncombined.to_string(), "UC");
    }

    #[test]
    fn tightening() {
        let thresholds = ResidualThresholds {
            site_rms: 0.1,
            sat_rms: 0.05,
            min_samples: 1,
            tightening: 0.5,
            floor: 0.02,
        };
        assert_eq!(thresholds.at_iteration(0), (0.1, 0.05));
        assert_eq!(thresholds.at_iteration(1), (0.05, 0.025));
        assert_eq!(thresholds.at_iteration(2), (0.025, 0.02));
        assert_eq!(thresholds.at_iteration(5), (0.02, 0.02));
    }

    #[test]
    fn editing_args() {
        assert_eq!(
            EditingThresholds::loose().to_args(),
            vec!["-bad", "80", "-jump", "80", "-nshort", "600"]
        );
    }

    #[test]
    fn presets() {
        let cfg = Config::default();
        assert_eq!(cfg.max_iterations, 10);
        assert_eq!(cfg.excluded_satellites.len(), 15);
        assert_eq!(cfg.ref_centers.len(), 4);

        let cfg = Config::uncombined_preset("/tmp".into());
        assert_eq!(cfg.obs_combination, ObsCombination::Uncombined);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn deserialize() {
        let content = r#"{
            "work_dir": "/data/pod",
            "interval_s": 30.0,
            "ref_centers": ["com"],
            "residual_thresholds": {
                "site_rms": 0.1,
                "sat_rms": 0.08
            }
        }"#;
        let cfg: Config = serde_json::from_str(content).unwrap();
        assert_eq!(cfg.interval_s, 30.0);
        assert_eq!(cfg.ref_centers, vec!["com"]);
        assert_eq!(cfg.max_sigma, 200.0);
        assert_eq!(cfg.residual_thresholds.site_rms, 0.1);
        assert_eq!(cfg.residual_thresholds.min_samples, 10);
        assert_eq!(cfg.first_editing, EditingThresholds::loose());
    }
}

//! Residual analysis: flags stations and satellites whose residuals
//! are too dispersed to be kept in the solution.
use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, warn};

use crate::{
    cfg::ResidualThresholds,
    error::Error,
    parsing::residual::ResidualRecord,
    prelude::SV,
};

/// Residual dispersion of one group (station or satellite)
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Dispersion {
    /// Number of residuals
    pub samples: usize,
    /// Root mean square of the residuals
    pub rms: f64,
}

impl Dispersion {
    fn accumulate(&mut self, residual: f64) {
        // rms temporarily holds the sum of squares
        self.samples += 1;
        self.rms += residual * residual;
    }

    fn finalize(mut self) -> Self {
        if self.samples > 0 {
            self.rms = (self.rms / self.samples as f64).sqrt();
        }
        self
    }
}

/// Entities [ResidualAnalyzer] flagged as bad
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outliers {
    /// Stations (lowercase), in alphabetical order
    pub sites: Vec<String>,
    /// Satellites, in ascending order
    pub satellites: Vec<SV>,
}

impl Outliers {
    /// True when nothing was flagged
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty() && self.satellites.is_empty()
    }
}

/// Groups residuals per station and per satellite, and flags
/// the groups whose RMS exceeds the current threshold.
#[derive(Debug, Clone, Copy)]
pub struct ResidualAnalyzer {
    thresholds: ResidualThresholds,
}

impl ResidualAnalyzer {
    pub fn new(thresholds: ResidualThresholds) -> Self {
        Self { thresholds }
    }

    /// Dispersion of each station
    pub fn site_dispersion(records: &[ResidualRecord]) -> HashMap<String, Dispersion> {
        let mut groups = HashMap::<String, Dispersion>::new();
        for record in records.iter() {
            groups
                .entry(record.site.clone())
                .or_default()
                .accumulate(record.residual);
        }
        groups.into_iter().map(|(k, v)| (k, v.finalize())).collect()
    }

    /// Dispersion of each satellite
    pub fn satellite_dispersion(records: &[ResidualRecord]) -> HashMap<SV, Dispersion> {
        let mut groups = HashMap::<SV, Dispersion>::new();
        for record in records.iter() {
            groups
                .entry(record.sv)
                .or_default()
                .accumulate(record.residual);
        }
        groups.into_iter().map(|(k, v)| (k, v.finalize())).collect()
    }

    /// Flags bad stations and satellites. Thresholds tighten with
    /// each `iteration` of the convergence loop.
    pub fn analyze(&self, records: &[ResidualRecord], iteration: usize) -> Outliers {
        let (site_max, sat_max) = self.thresholds.at_iteration(iteration);
        let min_samples = self.thresholds.min_samples;

        debug!(
            "residual analysis #{}: {} residuals, site <= {:.3}, sat <= {:.3}",
            iteration,
            records.len(),
            site_max,
            sat_max
        );

        let sites = Self::site_dispersion(records)
            .into_iter()
            .filter(|(_, d)| d.samples >= min_samples && d.rms > site_max)
            .inspect(|(site, d)| {
                warn!(
                    "station {} rms={:.4} ({} residuals) exceeds {:.4}",
                    site, d.rms, d.samples, site_max
                )
            })
            .map(|(site, _)| site)
            .sorted()
            .collect();

        let satellites = Self::satellite_dispersion(records)
            .into_iter()
            .filter(|(_, d)| d.samples >= min_samples && d.rms > sat_max)
            .inspect(|(sv, d)| {
                warn!(
                    "satellite {} rms={:.4} ({} residuals) exceeds {:.4}",
                    sv, d.rms, d.samples, sat_max
                )
            })
            .map(|(sv, _)| sv)
            .sorted()
            .collect();

        Outliers { sites, satellites }
    }
}

/// Estimator quality gate. Returns the sigma when it is acceptable.
pub fn sigma_check(sigma: Option<f64>, max_sigma: f64) -> Result<f64, Error> {
    match sigma {
        None => Err(Error::MissingSigma),
        Some(sigma) if sigma.is_nan() || sigma > max_sigma => Err(Error::SigmaOutOfBound {
            sigma,
            max: max_sigma,
        }),
        Some(sigma) => Ok(sigma),
    }
}

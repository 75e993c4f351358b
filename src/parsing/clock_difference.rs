//! Clock difference summaries
use std::{collections::HashSet, path::Path, str::FromStr};

use log::{debug, error, warn};

use super::{field, read_lines, tail};

use crate::{
    constants::{CLOCK_DIFFERENCE_CEILING, CLOCK_REFERENCE_PRIORITY},
    prelude::{Constellation, SV},
};

/// Daily clock difference of one satellite, relative to
/// the reference satellite of its constellation.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockDifferenceRecord {
    /// MJD
    pub day: u32,
    pub sv: SV,
    pub constellation: Constellation,
    pub value: f64,
}

/// Selects the reference satellite of each constellation: the first
/// satellite of the priority list that is present.
pub fn reference_satellites(present: &[SV]) -> Vec<SV> {
    let mut constellations = HashSet::new();
    CLOCK_REFERENCE_PRIORITY
        .iter()
        .filter_map(|sv| SV::from_str(sv).ok())
        .filter(|sv| present.contains(sv))
        .filter(|sv| constellations.insert(sv.constellation))
        .collect()
}

/// Reads the "NAME" and "STD" rows of a summary file, tagged with `day`.
/// Reference satellites and outliers are excluded. When `reference` is not
/// given, one reference per constellation is selected with [reference_satellites].
pub fn read_clock_difference_summary(
    path: &Path,
    day: u32,
    reference: Option<SV>,
) -> Option<Vec<ClockDifferenceRecord>> {
    let Some(lines) = read_lines(path) else {
        error!("file not found {}", path.display());
        return None;
    };

    let mut names = Vec::<String>::new();
    let mut values = String::new();

    for line in lines.iter() {
        if field(line, 0, 4) == "NAME" {
            names = tail(line, 4)
                .split_ascii_whitespace()
                .map(|name| name.to_string())
                .collect();
        }
        if field(line, 0, 3) == "STD" {
            values = tail(line, 4).to_string();
        }
    }

    if names.is_empty() || values.is_empty() {
        return Some(Vec::new());
    }

    let values = values.split_ascii_whitespace().collect::<Vec<_>>();
    if values.len() != names.len() {
        warn!(
            "{}: {} satellites but {} values",
            path.display(),
            names.len(),
            values.len()
        );
    }

    let records = names
        .iter()
        .zip(values.iter())
        .filter_map(|(name, value)| {
            let sv = SV::from_str(name).ok()?;
            match value.parse::<f64>() {
                Ok(value) => Some(ClockDifferenceRecord {
                    day,
                    sv,
                    constellation: sv.constellation,
                    value,
                }),
                Err(_) => {
                    debug!("{}({}) - invalid value \"{}\"", day, name, value);
                    None
                },
            }
        })
        .collect::<Vec<_>>();

    let references = match reference {
        Some(reference) => vec![reference],
        None => reference_satellites(&records.iter().map(|r| r.sv).collect::<Vec<_>>()),
    };

    Some(
        records
            .into_iter()
            .filter(|r| !references.contains(&r.sv))
            .filter(|r| {
                if r.value < CLOCK_DIFFERENCE_CEILING {
                    true
                } else {
                    debug!("{}({}) - clock difference outlier {}", r.day, r.sv, r.value);
                    false
                }
            })
            .collect(),
    )
}

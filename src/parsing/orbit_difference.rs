//! Orbit difference summaries and time series
use std::{path::Path, str::FromStr};

use log::{debug, error};

use super::{field, read_lines, tail};

use crate::{
    constants::{ORBIT_DIFFERENCE_CEILING_CM, SECONDS_PER_DAY},
    prelude::{Vector3, SV},
};

/// Satellite names header
const SAT_HEADER: &str = "                SAT";

/// Separator between two satellite names in the header
const SAT_SEPARATOR: &str = "               ";

/// Width of one satellite (along, cross, radial) triplet
const TRIPLET_WIDTH: usize = 18;

/// Orbit difference component
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Along,
    Cross,
    Radial,
    /// Derived 3D magnitude
    ThreeD,
}

impl Component {
    pub const ALL: [Self; 4] = [Self::Along, Self::Cross, Self::Radial, Self::ThreeD];
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Along => write!(f, "along"),
            Self::Cross => write!(f, "cross"),
            Self::Radial => write!(f, "radial"),
            Self::ThreeD => write!(f, "3d"),
        }
    }
}

/// One orbit difference component
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitDifferenceRecord {
    /// Fractional MJD
    pub fmjd: f64,
    /// Seconds elapsed since the first epoch of the file
    pub elapsed_s: f64,
    pub sv: SV,
    pub component: Component,
    /// Difference (in centimeters)
    pub value_cm: f64,
}

/// Locates the satellite header, returns the satellite of each column
/// and the index of the next line.
fn parse_satellites(lines: &[String]) -> Option<(Vec<Option<SV>>, usize)> {
    let pos = lines.iter().position(|line| field(line, 0, 19) == SAT_HEADER)?;
    let names = tail(&lines[pos], 27).trim_end();
    if names.is_empty() {
        return None;
    }
    let satellites = names
        .split(SAT_SEPARATOR)
        .map(|name| SV::from_str(name.trim()).ok())
        .collect();
    Some((satellites, pos + 1))
}

/// Parses the MJD and seconds of day of an "ACR" row
fn parse_time(line: &str) -> Option<(f64, f64)> {
    let mjd = field(line, 4, 9).trim().parse::<f64>().ok()?;
    let sod = field(line, 10, 19).trim().parse::<f64>().ok()?;
    Some((mjd, sod))
}

/// Decodes one (along, cross, radial) triplet, in tenths of centimeters
fn decode_triplet(row: &str, i: usize) -> Option<(f64, f64, f64)> {
    let offset = i * TRIPLET_WIDTH;
    let along = field(row, offset, offset + 6).trim().parse::<i32>().ok()?;
    let cross = field(row, offset + 7, offset + 12).trim().parse::<i32>().ok()?;
    let radial = field(row, offset + 13, offset + 18).trim().parse::<i32>().ok()?;
    Some((
        along as f64 / 10.0,
        cross as f64 / 10.0,
        radial as f64 / 10.0,
    ))
}

/// Decodes all satellites of a row. The 3D component is derived, and
/// satellites beyond the sanity ceiling are dropped entirely.
fn decode_row(
    row: &str,
    satellites: &[Option<SV>],
    fmjd: f64,
    elapsed_s: f64,
    records: &mut Vec<OrbitDifferenceRecord>,
) {
    for (i, sv) in satellites.iter().enumerate() {
        let Some(sv) = sv else {
            continue;
        };
        let Some((along, cross, radial)) = decode_triplet(row, i) else {
            debug!("{:.5}({}) - invalid orbit difference", fmjd, sv);
            continue;
        };

        let norm = Vector3::new(along, cross, radial).norm();
        if norm > ORBIT_DIFFERENCE_CEILING_CM {
            debug!("{:.5}({}) - orbit difference outlier {:.1} cm", fmjd, sv, norm);
            continue;
        }

        for (component, value_cm) in Component::ALL
            .iter()
            .zip([along, cross, radial, norm].iter())
        {
            records.push(OrbitDifferenceRecord {
                fmjd,
                elapsed_s,
                sv: *sv,
                component: *component,
                value_cm: *value_cm,
            });
        }
    }
}

/// Reads the fit RMS row of an orbit difference summary
pub fn read_orbit_difference_summary(path: &Path) -> Option<Vec<OrbitDifferenceRecord>> {
    let Some(lines) = read_lines(path) else {
        error!("file not found {}", path.display());
        return None;
    };

    let Some((satellites, ptr)) = parse_satellites(&lines) else {
        error!("no satellite in {}", path.display());
        return None;
    };

    let lines = &lines[ptr..];

    let (mjd, sod) = lines
        .iter()
        .find(|line| field(line, 0, 3) == "ACR")
        .and_then(|line| parse_time(line))?;

    if mjd == 0.0 {
        return None;
    }

    let rms = lines.iter().find(|line| field(line, 0, 6) == "FITRMS")?;
    let rms = tail(rms, 19);
    if rms.is_empty() {
        return None;
    }

    let mut records = Vec::with_capacity(satellites.len() * 4);
    decode_row(
        rms,
        &satellites,
        mjd + sod / SECONDS_PER_DAY,
        0.0,
        &mut records,
    );
    Some(records)
}

/// Reads every "ACR" row of an orbit difference time series
pub fn read_orbit_difference_series(path: &Path) -> Option<Vec<OrbitDifferenceRecord>> {
    let Some(lines) = read_lines(path) else {
        error!("file not found {}", path.display());
        return None;
    };

    let Some((satellites, ptr)) = parse_satellites(&lines) else {
        error!("no satellite in {}", path.display());
        return None;
    };

    let mut first: Option<(f64, f64)> = None;
    let mut records = Vec::new();

    for line in lines[ptr..].iter().filter(|line| field(line, 0, 3) == "ACR") {
        let Some((mjd, sod)) = parse_time(line) else {
            debug!("invalid epoch \"{}\"", field(line, 0, 19));
            continue;
        };
        let (mjd0, sod0) = *first.get_or_insert((mjd, sod));
        let elapsed_s = (mjd - mjd0) * SECONDS_PER_DAY + sod - sod0;
        decode_row(
            tail(line, 19),
            &satellites,
            mjd + sod / SECONDS_PER_DAY,
            elapsed_s,
            &mut records,
        );
    }

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

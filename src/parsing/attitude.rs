//! Attitude files
use std::path::Path;

use log::{info, warn};

use super::{read_lines, ParsingError};

use crate::{
    constants::{ATTITUDE_INTERVAL_TOLERANCE_S, KNOWN_LEO_SATELLITES, MIN_ATTITUDE_RECORDS},
    prelude::MjdTime,
};

/// Normalized attitude file header
#[derive(Debug, Clone, PartialEq)]
pub struct AttitudeHeader {
    /// Satellite (uppercase)
    pub satellite: String,
    pub start: MjdTime,
    pub end: MjdTime,
    /// Record interval, truncated to whole seconds
    pub interval_s: f64,
}

impl std::fmt::Display for AttitudeHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "%% Header of attitude data for LEO satellite")?;
        writeln!(f, "% Satellite     {}", self.satellite)?;
        writeln!(
            f,
            "% Start time   {:>5}   {:>12.5}",
            self.start.mjd, self.start.sod
        )?;
        writeln!(f, "% End time     {:>5}   {:>12.5}", self.end.mjd, self.end.sod)?;
        writeln!(f, "% Time interval {:>5.1}", self.interval_s)?;
        writeln!(f, "%% End of Header")
    }
}

/// Parses the leading "MJD SOD" of a record
fn record_time(line: &str) -> Result<MjdTime, ParsingError> {
    let mut items = line.split_ascii_whitespace();
    let mjd = items.next().and_then(|mjd| mjd.parse::<i32>().ok());
    let sod = items.next().and_then(|sod| sod.parse::<f64>().ok());
    match (mjd, sod) {
        (Some(mjd), Some(sod)) => MjdTime::try_new(mjd, sod),
        _ => Err(ParsingError::InvalidRecord(line.to_string())),
    }
}

/// Builds the normalized header of given records
fn build_header(satellite: &str, records: &[String]) -> Result<AttitudeHeader, ParsingError> {
    if records.len() < MIN_ATTITUDE_RECORDS {
        return Err(ParsingError::TooFewRecords(records.len()));
    }

    let first = record_time(&records[0])?;
    let second = record_time(&records[1])?;
    let third = record_time(&records[2])?;
    let last = record_time(&records[records.len() - 1])?;

    let dt1 = second.diff(&first);
    let dt2 = third.diff(&second);

    if (dt1 - dt2).abs() >= ATTITUDE_INTERVAL_TOLERANCE_S {
        return Err(ParsingError::InconsistentInterval(dt1, dt2));
    }

    Ok(AttitudeHeader {
        satellite: satellite.to_uppercase(),
        start: first,
        end: last,
        interval_s: ((dt1 + dt2) / 2.0).trunc(),
    })
}

/// Rewrites an attitude file with a normalized header. The satellite is
/// taken from the file name (after its last '_') and must be one of
/// the [KNOWN_LEO_SATELLITES]. Returns `Ok(None)` when the file does not exist.
pub fn normalize_attitude_file(path: &Path) -> Result<Option<AttitudeHeader>, ParsingError> {
    normalize_attitude_file_among(path, &KNOWN_LEO_SATELLITES)
}

/// [normalize_attitude_file] against a custom satellite table
pub fn normalize_attitude_file_among(
    path: &Path,
    known: &[&str],
) -> Result<Option<AttitudeHeader>, ParsingError> {
    let satellite = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit('_').next())
        .unwrap_or_default()
        .to_lowercase();

    if !known.iter().any(|sv| sv.eq_ignore_ascii_case(&satellite)) {
        warn!("unknown satellite \"{}\" in attitude file name", satellite);
        return Err(ParsingError::UnknownSatellite(satellite));
    }

    let Some(lines) = read_lines(path) else {
        warn!("attitude file not found: {}", path.display());
        return Ok(None);
    };

    let records = lines
        .into_iter()
        .skip_while(|line| line.starts_with('%'))
        .collect::<Vec<_>>();

    let header = build_header(&satellite, &records)?;

    let mut content = header.to_string();
    for record in records.iter() {
        content.push_str(record);
        content.push('\n');
    }
    std::fs::write(path, content)?;

    info!(
        "{}: attitude of {} normalized ({} records)",
        path.display(),
        header.satellite,
        records.len()
    );

    Ok(Some(header))
}

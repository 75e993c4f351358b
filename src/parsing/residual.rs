//! Estimator residual ("recover") files
use std::{path::Path, str::FromStr};

use log::{debug, warn};

use super::{field, read_lines, tail};

use crate::prelude::{Duration, MjdTime, SV};

const TIME_INTERVAL_MARKER: &str = "##Time&Interval";
const SIGMA_MARKER: &str = "##Sigma0";

/// Run description found in the residual file header
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResidualHeader {
    /// Start of the processed arc
    pub start: MjdTime,
    /// Processing interval
    pub interval: Duration,
}

/// One observation residual
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRecord {
    /// Epoch index, starting at 1 for the first interval
    pub index: i64,
    /// Fractional MJD
    pub fmjd: f64,
    /// Seconds of day
    pub sod: f64,
    /// Station code (lowercase)
    pub site: String,
    pub sv: SV,
    /// Observable code
    pub observable: String,
    pub residual: f64,
    pub weight: f64,
}

/// Derives the 1-based epoch index of `t`
pub fn epoch_index(t: &MjdTime, start: &MjdTime, interval: Duration) -> i64 {
    (t.diff(start) / interval.to_seconds()).floor() as i64 + 1
}

/// Leading "##" lines
fn header_lines(lines: &[String]) -> impl Iterator<Item = &String> {
    lines.iter().take_while(|line| line.starts_with("##"))
}

fn parse_header(lines: &[String]) -> Option<ResidualHeader> {
    let line = header_lines(lines).find(|line| line.starts_with(TIME_INTERVAL_MARKER));

    let Some(line) = line.filter(|line| line.len() >= 62) else {
        warn!("cannot find {}", TIME_INTERVAL_MARKER);
        return None;
    };

    let start = match MjdTime::from_str(field(line, 28, 47)) {
        Ok(start) => start,
        Err(e) => {
            warn!("invalid {}: {}", TIME_INTERVAL_MARKER, e);
            return None;
        },
    };

    match field(line, 47, 62).trim().parse::<f64>() {
        Ok(interval_s) if interval_s > 0.0 => Some(ResidualHeader {
            start,
            interval: Duration::from_seconds(interval_s),
        }),
        _ => {
            warn!("invalid interval \"{}\"", field(line, 47, 62));
            None
        },
    }
}

fn parse_record(line: &str, header: &ResidualHeader) -> Option<ResidualRecord> {
    let t = MjdTime::from_str(field(line, 11, 30)).ok()?;
    let sv = SV::from_str(field(line, 48, 51).trim()).ok()?;
    let weight = field(line, 60, 74).trim().parse::<f64>().ok()?;
    let residual = field(line, 74, 89).trim().parse::<f64>().ok()?;
    Some(ResidualRecord {
        index: epoch_index(&t, &header.start, header.interval),
        fmjd: t.fmjd(),
        sod: t.sod,
        site: field(line, 39, 43).trim().to_lowercase(),
        sv,
        observable: field(line, 51, 59).trim().to_string(),
        residual,
        weight,
    })
}

/// Reads the run description
pub fn read_residual_header(path: &Path) -> Option<ResidualHeader> {
    parse_header(&read_lines(path)?)
}

/// Reads all "RES" records. Returns `None` when the header does not
/// describe the run start and interval.
pub fn read_residual_file(path: &Path) -> Option<Vec<ResidualRecord>> {
    let lines = read_lines(path)?;
    let header = parse_header(&lines)?;

    Some(
        lines
            .iter()
            .filter(|line| line.starts_with("RES"))
            .filter_map(|line| {
                let record = parse_record(line, &header);
                if record.is_none() {
                    debug!("invalid residual \"{}\"", line);
                }
                record
            })
            .collect(),
    )
}

/// Reads the a posteriori sigma the estimator reported in the header
pub fn read_sigma(path: &Path) -> Option<f64> {
    let lines = read_lines(path)?;
    let line = header_lines(&lines).find(|line| line.starts_with(SIGMA_MARKER))?;
    let value = tail(line, SIGMA_MARKER.len())
        .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == '=')
        .split_ascii_whitespace()
        .next()?;
    match value.parse::<f64>() {
        Ok(sigma) => Some(sigma),
        Err(_) => {
            warn!("invalid sigma \"{}\"", line);
            None
        },
    }
}

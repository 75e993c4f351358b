//! Precise orbit (SP3) files
use std::{path::Path, str::FromStr, time::Instant};

use log::{debug, info, warn};

use super::{field, read_lines};

use crate::{
    constants::MIN_ORBIT_FILE_LINES,
    prelude::{MjdTime, Vector3, SV},
};

/// Satellite position at one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitPositionRecord {
    pub epoch: MjdTime,
    pub sv: SV,
    /// Position in meters
    pub position_m: Vector3<f64>,
}

/// Parses the "*  YYYY MM DD hh mm ss.ssssssss" epoch header
fn parse_epoch(line: &str) -> Option<MjdTime> {
    let items = line[1..].split_ascii_whitespace().collect::<Vec<_>>();
    if items.len() < 6 {
        return None;
    }
    let year = items[0].parse::<i32>().ok()?;
    let month = items[1].parse::<u8>().ok()?;
    let day = items[2].parse::<u8>().ok()?;
    let hh = items[3].parse::<u8>().ok()?;
    let mm = items[4].parse::<u8>().ok()?;
    let ss = items[5].parse::<f64>().ok()?;
    MjdTime::maybe_from_ymd_hms(year, month, day, hh, mm, ss).ok()
}

/// Parses a "P" position line, kilometers are converted to meters.
fn parse_position(line: &str) -> Option<(SV, Vector3<f64>)> {
    let items = line[1..].split_ascii_whitespace().collect::<Vec<_>>();
    if items.len() < 4 {
        return None;
    }
    let sv = SV::from_str(items[0]).ok()?;
    let x_km = items[1].parse::<f64>().ok()?;
    let y_km = items[2].parse::<f64>().ok()?;
    let z_km = items[3].parse::<f64>().ok()?;
    Some((sv, Vector3::new(x_km, y_km, z_km) * 1000.0))
}

/// Reads all satellite positions. Velocity lines are discarded,
/// nothing is read past the "EOF" marker.
pub fn read_orbit_file(path: &Path) -> Option<Vec<OrbitPositionRecord>> {
    let start = Instant::now();
    let lines = read_lines(path)?;

    if lines.len() < MIN_ORBIT_FILE_LINES {
        warn!("orbit file too short ({} lines)", lines.len());
        return None;
    }

    let nsat = match lines[2].get(1..6).map(|s| s.trim().parse::<u32>()) {
        Some(Ok(nsat)) => nsat,
        _ => {
            warn!("cannot get number of satellites: \"{}\"", lines[2]);
            return None;
        },
    };

    debug!("{}: {} satellites", path.display(), nsat);

    let mut epoch: Option<MjdTime> = None;
    let mut records = Vec::with_capacity(lines.len());

    for line in lines.iter().filter(|line| !line.starts_with('V')) {
        if line.starts_with("EOF") {
            break;
        }
        if line.starts_with('*') {
            epoch = parse_epoch(line);
            if epoch.is_none() {
                debug!("invalid epoch line \"{}\"", line);
            }
            continue;
        }
        if !line.starts_with('P') {
            continue;
        }
        let Some(epoch) = epoch else {
            continue;
        };
        match parse_position(line) {
            Some((sv, position_m)) => records.push(OrbitPositionRecord {
                epoch,
                sv,
                position_m,
            }),
            None => debug!("invalid position line \"{}\"", field(line, 0, 60)),
        }
    }

    info!(
        "{} file is read in {:.2} seconds",
        path.display(),
        start.elapsed().as_secs_f64()
    );

    Some(records)
}

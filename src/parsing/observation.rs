//! RINEX 3 observation files
use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    str::FromStr,
    time::Instant,
};

use log::{debug, error, info, warn};

use super::{field, read_lines, rewrite_with_backup, tail, ParsingError};

use crate::{
    constants::{OBSERVATION_WIDTH, OBS_TYPES_PER_LINE},
    prelude::{MjdTime, SV},
};

/// Code and phase observations of one satellite at one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub epoch: MjdTime,
    pub sv: SV,
    /// Observation code ("C1C", "L1C", ..) and its value
    pub observations: BTreeMap<String, f64>,
}

/// Observation codes, per system letter
type ObservationTypes = HashMap<char, Vec<String>>;

/// Parses the header and returns the observation codes with the index
/// of the first record line.
fn parse_header(lines: &[String]) -> Result<(ObservationTypes, usize), ParsingError> {
    let mut types = ObservationTypes::new();
    let mut ptr = 0;

    while ptr < lines.len() {
        let line = &lines[ptr];
        ptr += 1;

        if line.find("END OF HEADER") == Some(60) {
            break;
        }
        if line.find("SYS / # / OBS TYPES") != Some(60) {
            continue;
        }

        let system = line.chars().next().unwrap_or(' ');
        let mut items = field(line, 0, 60).split_ascii_whitespace().skip(1);

        let count = items
            .next()
            .and_then(|count| count.parse::<usize>().ok())
            .ok_or(ParsingError::InvalidObservationTypes(system))?;

        let mut codes = items.map(|code| code.to_string()).collect::<Vec<_>>();

        // continuation lines
        if count > OBS_TYPES_PER_LINE {
            for _ in 0..count.div_ceil(OBS_TYPES_PER_LINE) - 1 {
                let line = lines
                    .get(ptr)
                    .ok_or(ParsingError::InvalidObservationTypes(system))?;
                codes.extend(
                    field(line, 0, 60)
                        .split_ascii_whitespace()
                        .map(|code| code.to_string()),
                );
                ptr += 1;
            }
        }

        if codes.len() != count {
            error!(
                "system {}: {} observation codes declared, {} found",
                system,
                count,
                codes.len()
            );
            return Err(ParsingError::InvalidObservationTypes(system));
        }

        types.insert(system, codes);
    }

    if types.is_empty() {
        return Err(ParsingError::MissingObservationTypes);
    }

    Ok((types, ptr))
}

/// Parses one satellite line, retaining code and phase observations only.
fn parse_satellite_line(
    line: &str,
    epoch: MjdTime,
    types: &ObservationTypes,
) -> Option<ObservationRecord> {
    let id = field(line, 0, 3);
    let system = id.chars().next()?;
    let codes = types.get(&system)?;
    let sv = SV::from_str(id.trim()).ok()?;

    let mut observations = BTreeMap::new();

    for (i, code) in codes.iter().enumerate() {
        if !code.starts_with('C') && !code.starts_with('L') {
            continue;
        }
        let offset = 3 + OBSERVATION_WIDTH * i;
        if let Ok(value) = field(line, offset, offset + 14).trim().parse::<f64>() {
            observations.insert(code.clone(), value);
        }
    }

    Some(ObservationRecord {
        epoch,
        sv,
        observations,
    })
}

/// Parses the "> YYYY MM DD hh mm ss.sssssss  F NN" epoch line
fn parse_epoch_line(line: &str) -> Result<(MjdTime, String, usize), ParsingError> {
    let err = || ParsingError::UnexpectedEpochLine(line.to_string());

    let items = line[1..].split_ascii_whitespace().collect::<Vec<_>>();
    if items.len() != 8 && items.len() != 9 {
        return Err(err());
    }

    let year = items[0].parse::<i32>().map_err(|_| err())?;
    let month = items[1].parse::<u8>().map_err(|_| err())?;
    let day = items[2].parse::<u8>().map_err(|_| err())?;
    let hh = items[3].parse::<u8>().map_err(|_| err())?;
    let mm = items[4].parse::<u8>().map_err(|_| err())?;
    let ss = items[5].parse::<f64>().map_err(|_| err())?;
    let nsat = items[7].parse::<usize>().map_err(|_| err())?;

    Ok((
        MjdTime::maybe_from_ymd_hms(year, month, day, hh, mm, ss).map_err(|_| err())?,
        items[6].to_string(),
        nsat,
    ))
}

/// Reads all code and phase observations.
///
/// Returns `Ok(None)` when the file does not exist. Epoch flags 1, 3, 5 and 6
/// are not supported and abort the file, flag 4 event blocks are skipped.
pub fn read_observation_file(
    path: &Path,
) -> Result<Option<Vec<ObservationRecord>>, ParsingError> {
    let start = Instant::now();

    let Some(lines) = read_lines(path) else {
        error!("no observation file {}", path.display());
        return Ok(None);
    };

    let (types, mut ptr) = parse_header(&lines)?;
    let mut records = Vec::with_capacity(lines.len());

    while ptr < lines.len() {
        let line = &lines[ptr];

        if line.contains("COMMENT") || line.contains("APPROX POSITION XYZ") {
            ptr += 1;
            continue;
        }
        if line.contains("REC # / TYPE / VERS") {
            return Err(ParsingError::ReceiverChanged);
        }
        if !line.starts_with('>') {
            return Err(ParsingError::UnexpectedFormat(line.clone()));
        }

        let (epoch, flag, nsat) = parse_epoch_line(line)?;
        ptr += 1;

        match flag.as_str() {
            "1" | "3" | "5" | "6" => {
                return Err(ParsingError::UnsupportedEpochFlag(flag));
            },
            "4" => {
                while ptr < lines.len() {
                    let line = &lines[ptr];
                    if line.contains("COMMENT") {
                        debug!("{}", line.trim_end());
                    } else if !line.contains("SYS / PHASE SHIFT") {
                        break;
                    }
                    ptr += 1;
                }
            },
            _ => {
                if ptr + nsat > lines.len() {
                    return Err(ParsingError::TruncatedEpoch(epoch.to_string()));
                }
                for line in &lines[ptr..ptr + nsat] {
                    match parse_satellite_line(line, epoch, &types) {
                        Some(record) => records.push(record),
                        None => debug!("{} - invalid satellite line \"{}\"", epoch, line),
                    }
                }
                ptr += nsat;
            },
        }
    }

    info!(
        "{} file is read in {:.2} seconds",
        path.display(),
        start.elapsed().as_secs_f64()
    );

    Ok(Some(records))
}

/// Antenna type (model and radome) as written in header and ANTEX files
fn antenna_type(line: &str, start: usize) -> String {
    format!("{:<20}", field(line, start, start + 20))
}

/// Checks the antenna type of an observation header against the ANTEX
/// calibrations. When only the radome differs and `rewrite` is set, the header
/// takes the calibrated type (previous file kept as `.bak`).
///
/// Returns true when the observation file ends up with a calibrated antenna.
pub fn check_observation_antenna(
    path: &Path,
    antex: &Path,
    rewrite: bool,
) -> std::io::Result<bool> {
    let Some(mut lines) = read_lines(path) else {
        return Ok(false);
    };
    let Some(calibrations) = read_lines(antex) else {
        return Ok(false);
    };

    let ptr = lines
        .iter()
        .take_while(|line| !line.contains("END OF HEADER"))
        .position(|line| line.find("ANT #") == Some(60));

    let Some(ptr) = ptr else {
        warn!("{}: no antenna type in header", path.display());
        return Ok(false);
    };

    let observed = antenna_type(&lines[ptr], 20);
    let model = field(&observed, 0, 16);

    if model.trim().is_empty() {
        warn!("{}: blank antenna type", path.display());
        return Ok(false);
    }

    let Some(calibrated) = calibrations
        .iter()
        .map(|line| antenna_type(line, 0))
        .find(|calibrated| calibrated.starts_with(model))
    else {
        warn!(
            "{}: antenna {} not found in {}",
            path.display(),
            observed,
            antex.display()
        );
        return Ok(false);
    };

    if calibrated == observed {
        return Ok(true);
    }

    if !rewrite {
        warn!(
            "{}: antenna {} differs from {}",
            path.display(),
            observed,
            calibrated
        );
        return Ok(false);
    }

    let line = &lines[ptr];
    lines[ptr] = format!("{}{}{}", field(line, 0, 20), calibrated, tail(line, 40));

    let mut content = lines.join("\n");
    content.push('\n');
    rewrite_with_backup(path, &content)?;

    info!(
        "{}: antenna {} changed to {}",
        path.display(),
        observed.trim_end(),
        calibrated.trim_end()
    );
    Ok(true)
}

//! Solver timing logs
use std::{path::Path, str::FromStr};

use log::{debug, error};

use super::{field, read_lines};

use crate::prelude::{Duration, MjdTime};

const TIMING_MARKER: &str = "Time for Processing epoch";

/// Processing cost of one solver epoch
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EpochTiming {
    pub epoch: MjdTime,
    /// Time spent on this epoch
    pub processing: Duration,
    /// Receivers in use
    pub receivers: usize,
    /// Observations used
    pub observations: usize,
}

fn parse_timing(line: &str) -> Option<EpochTiming> {
    let epoch = MjdTime::from_str(field(line, 27, 46)).ok()?;
    let seconds = field(line, 55, 65).trim().parse::<f64>().ok()?;
    if !seconds.is_finite() {
        return None;
    }

    Some(EpochTiming {
        epoch,
        processing: Duration::from_seconds(seconds),
        receivers: field(line, 92, 95).trim().parse().ok()?,
        observations: field(line, 115, 123).trim().parse().ok()?,
    })
}

/// Reads the per epoch processing costs reported by the solver.
/// Lines that are not timing reports are ignored.
pub fn read_timing_log(path: &Path) -> Option<Vec<EpochTiming>> {
    let Some(lines) = read_lines(path) else {
        error!("no timing log {}", path.display());
        return None;
    };

    let records = lines
        .iter()
        .filter(|line| line.starts_with(TIMING_MARKER))
        .filter_map(|line| {
            let record = parse_timing(line);
            if record.is_none() {
                debug!("invalid timing line \"{}\"", line);
            }
            record
        })
        .collect();

    Some(records)
}

//! Fixed column file formats.
//!
//! Every reader converts one file into an ordered list of records.
//! A missing file is never an error: it is logged and reported as `None`,
//! callers decide whether absence is fatal. Lines that do not honor their
//! column contract are skipped. Only structural violations, that would
//! shift every following line, abort the file with a [ParsingError].
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use log::warn;
use thiserror::Error;

pub mod ambiguity;
pub mod attitude;
pub mod clock;
pub mod clock_difference;
pub mod observation;
pub mod orbit;
pub mod orbit_difference;
pub mod residual;
pub mod site;
pub mod timing;

#[derive(Debug, Error)]
pub enum ParsingError {
    #[error("invalid datetime \"{0}\"")]
    DateTime(String),

    #[error("missing file \"{}\"", .0.display())]
    MissingFile(PathBuf),

    #[error("receiver type changed within observation file")]
    ReceiverChanged,

    #[error("unexpected epoch line \"{0}\"")]
    UnexpectedEpochLine(String),

    #[error("unexpected line \"{0}\" where an epoch was expected")]
    UnexpectedFormat(String),

    #[error("epoch flag {0} is not supported")]
    UnsupportedEpochFlag(String),

    #[error("invalid observation types for system {0}")]
    InvalidObservationTypes(char),

    #[error("no observation types declared in header")]
    MissingObservationTypes,

    #[error("epoch {0} announces more satellites than lines left")]
    TruncatedEpoch(String),

    #[error("unknown satellite \"{0}\"")]
    UnknownSatellite(String),

    #[error("too few records: {0}")]
    TooFewRecords(usize),

    #[error("invalid record \"{0}\"")]
    InvalidRecord(String),

    #[error("inconsistent record interval: {0} != {1}")]
    InconsistentInterval(f64, f64),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reads all lines of a file, or logs why it could not.
pub(crate) fn read_lines(path: &Path) -> Option<Vec<String>> {
    let fd = match File::open(path) {
        Ok(fd) => fd,
        Err(e) => {
            warn!("file not found \"{}\": {}", path.display(), e);
            return None;
        },
    };
    match BufReader::new(fd).lines().collect::<Result<Vec<_>, _>>() {
        Ok(lines) => Some(lines),
        Err(e) => {
            warn!("failed to read \"{}\": {}", path.display(), e);
            None
        },
    }
}

/// Returns columns [start, end) of a line, truncated to what is available.
pub(crate) fn field(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

/// Returns columns [start, ..) of a line
pub(crate) fn tail(line: &str, start: usize) -> &str {
    line.get(start..).unwrap_or("")
}

/// Rewrites a file in place. The previous version is kept as `.bak`
/// on first modification only.
pub(crate) fn rewrite_with_backup(path: &Path, content: &str) -> std::io::Result<()> {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".bak");
    let backup = PathBuf::from(backup);
    if !backup.exists() {
        std::fs::rename(path, &backup)?;
    }
    std::fs::write(path, content)
}

//! Ambiguity flag files
use std::{path::Path, str::FromStr};

use log::{debug, error, info, warn};

use super::{field, read_lines, residual::ResidualRecord, rewrite_with_backup, tail};

/// Header lines start with this marker
const HEADER_MARKER: char = '%';

const AVAILABLE_OBSERVATIONS: &str = "%Available observations";

/// File name endings of flag files: one per frequency combination
const FLAG_FILE_SUFFIXES: [&str; 4] = ["o.log", "o.log13", "o.log14", "o.log15"];

/// Status of one ambiguity interval
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AmbiguityStatus {
    /// New ambiguity
    Amb,
    /// Interval continues the previous ambiguity
    Iam,
    /// Deleted interval
    Del,
    /// Bad interval
    Bad,
}

impl std::fmt::Display for AmbiguityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Amb => write!(f, "AMB"),
            Self::Iam => write!(f, "IAM"),
            Self::Del => write!(f, "DEL"),
            Self::Bad => write!(f, "BAD"),
        }
    }
}

impl FromStr for AmbiguityStatus {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AMB" => Ok(Self::Amb),
            "IAM" => Ok(Self::Iam),
            "DEL" => Ok(Self::Del),
            "BAD" => Ok(Self::Bad),
            _ => Err(()),
        }
    }
}

/// One flagged interval
#[derive(Debug, Clone, PartialEq)]
pub struct AmbiguityFlagRecord {
    pub status: AmbiguityStatus,
    /// Satellite, as written in the file
    pub satellite: String,
    /// First epoch index of the interval
    pub start: u32,
    /// Last epoch index of the interval
    pub end: u32,
    /// Remainder of the line, preserved as is
    pub trailer: String,
}

impl AmbiguityFlagRecord {
    fn parse(line: &str) -> Option<Self> {
        let status = AmbiguityStatus::from_str(field(line, 0, 3)).ok()?;
        let start = field(line, 7, 14).trim().parse::<u32>().ok()?;
        let end = field(line, 14, 21).trim().parse::<u32>().ok()?;
        Some(Self {
            status,
            satellite: field(line, 4, 7).to_string(),
            start,
            end,
            trailer: tail(line, 21).to_string(),
        })
    }
}

impl std::fmt::Display for AmbiguityFlagRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} {}{:>7}{:>7}{}",
            self.status, self.satellite, self.start, self.end, self.trailer
        )
    }
}

/// Ambiguity flag file content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbiguityFlagFile {
    /// Header lines, preserved verbatim
    pub header: Vec<String>,
    pub records: Vec<AmbiguityFlagRecord>,
}

impl AmbiguityFlagFile {
    /// Parses the file content. Lines that are neither header
    /// nor valid records are dropped.
    pub fn parse(lines: &[String]) -> Self {
        let mut s = Self::default();
        for line in lines.iter() {
            if line.starts_with(HEADER_MARKER) {
                s.header.push(line.clone());
            } else if let Some(record) = AmbiguityFlagRecord::parse(line) {
                s.records.push(record);
            } else if !line.trim().is_empty() {
                debug!("invalid ambiguity flag \"{}\"", line);
            }
        }
        s
    }

    pub fn read(path: &Path) -> Option<Self> {
        Some(Self::parse(&read_lines(path)?))
    }

    /// Sorts records by satellite then interval start
    pub fn sort(&mut self) {
        self.records.sort_by(|a, b| {
            a.satellite
                .cmp(&b.satellite)
                .then_with(|| a.start.cmp(&b.start))
        });
    }

    /// Rewrites in place, keeping a `.bak` of the previous version on
    /// first modification.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        rewrite_with_backup(path, &self.to_string())
    }
}

impl std::fmt::Display for AmbiguityFlagFile {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for line in self.header.iter() {
            writeln!(f, "{}", line)?;
        }
        for record in self.records.iter() {
            writeln!(f, "{}", record)?;
        }
        Ok(())
    }
}

/// A flag file is valid when it holds at least one live ambiguity, and
/// announces at least `min_observations` available observations.
pub fn check_ambiguity_flags(path: &Path, min_observations: usize) -> bool {
    let Some(lines) = read_lines(path) else {
        return false;
    };

    let mut available = 0;
    let mut found = false;

    for line in lines.iter() {
        if field(line, 0, 23) == AVAILABLE_OBSERVATIONS {
            available = field(line, 27, 38).trim().parse::<usize>().unwrap_or(0);
        }
        if matches!(field(line, 0, 3), "AMB" | "IAM") {
            found = true;
            break;
        }
    }

    if !found {
        warn!("no valid ambiguity in {}", path.display());
        false
    } else if available < min_observations {
        warn!("too few obs in {}: {:8}", path.display(), available);
        false
    } else {
        true
    }
}

/// Replaces status `old` by `new` on every record line.
/// Header lines are preserved.
pub fn switch_flags(
    path: &Path,
    old: AmbiguityStatus,
    new: AmbiguityStatus,
) -> std::io::Result<()> {
    let Some(lines) = read_lines(path) else {
        return Ok(());
    };

    let old = format!("{} ", old);
    let new = format!("{} ", new);

    let content = lines
        .iter()
        .map(|line| match line.strip_prefix(old.as_str()) {
            Some(rest) => format!("{}{}\n", new, rest),
            None => format!("{}\n", line),
        })
        .collect::<String>();

    rewrite_with_backup(path, &content)
}

/// Re-sorts a flag file into its canonical layout
pub fn rewrite_sorted(path: &Path) -> std::io::Result<()> {
    let Some(mut file) = AmbiguityFlagFile::read(path) else {
        return Ok(());
    };
    file.sort();
    file.write(path)
}

/// Continuous tracking arc of one satellite, expressed in epochs
/// of a sampling coarser than the flag file one.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingArc {
    /// Satellite, as written in flag files
    pub satellite: String,
    /// First epoch index
    pub start: u32,
    /// Last epoch index
    pub end: u32,
}

impl TrackingArc {
    /// True when this arc, once rescaled by `ratio`, lies within the flagged interval
    fn within(&self, record: &AmbiguityFlagRecord, ratio: u32) -> bool {
        let ratio = ratio as i64;
        let (start, end) = (record.start as i64, record.end as i64);
        self.satellite == record.satellite
            && self.start as i64 * ratio > start - ratio + 1
            && (self.end as i64) * ratio < end + ratio
    }
}

/// Tracking arcs of one station, from its residuals: a new arc starts
/// whenever a satellite misses one epoch.
pub fn tracking_arcs(residuals: &[ResidualRecord], site: &str) -> Vec<TrackingArc> {
    let mut epochs = residuals
        .iter()
        .filter(|r| r.site == site && r.index > 0)
        .filter_map(|r| Some((r.sv.to_string(), u32::try_from(r.index).ok()?)))
        .collect::<Vec<_>>();

    epochs.sort();
    epochs.dedup();

    let mut arcs = Vec::<TrackingArc>::new();

    for (satellite, index) in epochs {
        match arcs.last_mut() {
            Some(arc) if arc.satellite == satellite && arc.end.checked_add(1) == Some(index) => {
                arc.end = index;
            },
            _ => arcs.push(TrackingArc {
                satellite,
                start: index,
                end: index,
            }),
        }
    }

    arcs
}

/// Turns [AmbiguityStatus::Iam] intervals back into new ambiguities
/// wherever one of the `arcs`, sampled `ratio` times coarser, lies within them.
/// The previous version is kept as `.bak`. Returns the number of reverted intervals.
pub fn clean_ambiguity_flags(
    path: &Path,
    arcs: &[TrackingArc],
    ratio: u32,
) -> std::io::Result<usize> {
    let Some(mut file) = AmbiguityFlagFile::read(path) else {
        return Ok(0);
    };

    let mut reverted = 0;

    for record in file
        .records
        .iter_mut()
        .filter(|record| record.status == AmbiguityStatus::Iam)
    {
        if arcs.iter().any(|arc| arc.within(record, ratio)) {
            record.status = AmbiguityStatus::Amb;
            reverted += 1;
        }
    }

    file.write(path)?;
    debug!("{}: {} intervals reverted", path.display(), reverted);
    Ok(reverted)
}

/// Converts every flag file of `src` into the canonical (sorted) layout,
/// written with the same name in `dst`. Returns the number of converted files.
pub fn convert_ambiguity_flags_dir(src: &Path, dst: &Path) -> std::io::Result<usize> {
    if !src.is_dir() {
        error!("path not exists {}", src.display());
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            src.display().to_string(),
        ));
    }

    std::fs::create_dir_all(dst)?;

    let mut converted = 0;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        // station (4) + day of year (3) at least
        if name.len() < 7 || !FLAG_FILE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            continue;
        }

        let Some(mut file) = AmbiguityFlagFile::read(&entry.path()) else {
            continue;
        };

        file.sort();
        std::fs::write(dst.join(name), file.to_string())?;
        converted += 1;
    }

    info!("{} ambiguity flag files converted", converted);
    Ok(converted)
}

#[cfg(test)]
mod test {
    use super::{tracking_arcs, AmbiguityFlagFile, AmbiguityFlagRecord, AmbiguityStatus, TrackingArc};
    use crate::prelude::{Constellation, ResidualRecord, SV};

    fn residual(site: &str, prn: u8, index: i64) -> ResidualRecord {
        ResidualRecord {
            index,
            fmjd: 58849.0,
            sod: 0.0,
            site: site.to_string(),
            sv: SV::new(Constellation::GPS, prn),
            observable: "LC12".to_string(),
            residual: 0.01,
            weight: 1.0,
        }
    }

    #[test]
    fn record() {
        let line = "AMB G05     12    250  some trailer";
        let record = AmbiguityFlagRecord::parse(line).unwrap();
        assert_eq!(record.status, AmbiguityStatus::Amb);
        assert_eq!(record.satellite, "G05");
        assert_eq!(record.start, 12);
        assert_eq!(record.end, 250);
        assert_eq!(record.trailer, "  some trailer");
        assert_eq!(record.to_string(), line);

        assert!(AmbiguityFlagRecord::parse("XYZ G05     12    250").is_none());
        assert!(AmbiguityFlagRecord::parse("AMB G05     ab    250").is_none());
    }

    #[test]
    fn sorting() {
        let lines = [
            "% header line 1",
            "IAM G12    100    200",
            "AMB G05     50     80",
            "% header line 2",
            "DEL G05     10     20",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>();

        let mut file = AmbiguityFlagFile::parse(&lines);
        assert_eq!(file.header.len(), 2);
        file.sort();

        assert_eq!(
            file.to_string(),
            "% header line 1\n% header line 2\nDEL G05     10     20\nAMB G05     50     80\nIAM G12    100    200\n"
        );
    }

    #[test]
    fn arcs() {
        let mut residuals = Vec::new();
        for index in [1, 2, 3, 3, 5, 6] {
            residuals.push(residual("abmf", 5, index));
        }
        for index in [2, 3] {
            residuals.push(residual("abmf", 1, index));
            residuals.push(residual("ajac", 1, index + 10));
        }

        let arc = |satellite: &str, start, end| TrackingArc {
            satellite: satellite.to_string(),
            start,
            end,
        };

        assert_eq!(
            tracking_arcs(&residuals, "abmf"),
            vec![arc("G01", 2, 3), arc("G05", 1, 3), arc("G05", 5, 6)]
        );
        assert_eq!(tracking_arcs(&residuals, "ajac"), vec![arc("G01", 12, 13)]);
        assert!(tracking_arcs(&residuals, "algo").is_empty());
    }
}

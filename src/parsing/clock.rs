//! RINEX clock files
use std::path::Path;

use log::{debug, error};

use super::{field, ParsingError};

use crate::prelude::MjdTime;

/// Clock record families
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub enum ClockType {
    /// Satellite clocks ("AS")
    #[default]
    Satellite,
    /// Receiver clocks ("AR")
    Receiver,
}

impl ClockType {
    fn marker(&self) -> &'static str {
        match self {
            Self::Satellite => "AS ",
            Self::Receiver => "AR ",
        }
    }
}

/// Clock offset of one satellite or station
#[derive(Debug, Clone, PartialEq)]
pub struct ClockRecord {
    pub epoch: MjdTime,
    /// Satellite or station name
    pub name: String,
    /// Clock offset (in seconds)
    pub offset_s: f64,
}

impl ClockRecord {
    fn parse(line: &str) -> Result<Self, ParsingError> {
        let err = || ParsingError::InvalidRecord(line.to_string());

        let name = field(line, 3, 7).trim().to_string();
        let year = field(line, 8, 12).trim().parse::<i32>().map_err(|_| err())?;
        let month = field(line, 13, 15).trim().parse::<u8>().map_err(|_| err())?;
        let day = field(line, 16, 18).trim().parse::<u8>().map_err(|_| err())?;
        let hh = field(line, 19, 21).trim().parse::<u8>().map_err(|_| err())?;
        let mm = field(line, 22, 24).trim().parse::<u8>().map_err(|_| err())?;
        let ss = field(line, 25, 34).trim().parse::<f64>().map_err(|_| err())?;
        let offset_s = field(line, 37, 59).trim().parse::<f64>().map_err(|_| err())?;

        Ok(Self {
            epoch: MjdTime::maybe_from_ymd_hms(year, month, day, hh, mm, ss)?,
            name,
            offset_s,
        })
    }
}

/// Reads all clock records of given [ClockType]
pub fn read_clock_file(path: &Path, clock_type: ClockType) -> Option<Vec<ClockRecord>> {
    if !path.is_file() {
        error!("file not found {}", path.display());
        return None;
    }

    let lines = super::read_lines(path)?;

    Some(
        lines
            .iter()
            .filter(|line| line.starts_with(clock_type.marker()) && line.len() >= 59)
            .filter_map(|line| match ClockRecord::parse(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!("{}", e);
                    None
                },
            })
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::ClockRecord;
    use crate::parsing::ParsingError;

    #[test]
    fn clock_record() {
        let line = "AS G01  2020 01 01 00 05 00.000000  2    1.234567890123E-04  1.0E-11";
        let record = ClockRecord::parse(line).unwrap();
        assert_eq!(record.name, "G01");
        assert_eq!(record.epoch.mjd, 58849);
        assert_eq!(record.epoch.sod, 300.0);
        assert_eq!(record.offset_s, 1.234567890123E-04);
    }

    #[test]
    fn corrupted_date() {
        let line = "AS G01  2020 02 30 00 05 00.000000  2    1.234567890123E-04  1.0E-11";
        assert!(matches!(
            ClockRecord::parse(line),
            Err(ParsingError::DateTime(_))
        ));

        let line = "AS G01  9999 01 01 00 05 00.000000  2    1.234567890123E-04  1.0E-11";
        assert!(matches!(
            ClockRecord::parse(line),
            Err(ParsingError::DateTime(_))
        ));
    }
}

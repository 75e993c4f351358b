//! Day count time representation used by all file formats
use std::str::FromStr;

use hifitime::{Duration, Epoch, TimeScale};

use crate::{
    constants::{SECONDS_PER_DAY, SUPPORTED_MJD, SUPPORTED_YEARS},
    parsing::ParsingError,
};

/// Maximal number of fractional second digits (nanoseconds)
const MAX_SUBSECOND_DIGITS: usize = 9;

/// UTC instant expressed as Modified Julian Day and seconds of that day.
/// Seconds of day always lie within [0, 86400).
#[derive(Debug, Copy, Clone, Default, PartialEq, PartialOrd)]
pub struct MjdTime {
    /// Modified Julian Day
    pub mjd: i32,
    /// Seconds of day
    pub sod: f64,
}

impl MjdTime {
    /// Builds [MjdTime], carrying possible day overflow of `sod` into `mjd`.
    ///
    /// ## Panics
    /// If `sod` is not finite. Use [Self::try_new] on file content.
    pub fn new(mjd: i32, sod: f64) -> Self {
        Self::from_epoch(Epoch::from_mjd_utc(mjd as f64) + Duration::from_seconds(sod))
    }

    /// Fallible [Self::new]. Fails on non finite seconds of day, or when
    /// the resulting day falls out of the supported years.
    pub fn try_new(mjd: i32, sod: f64) -> Result<Self, ParsingError> {
        let err = || ParsingError::DateTime(format!("{} {}", mjd, sod));

        if !sod.is_finite() {
            return Err(err());
        }

        let day = mjd as f64 + (sod / SECONDS_PER_DAY).floor();
        let (first, last) = (*SUPPORTED_MJD.start() as f64, *SUPPORTED_MJD.end() as f64);

        if day < first || day > last {
            return Err(err());
        }

        Ok(Self::new(mjd, sod))
    }

    /// Splits an [Epoch] into UTC day and seconds of day
    pub fn from_epoch(epoch: Epoch) -> Self {
        let epoch = epoch.to_time_scale(TimeScale::UTC);

        let mut mjd = epoch.to_mjd_utc_days().floor();
        let mut sod = (epoch - Epoch::from_mjd_utc(mjd)).to_seconds();

        // day count rounding, right around midnight
        if sod < 0.0 {
            mjd -= 1.0;
            sod += SECONDS_PER_DAY;
        } else if sod >= SECONDS_PER_DAY {
            mjd += 1.0;
            sod -= SECONDS_PER_DAY;
        }

        Self {
            mjd: mjd as i32,
            sod,
        }
    }

    /// Builds [MjdTime] from UTC calendar date and time of day.
    /// Fails on invalid dates and years out of the supported range.
    pub fn maybe_from_ymd_hms(
        year: i32,
        month: u8,
        day: u8,
        hh: u8,
        mm: u8,
        ss: f64,
    ) -> Result<Self, ParsingError> {
        let err = || {
            ParsingError::DateTime(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{}",
                year, month, day, hh, mm, ss
            ))
        };

        if !SUPPORTED_YEARS.contains(&year) || !(0.0..61.0).contains(&ss) {
            return Err(err());
        }

        let seconds = ss.trunc();
        let nanos = ((ss - seconds) * 1.0E9).round() as u32;

        let epoch = Epoch::maybe_from_gregorian_utc(year, month, day, hh, mm, seconds as u8, nanos)
            .map_err(|_| err())?;

        Ok(Self::from_epoch(epoch))
    }

    /// Builds [MjdTime] at midnight of given day of year.
    ///
    /// ## Panics
    /// If the year cannot be represented by [Epoch].
    pub fn from_year_doy(year: i32, doy: u16) -> Self {
        Self::from_epoch(Epoch::from_day_of_year(year, doy as f64, TimeScale::UTC))
    }

    /// Converts to [Epoch] (UTC)
    pub fn epoch(&self) -> Epoch {
        Epoch::from_mjd_utc(self.mjd as f64) + Duration::from_seconds(self.sod)
    }

    /// Fractional MJD
    pub fn fmjd(&self) -> f64 {
        self.mjd as f64 + self.sod / SECONDS_PER_DAY
    }

    /// Elapsed [Duration] from `rhs` to `self`
    pub fn elapsed(&self, rhs: &Self) -> Duration {
        self.epoch() - rhs.epoch()
    }

    /// Elapsed seconds from `rhs` to `self`
    pub fn diff(&self, rhs: &Self) -> f64 {
        self.elapsed(rhs).to_seconds()
    }

    /// Calendar (year, month, day)
    pub fn ymd(&self) -> (i32, u8, u8) {
        let (year, month, day, _, _, _, _) = self.epoch().to_gregorian_utc();
        (year, month, day)
    }

    pub fn year(&self) -> i32 {
        self.ymd().0
    }

    /// Day of year, starting at 1
    pub fn doy(&self) -> u16 {
        // evaluated at midnight, where the fractional part is null
        Epoch::from_mjd_utc(self.mjd as f64).day_of_year().round() as u16
    }

    /// Time of day as (hours, minutes, seconds)
    pub fn hms(&self) -> (u8, u8, f64) {
        let (_, _, _, hh, mm, ss, nanos) = self.epoch().to_gregorian_utc();
        (hh, mm, ss as f64 + nanos as f64 / 1.0E9)
    }
}

impl From<Epoch> for MjdTime {
    fn from(epoch: Epoch) -> Self {
        Self::from_epoch(epoch)
    }
}

impl std::fmt::Display for MjdTime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (year, month, day, hh, mm, ss, _) = self.epoch().to_gregorian_utc();
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            year, month, day, hh, mm, ss
        )
    }
}

impl FromStr for MjdTime {
    type Err = ParsingError;
    /// Parses "YYYY-MM-DD HH:MM:SS" (UTC), seconds may be fractional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsingError::DateTime(s.to_string());

        let mut items = s.split_ascii_whitespace();
        let (Some(date), Some(time), None) = (items.next(), items.next(), items.next()) else {
            return Err(err());
        };

        // the gregorian parser bounds neither of these
        let year = date.split('-').next().and_then(|year| year.parse::<i32>().ok());
        if !year.is_some_and(|year| SUPPORTED_YEARS.contains(&year)) {
            return Err(err());
        }
        if time
            .split_once('.')
            .is_some_and(|(_, subsec)| subsec.len() > MAX_SUBSECOND_DIGITS)
        {
            return Err(err());
        }

        let epoch = Epoch::from_gregorian_str(&format!("{} {}", date, time)).map_err(|_| err())?;
        Ok(Self::from_epoch(epoch))
    }
}

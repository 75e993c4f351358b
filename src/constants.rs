use std::ops::RangeInclusive;

use crate::prelude::Constellation;

/// Seconds in one day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Calendar years a file may refer to
pub(crate) const SUPPORTED_YEARS: RangeInclusive<i32> = 1900..=2099;

/// [SUPPORTED_YEARS] as Modified Julian Days (1900-01-01 to 2099-12-31)
pub(crate) const SUPPORTED_MJD: RangeInclusive<i32> = 15_020..=88_068;

/// Maximal number of estimator invocations, per stage.
pub const MAX_ITERATIONS: usize = 10;

/// 3D orbit difference (in centimeters) above which the whole
/// satellite record is considered noise and dropped.
pub const ORBIT_DIFFERENCE_CEILING_CM: f64 = 200.0;

/// Clock difference values greater or equal to this are outliers.
pub const CLOCK_DIFFERENCE_CEILING: f64 = 3.0;

/// Satellite must be present on this share of days to be summarized.
pub const COVERAGE_RATIO: f64 = 0.6;

/// Well tracked satellites, by order of preference, that may serve
/// as clock reference.
pub const CLOCK_REFERENCE_PRIORITY: [&str; 12] = [
    "G01", "G08", "G05", "E01", "E02", "C21", "C22", "C23", "C24", "C08", "R01", "R02",
];

/// Maximal number of observation codes on a single "SYS / # / OBS TYPES" line.
pub(crate) const OBS_TYPES_PER_LINE: usize = 13;

/// Width of one observation field (value + LLI + SSI).
pub(crate) const OBSERVATION_WIDTH: usize = 16;

/// An orbit file shorter than this cannot describe a daily arc.
pub(crate) const MIN_ORBIT_FILE_LINES: usize = 100;

/// An attitude file with fewer records cannot be trusted.
pub(crate) const MIN_ATTITUDE_RECORDS: usize = 100;

/// Tolerance on successive attitude record intervals (in seconds).
pub(crate) const ATTITUDE_INTERVAL_TOLERANCE_S: f64 = 0.001;

/// LEO satellites the solvers hold attitude and macro models for,
/// as found in attitude file names.
pub const KNOWN_LEO_SATELLITES: [&str; 16] = [
    "champ", "grace-a", "grace-b", "grace-c", "grace-d", "goce", "jason-1", "jason-2",
    "jason-3", "swarm-a", "swarm-b", "swarm-c", "sentinel-3a", "sentinel-3b", "sentinel-6a",
    "cosmic2-1",
];

/// Highest PRN number of given [Constellation]
pub(crate) fn max_prn(constellation: Constellation) -> u8 {
    match constellation {
        Constellation::GPS => 32,
        Constellation::Glonass => 27,
        Constellation::Galileo => 36,
        Constellation::BeiDou => 63,
        Constellation::QZSS => 10,
        Constellation::IRNSS => 14,
        _ => 0,
    }
}

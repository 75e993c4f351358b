#![doc = include_str!("../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

extern crate gnss_rs as gnss;

// private modules
mod analysis;
mod archive;
mod catalog;
mod cfg;
mod checkpoint;
mod constants;
mod detector;
mod error;
mod pipeline;
mod state;
mod summary;
mod time;
mod tool;

pub mod parsing;

#[cfg(test)]
mod tests;

// prelude
pub mod prelude {
    pub use crate::analysis::{sigma_check, Dispersion, Outliers, ResidualAnalyzer};
    pub use crate::archive::{archive_results, backup_dir, copy_result_files, labelled};
    pub use crate::catalog::FileCatalog;
    pub use crate::cfg::{
        Config, EditingThresholds, Error as ConfigError, ObsCombination, ResidualThresholds,
    };
    pub use crate::checkpoint::CheckpointManager;
    pub use crate::constants::{
        CLOCK_DIFFERENCE_CEILING, CLOCK_REFERENCE_PRIORITY, KNOWN_LEO_SATELLITES, MAX_ITERATIONS,
        ORBIT_DIFFERENCE_CEILING_CM,
    };
    pub use crate::detector::{
        DetectorReport, DetectorState, EstimationBackend, FileEstimation, OutlierDetector,
    };
    pub use crate::error::Error;
    pub use crate::parsing::{
        ambiguity::{AmbiguityFlagFile, AmbiguityFlagRecord, AmbiguityStatus, TrackingArc},
        attitude::AttitudeHeader,
        clock::{ClockRecord, ClockType},
        clock_difference::ClockDifferenceRecord,
        observation::ObservationRecord,
        orbit::OrbitPositionRecord,
        orbit_difference::{Component, OrbitDifferenceRecord},
        residual::{ResidualHeader, ResidualRecord},
        timing::EpochTiming,
        ParsingError,
    };
    pub use crate::pipeline::{BatchReport, Pipeline, Stage};
    pub use crate::state::ProcessState;
    pub use crate::summary::{
        Aggregation, DailyOrbitRms, DaySummary, SatelliteSummary, Summary, SummaryAggregator,
    };
    pub use crate::time::MjdTime;
    pub use crate::tool::{ExternalInvoker, SolverInvoker, Tool};
    // re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::{Duration, Epoch};
    pub use nalgebra::Vector3;
}

// pub export
pub use error::Error;

//! Multi-day roll up of orbit and clock differences
use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use itertools::Itertools;
use log::{debug, error, warn};

use crate::{
    cfg::Config,
    parsing::{
        clock_difference::{read_clock_difference_summary, ClockDifferenceRecord},
        orbit_difference::{read_orbit_difference_summary, Component, OrbitDifferenceRecord},
    },
    prelude::{Constellation, SV},
};

/// Aggregation modes
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Aggregation {
    /// One value per satellite, averaged over all days
    BySatellite,
    /// One value per day and constellation, averaged over all satellites
    ByDay,
}

/// Daily RMS of one orbit difference component
#[derive(Debug, Clone, PartialEq)]
pub struct DailyOrbitRms {
    /// MJD
    pub day: u32,
    pub sv: SV,
    pub constellation: Constellation,
    pub component: Component,
    pub rms_cm: f64,
}

/// Value of one satellite, averaged over the days it was present on
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteSummary {
    pub sv: SV,
    pub constellation: Constellation,
    /// Orbit component, `None` for clocks
    pub component: Option<Component>,
    pub value: f64,
}

/// Value of one day, averaged over the satellites of a constellation
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    /// MJD
    pub day: u32,
    pub constellation: Constellation,
    /// Orbit component, `None` for clocks
    pub component: Option<Component>,
    pub value: f64,
}

/// Aggregation result
#[derive(Debug, Clone, PartialEq)]
pub enum Summary<R> {
    /// Merged daily records, not aggregated
    Merged(Vec<R>),
    BySatellite(Vec<SatelliteSummary>),
    ByDay(Vec<DaySummary>),
}

fn rms(values: &[f64]) -> f64 {
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n > 0 {
        Some(sum / n as f64)
    } else {
        None
    }
}

/// Merges daily difference records, with minimal coverage filtering
#[derive(Debug, Clone, Copy)]
pub struct SummaryAggregator {
    /// Share of days a satellite must be present on
    pub coverage_ratio: f64,
    /// Minimal length of a daily orbit difference series
    pub min_orbit_epochs: usize,
}

impl SummaryAggregator {
    pub fn new(cfg: &Config) -> Self {
        Self {
            coverage_ratio: cfg.coverage_ratio,
            min_orbit_epochs: cfg.min_orbit_epochs,
        }
    }

    /// True when a satellite present on `present` days out of `ndays`
    /// is covered well enough
    fn covered(&self, present: usize, ndays: usize) -> bool {
        present as f64 >= ndays as f64 * self.coverage_ratio
    }

    /// Reduces the orbit differences of a single day to one RMS per
    /// satellite and component. The day is the MJD of the first record.
    /// Series shorter than the minimal length are skipped, except
    /// single valued (summary) ones.
    pub fn daily_orbit_rms(&self, records: &[OrbitDifferenceRecord]) -> Vec<DailyOrbitRms> {
        let Some(first) = records.first() else {
            return Vec::new();
        };
        let day = first.fmjd.floor() as u32;

        let mut series = BTreeMap::<(SV, Component), Vec<f64>>::new();
        for record in records.iter() {
            series
                .entry((record.sv, record.component))
                .or_default()
                .push(record.value_cm);
        }

        let mut rms_values = Vec::with_capacity(series.len());

        for sv in series.keys().map(|(sv, _)| *sv).dedup().collect::<Vec<_>>() {
            let epochs = series
                .get(&(sv, Component::Along))
                .map(|values| values.len())
                .unwrap_or(0);

            if epochs > 1 && epochs < self.min_orbit_epochs {
                debug!("{}({}) - only {} epochs", day, sv, epochs);
                continue;
            }

            for component in Component::ALL {
                if let Some(values) = series.get(&(sv, component)) {
                    rms_values.push(DailyOrbitRms {
                        day,
                        sv,
                        constellation: sv.constellation,
                        component,
                        rms_cm: rms(values),
                    });
                }
            }
        }

        rms_values
    }

    /// Aggregates orbit differences. Each entry of `days` holds the
    /// records of a single day.
    pub fn orbit(
        &self,
        days: &[Vec<OrbitDifferenceRecord>],
        mode: Option<Aggregation>,
    ) -> Summary<DailyOrbitRms> {
        let daily = days
            .iter()
            .flat_map(|records| self.daily_orbit_rms(records))
            .collect::<Vec<_>>();

        let ndays = daily.iter().map(|r| r.day).collect::<BTreeSet<_>>().len();

        match mode {
            None => Summary::Merged(daily),
            Some(Aggregation::BySatellite) => {
                let mut summaries = Vec::new();
                for (sv, records) in &daily.iter().sorted_by_key(|r| r.sv).chunk_by(|r| r.sv) {
                    let records = records.collect::<Vec<_>>();
                    let present = records.iter().map(|r| r.day).collect::<BTreeSet<_>>().len();
                    if !self.covered(present, ndays) {
                        debug!("{} present on {}/{} days", sv, present, ndays);
                        continue;
                    }
                    for component in Component::ALL {
                        let value = mean(
                            records
                                .iter()
                                .filter(|r| r.component == component)
                                .map(|r| r.rms_cm),
                        );
                        if let Some(value) = value {
                            summaries.push(SatelliteSummary {
                                sv,
                                constellation: sv.constellation,
                                component: Some(component),
                                value,
                            });
                        }
                    }
                }
                Summary::BySatellite(summaries)
            },
            Some(Aggregation::ByDay) => {
                let mut groups = BTreeMap::<(u32, Constellation, Component), Vec<f64>>::new();
                for r in daily.iter() {
                    groups
                        .entry((r.day, r.constellation, r.component))
                        .or_default()
                        .push(r.rms_cm);
                }
                Summary::ByDay(
                    groups
                        .into_iter()
                        .filter_map(|((day, constellation, component), values)| {
                            Some(DaySummary {
                                day,
                                constellation,
                                component: Some(component),
                                value: mean(values.into_iter())?,
                            })
                        })
                        .collect(),
                )
            },
        }
    }

    /// Aggregates clock differences collected over the supplied `days` (MJD).
    pub fn clock(
        &self,
        records: Vec<ClockDifferenceRecord>,
        days: &[u32],
        mode: Option<Aggregation>,
    ) -> Summary<ClockDifferenceRecord> {
        let ndays = days.len();

        match mode {
            None => Summary::Merged(records),
            Some(Aggregation::BySatellite) => {
                let mut summaries = Vec::new();
                for (sv, group) in &records.iter().sorted_by_key(|r| r.sv).chunk_by(|r| r.sv) {
                    let values = group.map(|r| r.value).collect::<Vec<_>>();
                    if !self.covered(values.len(), ndays) {
                        debug!("{} present on {}/{} days", sv, values.len(), ndays);
                        continue;
                    }
                    if let Some(value) = mean(values.into_iter()) {
                        summaries.push(SatelliteSummary {
                            sv,
                            constellation: sv.constellation,
                            component: None,
                            value,
                        });
                    }
                }
                Summary::BySatellite(summaries)
            },
            Some(Aggregation::ByDay) => {
                let constellations = records
                    .iter()
                    .map(|r| r.constellation)
                    .unique()
                    .sorted()
                    .collect::<Vec<_>>();

                let mut summaries = Vec::new();
                for day in days.iter() {
                    for constellation in constellations.iter() {
                        let value = mean(
                            records
                                .iter()
                                .filter(|r| r.day == *day && r.constellation == *constellation)
                                .map(|r| r.value),
                        );
                        if let Some(value) = value {
                            summaries.push(DaySummary {
                                day: *day,
                                constellation: *constellation,
                                component: None,
                                value,
                            });
                        }
                    }
                }
                Summary::ByDay(summaries)
            },
        }
    }

    /// Reads and aggregates a list of daily orbit difference summaries
    pub fn orbit_files<P: AsRef<Path>>(
        &self,
        files: &[P],
        mode: Option<Aggregation>,
    ) -> Summary<DailyOrbitRms> {
        let days = files
            .iter()
            .filter_map(|file| read_orbit_difference_summary(file.as_ref()))
            .filter(|records| !records.is_empty())
            .collect::<Vec<_>>();
        self.orbit(&days, mode)
    }

    /// Reads and aggregates a list of daily clock difference summaries,
    /// `days` tagging each file.
    pub fn clock_files<P: AsRef<Path>>(
        &self,
        files: &[P],
        days: &[u32],
        mode: Option<Aggregation>,
    ) -> Option<Summary<ClockDifferenceRecord>> {
        if files.is_empty() {
            error!("empty clock difference file list");
            return None;
        }
        if files.len() != days.len() {
            error!("one day is required per clock difference file");
            return None;
        }

        let records = files
            .iter()
            .zip(days.iter())
            .filter_map(|(file, day)| read_clock_difference_summary(file.as_ref(), *day, None))
            .flatten()
            .collect::<Vec<_>>();

        if records.is_empty() {
            warn!("no clock difference to summarize");
        }

        Some(self.clock(records, days, mode))
    }
}

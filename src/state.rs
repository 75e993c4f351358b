use log::{info, warn};

use crate::{
    cfg::Config,
    constants::max_prn,
    pipeline::Stage,
    prelude::{Constellation, Duration, MjdTime, SV},
};

/// State of one processing day, threaded through every stage.
/// A new [ProcessState] is built on each day, which resets all exclusions.
#[derive(Debug, Clone)]
pub struct ProcessState {
    /// Current [Stage]
    pub stage: Stage,
    /// Beginning of the processed day
    pub begin: MjdTime,
    /// Active stations (lowercase)
    pub sites: Vec<String>,
    /// Candidate satellites
    pub satellites: Vec<SV>,
    /// Processed constellations
    pub constellations: Vec<Constellation>,
    /// Convergence loop iteration
    pub iteration: usize,
    /// Reference center of the current comparison, if any
    pub center: Option<String>,
    /// Constellation of the current comparison, if any
    pub constellation: Option<Constellation>,
    excluded: Vec<SV>,
    interval: Duration,
    nominal_interval: Duration,
}

impl ProcessState {
    /// Builds the state of the day starting at `begin`
    pub fn new(cfg: &Config, begin: MjdTime, sites: Vec<String>) -> Self {
        let satellites = cfg
            .constellations
            .iter()
            .flat_map(|c| (1..=max_prn(*c)).map(|prn| SV::new(*c, prn)))
            .collect();

        let interval = Duration::from_seconds(cfg.interval_s);

        Self {
            stage: Stage::default(),
            begin,
            sites,
            satellites,
            constellations: cfg.constellations.clone(),
            iteration: 0,
            center: None,
            constellation: None,
            excluded: cfg.excluded_satellites.clone(),
            interval,
            nominal_interval: interval,
        }
    }

    /// Label of the current [Stage]
    pub fn label(&self) -> &'static str {
        self.stage.label()
    }

    /// Excluded satellites, in order of exclusion
    pub fn excluded(&self) -> &[SV] {
        &self.excluded
    }

    /// Satellites that are not excluded
    pub fn active_satellites(&self) -> Vec<SV> {
        self.satellites
            .iter()
            .filter(|sv| !self.excluded.contains(sv))
            .copied()
            .collect()
    }

    /// Removes stations from the active set
    pub fn remove_sites(&mut self, sites: &[String]) {
        if sites.is_empty() {
            return;
        }
        self.sites.retain(|site| !sites.contains(site));
        warn!("{} - STATIONS {} are removed", self.begin, sites.join(" "));
    }

    /// Appends satellites to the exclusion set. Satellites that are
    /// already excluded are not appended twice.
    pub fn exclude_satellites(&mut self, satellites: &[SV]) {
        let new = satellites
            .iter()
            .filter(|sv| !self.excluded.contains(sv))
            .copied()
            .collect::<Vec<_>>();

        if new.is_empty() {
            return;
        }

        warn!(
            "{} - SATELLITES {} are removed",
            self.begin,
            new.iter()
                .map(|sv| sv.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );

        self.excluded.extend(new);
    }

    /// Current processing interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Overrides the processing interval until [Self::reset_interval]
    pub fn override_interval(&mut self, interval: Duration) {
        info!("{} - interval set to {}", self.begin, interval);
        self.interval = interval;
    }

    /// Restores the configured processing interval
    pub fn reset_interval(&mut self) {
        self.interval = self.nominal_interval;
    }
}

#[cfg(test)]
mod test {
    use super::ProcessState;
    use crate::{
        cfg::Config,
        prelude::{Constellation, Duration, MjdTime, SV},
    };

    #[test]
    fn exclusions() {
        let mut cfg = Config::default();
        cfg.constellations = vec![Constellation::GPS, Constellation::BeiDou];

        let sites = vec!["abmf".to_string(), "ajac".to_string(), "algo".to_string()];
        let mut state = ProcessState::new(&cfg, MjdTime::from_year_doy(2020, 1), sites);

        assert_eq!(state.satellites.len(), 32 + 63);
        assert_eq!(state.excluded().len(), 15);
        assert_eq!(state.active_satellites().len(), 32 + 63 - 15);

        let g05 = SV::new(Constellation::GPS, 5);
        let c01 = SV::new(Constellation::BeiDou, 1);

        state.exclude_satellites(&[g05, c01]);
        state.exclude_satellites(&[g05]);
        assert_eq!(state.excluded().len(), 16);
        assert_eq!(state.excluded()[15], g05);

        state.remove_sites(&["ajac".to_string()]);
        assert_eq!(state.sites, vec!["abmf", "algo"]);
    }

    #[test]
    fn interval_override() {
        let cfg = Config::default();
        let mut state = ProcessState::new(&cfg, MjdTime::from_year_doy(2020, 1), vec![]);
        assert_eq!(state.interval(), Duration::from_seconds(300.0));

        state.override_interval(Duration::from_seconds(30.0));
        assert_eq!(state.interval(), Duration::from_seconds(30.0));

        state.reset_interval();
        assert_eq!(state.interval(), Duration::from_seconds(300.0));
    }
}

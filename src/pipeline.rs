//! Daily precise orbit determination workflow
use std::time::Instant;

use log::{error, info, warn};

use crate::{
    analysis::sigma_check,
    archive::{archive_results, backup_dir, copy_result_files, labelled},
    catalog::FileCatalog,
    cfg::{Config, EditingThresholds, ObsCombination},
    detector::{DetectorState, FileEstimation, OutlierDetector},
    error::Error,
    parsing::{
        ambiguity::check_ambiguity_flags, residual::read_sigma, site::read_site_list,
    },
    prelude::{Duration, MjdTime},
    state::ProcessState,
    tool::{SolverInvoker, Tool},
};

/// Ambiguity flag files directory
const AMBIGUITY_DIR: &str = "log_tb";

/// Ambiguity flag files, as they were before the first residual editing
const AMBIGUITY_BACKUP_DIR: &str = "log_tb_orig";

/// Categories saved at the end of the float and fixed solutions
const SOLUTION_CATEGORIES: [&str; 5] = ["ics", "orb", "satclk", "recclk", "recover"];

/// Labels archived at the end of a successful day
const ARCHIVED_LABELS: [&str; 2] = ["F3", "AR"];

/// Processing stages, in order of execution
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    /// First solution, with outlier detection
    #[default]
    FirstSolution,
    /// Float solution after the first residual editing
    RefinedFloatSolution,
    /// Float solution after the second residual editing
    FinalFloatSolution,
    /// Integer ambiguity resolution
    AmbiguityFixing,
    /// Solution with fixed ambiguities
    FixedSolution,
}

impl Stage {
    /// Label appended to the files this stage produces
    pub fn label(&self) -> &'static str {
        match self {
            Self::FirstSolution => "F1",
            Self::RefinedFloatSolution => "F2",
            Self::FinalFloatSolution => "F3",
            Self::AmbiguityFixing | Self::FixedSolution => "AR",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::FirstSolution => write!(f, "first-solution"),
            Self::RefinedFloatSolution => write!(f, "refined-float-solution"),
            Self::FinalFloatSolution => write!(f, "final-float-solution"),
            Self::AmbiguityFixing => write!(f, "ambiguity-fixing"),
            Self::FixedSolution => write!(f, "fixed-solution"),
        }
    }
}

/// Outcome of [Pipeline::process_batch]
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Days that were fully processed
    pub succeeded: Vec<MjdTime>,
    /// Abandoned days, and why
    pub failed: Vec<(MjdTime, Error)>,
}

/// Sequences the daily workflow. Each stage is gated on the previous one,
/// and a failed day is abandoned before its results are archived.
pub struct Pipeline<I: SolverInvoker> {
    cfg: Config,
    catalog: FileCatalog,
    invoker: I,
}

impl<I: SolverInvoker> Pipeline<I> {
    pub fn new(cfg: Config, invoker: I) -> Self {
        Self {
            catalog: FileCatalog::new(&cfg),
            cfg,
            invoker,
        }
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Sigma gate applied to each estimation
    fn check_sigma(&self, state: &ProcessState) -> Result<f64, Error> {
        let sigma = self
            .catalog
            .get_filename("recover", state)
            .and_then(|path| read_sigma(&path));
        let sigma = sigma_check(sigma, self.cfg.max_sigma)?;
        info!("{} - {} sigma={:.3}", state.begin, state.stage, sigma);
        Ok(sigma)
    }

    /// Compares orbits and clocks to each reference center
    fn evaluate(&mut self, state: &mut ProcessState) -> Result<(), Error> {
        let label = state.label();

        for center in self.cfg.ref_centers.iter() {
            state.center = Some(center.clone());
            self.invoker.invoke(
                Tool::OrbitDifference,
                state,
                &format!("orbdif_{}", center),
                &[],
            )?;
            copy_result_files(&self.catalog, state, &["orbdif"], label)?;

            for constellation in self.cfg.constellations.iter() {
                state.constellation = Some(*constellation);
                self.invoker.invoke(
                    Tool::ClockDifference,
                    state,
                    &format!("clkdif_{}_{:x}", center, constellation),
                    &[],
                )?;
                copy_result_files(&self.catalog, state, &["clkdif"], label)?;
            }
            state.constellation = None;
        }

        state.center = None;
        Ok(())
    }

    /// Writes the orbit and clock products of the current solution
    pub fn generate_products(&mut self, state: &ProcessState) -> Result<(), Error> {
        let label = state.label();

        self.invoker
            .invoke(Tool::ProductWriter, state, "orbsp3", &[])?;

        let sp3 = self.catalog.files("sp3_out", state, true);
        let satclk = self.catalog.files("satclk", state, true);

        if let Some(sp3) = sp3.first() {
            std::fs::copy(sp3, labelled(sp3, label))?;
        }

        if let (Some(satclk), Some(clk)) =
            (satclk.first(), self.catalog.get_filename("clk_out", state))
        {
            std::fs::copy(satclk, &clk)?;
            std::fs::copy(&clk, labelled(&clk, label))?;
        }

        Ok(())
    }

    /// Integrates the estimated orbits, then evaluates them
    fn integrate(&mut self, state: &mut ProcessState, products: bool) -> Result<(), Error> {
        self.invoker.invoke(Tool::Integrator, state, "oi", &[])?;
        self.evaluate(state)?;
        if products {
            self.generate_products(state)?;
        }
        Ok(())
    }

    /// Edits the residuals and updates the ambiguity flag files
    fn edit_residuals(
        &mut self,
        state: &ProcessState,
        thresholds: EditingThresholds,
    ) -> Result<(), Error> {
        self.invoker
            .invoke(Tool::ResidualEditor, state, "editres", &thresholds.to_args())
    }

    /// Drops stations without a valid ambiguity flag file
    fn validate_ambiguity_flags(&self, state: &mut ProcessState) -> Result<(), Error> {
        let invalid = state
            .sites
            .iter()
            .filter(|site| {
                let mut single = state.clone();
                single.sites = vec![site.to_string()];
                !self
                    .catalog
                    .files("ambflag", &single, false)
                    .iter()
                    .all(|path| check_ambiguity_flags(path, self.cfg.min_ambiguity_observations))
            })
            .cloned()
            .collect::<Vec<_>>();

        state.remove_sites(&invalid);

        if state.sites.is_empty() {
            Err(Error::InvalidAmbiguityFlags)
        } else {
            Ok(())
        }
    }

    fn first_solution(&mut self, state: &mut ProcessState) -> Result<(), Error> {
        state.stage = Stage::FirstSolution;

        if self.catalog.files("ics", state, true).is_empty() {
            let path = self
                .catalog
                .get_filename("ics", state)
                .unwrap_or_default();
            return Err(Error::MissingFile(path));
        }

        let detector = OutlierDetector::new(&self.cfg);
        let mut backend = FileEstimation::new(&mut self.invoker, &self.catalog);
        let report = detector.run(&mut backend, state)?;

        match report.state {
            DetectorState::Converged => {},
            DetectorState::FailedHardSigma => {
                return Err(Error::HardSigmaFailure(report.sigma.unwrap_or(f64::NAN)));
            },
            DetectorState::MaxIterationsExceeded | DetectorState::Running(_) => {
                return Err(Error::ConvergenceFailure(report.invocations));
            },
        }

        self.check_sigma(state)?;
        self.integrate(state, false)?;

        let work_dir = self.catalog.work_dir();
        backup_dir(
            &work_dir.join(AMBIGUITY_DIR),
            &work_dir.join(AMBIGUITY_BACKUP_DIR),
        )?;

        self.edit_residuals(state, self.cfg.first_editing)?;
        self.validate_ambiguity_flags(state)?;

        copy_result_files(&self.catalog, state, &["recover"], state.label())?;
        Ok(())
    }

    fn float_solution(
        &mut self,
        state: &mut ProcessState,
        stage: Stage,
        products: bool,
    ) -> Result<(), Error> {
        state.stage = stage;
        self.invoker
            .invoke(Tool::Estimator, state, "podlsq", &[])?;
        self.check_sigma(state)?;
        self.integrate(state, products)
    }

    fn fix_ambiguities(&mut self, state: &mut ProcessState) -> Result<(), Error> {
        state.stage = Stage::AmbiguityFixing;

        if self.cfg.obs_combination == ObsCombination::Uncombined {
            error!(
                "{} - ambiguity fixing is not available for {} combination",
                state.begin, self.cfg.obs_combination
            );
            return Err(Error::UnsupportedAmbiguityFixing(self.cfg.obs_combination));
        }

        state.override_interval(Duration::from_seconds(self.cfg.ambfix_interval_s));
        let result = self.invoker.invoke(
            Tool::AmbiguityFixer,
            state,
            "ambfix",
            &["-mode".to_string(), "DD".to_string()],
        );
        state.reset_interval();
        result
    }

    fn fixed_solution(&mut self, state: &mut ProcessState) -> Result<(), Error> {
        state.stage = Stage::FixedSolution;
        self.invoker.invoke(
            Tool::Estimator,
            state,
            "podlsq_fix",
            &["-fix_amb".to_string(), "-use_res_crd".to_string()],
        )?;
        self.check_sigma(state)?;
        self.integrate(state, true)
    }

    /// Archives the validated results of the day
    pub fn archive(&self, state: &mut ProcessState) -> Result<usize, Error> {
        let result_dir = self
            .cfg
            .result_dir
            .clone()
            .ok_or(Error::MissingResultDirectory)?;
        archive_results(
            &self.catalog,
            state,
            &result_dir,
            &self.cfg.ref_centers,
            &ARCHIVED_LABELS,
        )
    }

    fn run_stages(&mut self, state: &mut ProcessState) -> Result<(), Error> {
        let t = Instant::now();
        info!("{} ===> 1st iteration for precise orbit determination", state.begin);
        self.first_solution(state)?;
        info!("{} - finished 1st POD in {:.1} s", state.begin, t.elapsed().as_secs_f64());

        let t = Instant::now();
        info!("{} ===> 2nd iteration for precise orbit determination", state.begin);
        self.float_solution(state, Stage::RefinedFloatSolution, false)?;
        self.edit_residuals(state, self.cfg.second_editing)?;
        copy_result_files(&self.catalog, state, &["recover"], state.label())?;
        info!("{} - finished 2nd POD in {:.1} s", state.begin, t.elapsed().as_secs_f64());

        let t = Instant::now();
        info!("{} ===> 3rd iteration for precise orbit determination", state.begin);
        self.float_solution(state, Stage::FinalFloatSolution, true)?;
        copy_result_files(&self.catalog, state, &SOLUTION_CATEGORIES, state.label())?;
        info!("{} - finished 3rd POD in {:.1} s", state.begin, t.elapsed().as_secs_f64());

        let t = Instant::now();
        info!("{} ===> 4th iteration for precise orbit determination", state.begin);
        self.fix_ambiguities(state)?;
        self.fixed_solution(state)?;
        copy_result_files(&self.catalog, state, &SOLUTION_CATEGORIES, state.label())?;
        info!("{} - finished fixed POD in {:.1} s", state.begin, t.elapsed().as_secs_f64());

        Ok(())
    }

    /// Processes the day starting at `begin`. Any stage failure abandons
    /// the day, nothing is archived then.
    pub fn process_day(&mut self, begin: MjdTime) -> Result<(), Error> {
        let mut state = ProcessState::new(&self.cfg, begin, Vec::new());

        let site_list = self
            .catalog
            .get_filename("site_list", &state)
            .unwrap_or_default();
        state.sites = read_site_list(&site_list).ok_or(Error::MissingFile(site_list))?;

        info!(
            "{} - everything is ready: number of stations = {}, number of satellites = {}",
            begin,
            state.sites.len(),
            state.active_satellites().len()
        );

        if let Err(e) = self.run_stages(&mut state) {
            error!("{} - {} failed: {}", begin, state.stage, e);
            return Err(e);
        }

        match self.archive(&mut state) {
            Ok(_) => Ok(()),
            Err(Error::MissingResultDirectory) => {
                warn!("{} - no result directory: results are not archived", begin);
                Ok(())
            },
            Err(e) => Err(e),
        }
    }

    /// Processes consecutive days. A failed day does not stop the batch.
    pub fn process_batch(&mut self, days: &[MjdTime]) -> BatchReport {
        let mut report = BatchReport::default();
        for day in days.iter() {
            match self.process_day(*day) {
                Ok(_) => report.succeeded.push(*day),
                Err(e) => report.failed.push((*day, e)),
            }
        }
        info!(
            "batch completed: {} days processed, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }
}

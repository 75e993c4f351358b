//! Outlier detection: bounded re-processing of the estimator,
//! excluding bad stations and satellites until the residuals are clean.
use log::{error, info, warn};

use crate::{
    analysis::ResidualAnalyzer,
    catalog::FileCatalog,
    cfg::Config,
    checkpoint::CheckpointManager,
    error::Error,
    parsing::residual::{read_residual_file, read_sigma, ResidualRecord},
    state::ProcessState,
    tool::{SolverInvoker, Tool},
};

/// Checkpoint undone after each rejected iteration
const CHECKPOINT: &str = "outliers";

/// Files the estimator updates, and that are restored on rejection
const CHECKPOINT_CATEGORIES: [&str; 2] = ["ics", "orb"];

/// Convergence loop states
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DetectorState {
    /// Iteration in progress (0 based)
    Running(usize),
    /// Solution accepted
    Converged,
    /// Converged solution, but its sigma is not acceptable
    FailedHardSigma,
    /// Iteration cap reached with outliers remaining
    MaxIterationsExceeded,
}

impl DetectorState {
    /// True for all states but [Self::Running]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running(_))
    }
}

/// Outcome of a full convergence loop
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorReport {
    /// Terminal [DetectorState]
    pub state: DetectorState,
    /// Number of estimator invocations
    pub invocations: usize,
    /// Last reported sigma
    pub sigma: Option<f64>,
}

/// Everything the convergence loop needs from the estimation side
pub trait EstimationBackend {
    /// Snapshots the files the estimator is about to modify
    fn checkpoint(&mut self, state: &ProcessState) -> Result<(), Error>;
    /// Runs the estimator on the active stations and satellites
    fn estimate(&mut self, state: &ProcessState) -> Result<(), Error>;
    /// Sigma reported by the last estimation
    fn sigma(&mut self, state: &ProcessState) -> Option<f64>;
    /// Residuals of the last estimation
    fn residuals(&mut self, state: &ProcessState) -> Option<Vec<ResidualRecord>>;
    /// Undoes the last estimation
    fn restore(&mut self, state: &ProcessState) -> Result<(), Error>;
}

/// [EstimationBackend] working on the files of the work directory
pub struct FileEstimation<'a, I: SolverInvoker> {
    invoker: &'a mut I,
    catalog: &'a FileCatalog,
    checkpoints: CheckpointManager,
}

impl<'a, I: SolverInvoker> FileEstimation<'a, I> {
    pub fn new(invoker: &'a mut I, catalog: &'a FileCatalog) -> Self {
        Self {
            checkpoints: CheckpointManager::new(catalog.work_dir()),
            invoker,
            catalog,
        }
    }
}

impl<I: SolverInvoker> EstimationBackend for FileEstimation<'_, I> {
    fn checkpoint(&mut self, state: &ProcessState) -> Result<(), Error> {
        self.checkpoints
            .create(CHECKPOINT, self.catalog, state, &CHECKPOINT_CATEGORIES)?;
        Ok(())
    }

    fn estimate(&mut self, state: &ProcessState) -> Result<(), Error> {
        self.invoker
            .invoke(Tool::Estimator, state, "podlsq", &["-brdm".to_string()])
    }

    fn sigma(&mut self, state: &ProcessState) -> Option<f64> {
        read_sigma(&self.catalog.get_filename("recover", state)?)
    }

    fn residuals(&mut self, state: &ProcessState) -> Option<Vec<ResidualRecord>> {
        read_residual_file(&self.catalog.get_filename("recover", state)?)
    }

    fn restore(&mut self, _: &ProcessState) -> Result<(), Error> {
        self.checkpoints.restore(CHECKPOINT)?;
        Ok(())
    }
}

/// Convergence loop
#[derive(Debug, Clone, Copy)]
pub struct OutlierDetector {
    analyzer: ResidualAnalyzer,
    max_iterations: usize,
    early_accept_sigma: f64,
    max_sigma: f64,
}

impl OutlierDetector {
    pub fn new(cfg: &Config) -> Self {
        Self {
            analyzer: ResidualAnalyzer::new(cfg.residual_thresholds),
            max_iterations: cfg.max_iterations,
            early_accept_sigma: cfg.early_accept_sigma,
            max_sigma: cfg.max_sigma,
        }
    }

    /// Final gate on a converged solution
    fn accept(&self, sigma: Option<f64>) -> DetectorState {
        match sigma {
            Some(sigma) if sigma <= self.max_sigma => DetectorState::Converged,
            Some(sigma) => {
                error!("converged with sigma {:.3} > {:.1}", sigma, self.max_sigma);
                DetectorState::FailedHardSigma
            },
            None => {
                error!("converged solution reports no sigma");
                DetectorState::FailedHardSigma
            },
        }
    }

    /// Performs one iteration. `sigma` is updated with the last reported value.
    pub fn step<B: EstimationBackend>(
        &self,
        backend: &mut B,
        state: &mut ProcessState,
        current: DetectorState,
        sigma: &mut Option<f64>,
    ) -> Result<DetectorState, Error> {
        let DetectorState::Running(iteration) = current else {
            return Ok(current);
        };

        state.iteration = iteration;
        backend.estimate(state)?;
        *sigma = backend.sigma(state);

        if iteration > 0 {
            if let Some(value) = *sigma {
                if value <= self.early_accept_sigma {
                    info!(
                        "{} - iteration #{} accepted (sigma={:.3})",
                        state.begin, iteration, value
                    );
                    return Ok(DetectorState::Converged);
                }
            }
        }

        let residuals = backend.residuals(state).unwrap_or_else(|| {
            warn!("{} - no residuals to analyze", state.begin);
            Vec::new()
        });

        let outliers = self.analyzer.analyze(&residuals, iteration);

        if outliers.is_empty() {
            info!("{} - no outliers after {} iterations", state.begin, iteration + 1);
            return Ok(self.accept(*sigma));
        }

        if iteration + 1 >= self.max_iterations {
            error!(
                "{} - outliers remain after {} iterations",
                state.begin, self.max_iterations
            );
            return Ok(DetectorState::MaxIterationsExceeded);
        }

        backend.restore(state)?;
        state.remove_sites(&outliers.sites);
        state.exclude_satellites(&outliers.satellites);

        info!(
            "{} - reprocess-{} estimation due to bad stations or satellites",
            state.begin,
            iteration + 1
        );

        Ok(DetectorState::Running(iteration + 1))
    }

    /// Runs the loop from `Running(0)` to a terminal state
    pub fn run<B: EstimationBackend>(
        &self,
        backend: &mut B,
        state: &mut ProcessState,
    ) -> Result<DetectorReport, Error> {
        backend.checkpoint(state)?;

        let mut current = DetectorState::Running(0);
        let mut sigma = None;
        let mut invocations = 0;

        while !current.is_terminal() {
            current = self.step(backend, state, current, &mut sigma)?;
            invocations += 1;
        }

        Ok(DetectorReport {
            state: current,
            invocations,
            sigma,
        })
    }
}

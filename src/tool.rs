//! External solvers
use std::{path::PathBuf, process::Command};

use log::{debug, error, info};

use crate::{catalog::FileCatalog, error::Error, parsing::site::write_site_list, state::ProcessState};

/// External numerical tools the pipeline drives
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Orbit integrator
    Integrator,
    /// Least squares estimator
    Estimator,
    /// Residual editor, maintains the ambiguity flag files
    ResidualEditor,
    /// Ambiguity fixer
    AmbiguityFixer,
    /// Orbit comparison to a reference product
    OrbitDifference,
    /// Clock comparison to a reference product
    ClockDifference,
    /// Orbit and clock product writer
    ProductWriter,
}

impl Tool {
    /// Default executable name
    pub fn program(&self) -> &'static str {
        match self {
            Self::Integrator => "oi",
            Self::Estimator => "podlsq",
            Self::ResidualEditor => "editres",
            Self::AmbiguityFixer => "ambfix",
            Self::OrbitDifference => "orbdif",
            Self::ClockDifference => "clkdif",
            Self::ProductWriter => "orbsp3",
        }
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Integrator => write!(f, "integrator"),
            Self::Estimator => write!(f, "estimator"),
            Self::ResidualEditor => write!(f, "residual editor"),
            Self::AmbiguityFixer => write!(f, "ambiguity fixer"),
            Self::OrbitDifference => write!(f, "orbit difference"),
            Self::ClockDifference => write!(f, "clock difference"),
            Self::ProductWriter => write!(f, "product writer"),
        }
    }
}

/// Runs one [Tool] synchronously: returns once the tool has exited
/// and its output files are on disk. Failures are reported,
/// never retried.
pub trait SolverInvoker {
    fn invoke(
        &mut self,
        tool: Tool,
        state: &ProcessState,
        label: &str,
        args: &[String],
    ) -> Result<(), Error>;
}

/// [SolverInvoker] that spawns
/// `<bin_dir>/<program> -x <label>.xml [args] -beg <begin> -intv <seconds> [-sat_rm <satellites>]`
/// in the work directory. The active stations are published in `<label>.sites` beforehand.
/// Begin time and processing interval come from the [ProcessState], so an
/// interval override reaches the solver.
#[derive(Debug, Clone)]
pub struct ExternalInvoker {
    bin_dir: PathBuf,
    work_dir: PathBuf,
}

impl ExternalInvoker {
    pub fn new(bin_dir: PathBuf, catalog: &FileCatalog) -> Self {
        Self {
            bin_dir,
            work_dir: catalog.work_dir().to_path_buf(),
        }
    }

    /// Command line arguments of one invocation
    pub(crate) fn arguments(state: &ProcessState, label: &str, args: &[String]) -> Vec<String> {
        let mut arguments = vec!["-x".to_string(), format!("{}.xml", label)];
        arguments.extend(args.iter().cloned());

        arguments.push("-beg".to_string());
        arguments.push(state.begin.to_string());
        arguments.push("-intv".to_string());
        arguments.push(state.interval().to_seconds().to_string());

        if !state.excluded().is_empty() {
            let excluded = state
                .excluded()
                .iter()
                .map(|sv| sv.to_string())
                .collect::<Vec<_>>()
                .join(",");
            arguments.push("-sat_rm".to_string());
            arguments.push(excluded);
        }

        arguments
    }
}

impl SolverInvoker for ExternalInvoker {
    fn invoke(
        &mut self,
        tool: Tool,
        state: &ProcessState,
        label: &str,
        args: &[String],
    ) -> Result<(), Error> {
        let failure = |reason: String| Error::ToolFailure {
            tool,
            label: label.to_string(),
            reason,
        };

        write_site_list(&self.work_dir.join(format!("{}.sites", label)), &state.sites)?;

        let mut command = Command::new(self.bin_dir.join(tool.program()));
        command
            .current_dir(&self.work_dir)
            .args(Self::arguments(state, label, args));

        debug!("{:?}", command);
        info!("{} - running {} ({})", state.begin, tool, label);

        let status = command.status().map_err(|e| failure(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            error!("{} - {} ({}) failed: {}", state.begin, tool, label, status);
            Err(failure(status.to_string()))
        }
    }
}

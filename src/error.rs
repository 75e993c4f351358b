use std::path::PathBuf;

use thiserror::Error;

use crate::{cfg::ObsCombination, parsing::ParsingError, tool::Tool};

#[derive(Debug, Error)]
pub enum Error {
    /// A fatal format error propagated from one of the parsers.
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A required file is absent and the caller treats its absence as fatal.
    #[error("missing file \"{}\"", .0.display())]
    MissingFile(PathBuf),

    /// External solver exited in failure, or could not be spawned.
    /// Failures are never retried transparently.
    #[error("{tool} ({label}) failed: {reason}")]
    ToolFailure {
        tool: Tool,
        label: String,
        reason: String,
    },

    /// Estimator did not report any sigma for the current solution.
    #[error("estimator sigma is not available")]
    MissingSigma,

    /// Solution quality gate.
    #[error("sigma {sigma:.3} exceeds bound {max:.1}")]
    SigmaOutOfBound { sigma: f64, max: f64 },

    /// Outlier detection exhausted its iteration cap.
    #[error("no convergence after {0} iterations")]
    ConvergenceFailure(usize),

    /// Outlier detection converged on a solution whose sigma is not acceptable.
    #[error("converged with unacceptable sigma {0:.3}")]
    HardSigmaFailure(f64),

    /// No valid ambiguity flag file left after residual editing.
    #[error("no valid ambiguity flag file")]
    InvalidAmbiguityFlags,

    /// Ambiguity fixing is not functional for this observation combination.
    #[error("ambiguity fixing is not supported for {0} combination")]
    UnsupportedAmbiguityFixing(ObsCombination),

    #[error("result directory is not defined")]
    MissingResultDirectory,

    #[error("unknown checkpoint \"{0}\"")]
    UnknownCheckpoint(String),
}

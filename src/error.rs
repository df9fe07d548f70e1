//! Error types for crease network construction and fold stepping.

use thiserror::Error;

/// Errors that can occur while building or folding a crease network.
#[derive(Debug, Error)]
pub enum FoldError {
    /// The crease network description is malformed (unknown indices, mismatched arrays, ...).
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A rotation axis has (numerically) zero length.
    #[error("degenerate rotation axis (length {length:e})")]
    InvalidAxis {
        /// Length of the offending axis.
        length: f64,
    },

    /// No feasible fold increment was found, even after backing off the step size.
    #[error("no feasible fold increment at step {step} after {attempts} attempts")]
    FoldingInfeasible {
        /// Index of the fold step that failed.
        step: u64,
        /// Number of proposals tried (the original plus every halving).
        attempts: u32,
    },

    /// The optimizer ran out of iterations without a definitive answer.
    #[error(
        "optimizer did not converge at step {step} after {iterations} iterations ({attempts} attempts)"
    )]
    OptimizerNonconvergence {
        /// Index of the fold step that failed.
        step: u64,
        /// Iterations spent by the last optimizer run.
        iterations: u32,
        /// Number of proposals tried.
        attempts: u32,
    },

    /// The fold plan file could not be read.
    #[error("failed to read fold specification: {0}")]
    Io(#[from] std::io::Error),

    /// The fold plan file is not valid JSON for a `FoldSpecification`.
    #[error("failed to parse fold specification: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FoldError {
    /// Whether the caller may retry the step (for example with a smaller time step).
    ///
    /// Topology and axis errors indicate bad input data and always end the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FoldError::FoldingInfeasible { .. } | FoldError::OptimizerNonconvergence { .. }
        )
    }
}

/// Result type for folding operations.
pub type FoldResult<T> = Result<T, FoldError>;

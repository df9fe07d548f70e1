//! Tunable tolerances and budgets for the fold-angle solver.
//!
//! Both structs deserialize with defaults, so a fold plan only needs to
//! mention the values it wants to override.

use crate::optimizer::OptimizerKind;

use serde::{Deserialize, Serialize};

/// Budget and tolerances handed to the black-box optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerParams {
    /// Which optimization strategy to run (default: compass search).
    pub algorithm: OptimizerKind,

    /// Maximum number of iterations per optimizer run (default: 2000).
    pub max_iterations: u32,

    /// Search stops once its step size drops below this (default: 1e-12 rad).
    pub step_tolerance: f64,

    /// A feasible point whose objective is below this is accepted at once (default: 1e-24).
    pub objective_tolerance: f64,

    /// Largest constraint value still counted as satisfied (default: 1e-9).
    pub constraint_tolerance: f64,

    /// Initial weight of the quadratic penalty in the augmented Lagrangian of
    /// compass search (default: 10).
    pub penalty_weight: f64,
}

impl Default for OptimizerParams {
    fn default() -> Self {
        Self {
            algorithm: OptimizerKind::CompassSearch,
            max_iterations: 2000,
            step_tolerance: 1e-12,
            objective_tolerance: 1e-24,
            constraint_tolerance: 1e-9,
            penalty_weight: 10.0,
        }
    }
}

impl OptimizerParams {
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: OptimizerKind) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Parameters of the per-step fold search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// A crease within this many radians of its target counts as done (default: 1e-10).
    pub angle_tolerance: f64,

    /// Fold angles must stay this far inside (-π, π) (default: 1e-4 rad).
    pub hard_limit_margin: f64,

    /// Number of times a rejected proposal is halved and retried (default: 8).
    pub max_backoff: u32,

    /// Largest accepted `|x - p| / |p|` between the optimizer's answer and the
    /// proposed increment (default: 0.5).
    pub max_relative_deviation: f64,

    /// Minimum distance kept between the centroids of monitored face pairs (default: 1e-3).
    pub face_clearance: f64,

    /// Optional cap on how far any physical point may move in one step (default: none).
    pub max_point_displacement: Option<f64>,

    pub optimizer: OptimizerParams,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            angle_tolerance: 1e-10,
            hard_limit_margin: 1e-4,
            max_backoff: 8,
            max_relative_deviation: 0.5,
            face_clearance: 1e-3,
            max_point_displacement: None,
            optimizer: OptimizerParams::default(),
        }
    }
}

impl SolverParams {
    #[must_use]
    pub fn with_max_backoff(mut self, max_backoff: u32) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    #[must_use]
    pub fn with_face_clearance(mut self, clearance: f64) -> Self {
        self.face_clearance = clearance;
        self
    }

    #[must_use]
    pub fn with_max_point_displacement(mut self, displacement: f64) -> Self {
        self.max_point_displacement = Some(displacement);
        self
    }

    #[must_use]
    pub fn with_optimizer(mut self, optimizer: OptimizerParams) -> Self {
        self.optimizer = optimizer;
        self
    }
}

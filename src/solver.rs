//! Drives the fold angles toward their targets, one feasible increment at a time.

use crate::error::{FoldError, FoldResult};
use crate::fold_specification::FoldSpecification;
use crate::math;
use crate::model::{CreaseIndex, CreaseNetwork};
use crate::motion::PhysicalPoint;
use crate::optimizer::{Bounds, Optimizer, OptimizerFailure, Problem};
use crate::params::SolverParams;
use crate::validity::FoldProblem;

use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FoldPhase {
    /// No increment pending.
    Idle,

    /// The optimizer is evaluating candidate increments.
    Searching,

    /// The last increment was written into the crease network.
    Committed,

    /// Every crease has reached its target; further steps do nothing.
    Exhausted,
}

/// Target angle and fold rate of every crease. The current angles live on the
/// creases themselves.
#[derive(Clone, Debug, PartialEq)]
pub struct FoldState {
    targets: Vec<f64>,

    // Radians per unit time; only the magnitude is used
    rates: Vec<f64>,
}

impl FoldState {
    pub fn new(targets: Vec<f64>, rates: Vec<f64>) -> FoldResult<FoldState> {
        if targets.len() != rates.len() {
            return Err(FoldError::InvalidTopology(format!(
                "{} target angles but {} fold rates",
                targets.len(),
                rates.len()
            )));
        }
        if let Some(i) = targets.iter().position(|t| !t.is_finite()) {
            return Err(FoldError::InvalidTopology(format!(
                "crease {} has target angle {}",
                i, targets[i]
            )));
        }
        if let Some(i) = rates.iter().position(|r| !r.is_finite()) {
            return Err(FoldError::InvalidTopology(format!(
                "crease {} has fold rate {}",
                i, rates[i]
            )));
        }
        Ok(FoldState { targets, rates })
    }

    pub fn from_specification(spec: &FoldSpecification) -> FoldResult<FoldState> {
        FoldState::new(spec.target_angles()?, spec.fold_rates()?)
    }

    /// Signed distance of every crease from its target.
    pub fn remaining(&self, network: &CreaseNetwork) -> Vec<f64> {
        math::sub(&self.targets, &network.angles())
    }

    pub fn is_reached(&self, network: &CreaseNetwork, tolerance: f64) -> bool {
        self.remaining(network).iter().all(|r| r.abs() <= tolerance)
    }

    /// The planned increment for a step of length `dt`: each crease moves toward
    /// its target by `|rate| · dt`, and lands exactly on the target when that is
    /// all that is left.
    pub fn propose(&self, network: &CreaseNetwork, dt: f64, tolerance: f64) -> Vec<f64> {
        self.remaining(network)
            .iter()
            .zip(self.rates.iter())
            .map(|(&remaining, rate)| {
                let step = rate.abs() * dt.max(0.0);
                if remaining.abs() <= tolerance {
                    0.0
                } else if remaining.abs() <= step + tolerance {
                    remaining
                } else {
                    step.copysign(remaining)
                }
            })
            .collect()
    }

    pub fn get_targets(&self) -> &[f64] {
        &self.targets
    }

    pub fn get_rates(&self) -> &[f64] {
        &self.rates
    }
}

/// Why a single proposal was turned down.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Rejection {
    Infeasible { max_violation: f64 },
    Deviation { relative: f64 },
    IterationLimit { iterations: u32 },
}

fn relative_deviation(x: &[f64], proposal: &[f64]) -> f64 {
    let length = math::magnitude(proposal);
    if length == 0.0 {
        return 0.0;
    }
    math::magnitude(&math::sub(x, proposal)) / length
}

pub struct FoldSolver {
    state: FoldState,
    params: SolverParams,
    optimizer: Box<dyn Optimizer>,
    phase: FoldPhase,

    // Number of committed increments
    step: u64,
}

impl FoldSolver {
    pub fn new(
        network: &CreaseNetwork,
        state: FoldState,
        params: SolverParams,
    ) -> FoldResult<FoldSolver> {
        let creases = network.get_creases().len();
        if state.targets.len() != creases {
            return Err(FoldError::InvalidTopology(format!(
                "fold state covers {} creases, network has {}",
                state.targets.len(),
                creases
            )));
        }

        // A crease that never moves would keep the fold from ever finishing
        let remaining = state.remaining(network);
        let stuck = remaining
            .iter()
            .zip(state.rates.iter())
            .position(|(r, rate)| r.abs() > params.angle_tolerance && *rate == 0.0);
        if let Some(i) = stuck {
            return Err(FoldError::InvalidTopology(format!(
                "crease {} is {} rad from its target but has a zero fold rate",
                i, remaining[i]
            )));
        }

        let optimizer = params.optimizer.algorithm.build(&params.optimizer);
        Ok(FoldSolver {
            state,
            params,
            optimizer,
            phase: FoldPhase::Idle,
            step: 0,
        })
    }

    pub fn from_specification(
        spec: &FoldSpecification,
        network: &CreaseNetwork,
    ) -> FoldResult<FoldSolver> {
        FoldSolver::new(
            network,
            FoldState::from_specification(spec)?,
            spec.solver.clone(),
        )
    }

    /// Replaces the optimization strategy.
    pub fn set_optimizer(&mut self, optimizer: Box<dyn Optimizer>) {
        self.optimizer = optimizer;
    }

    pub fn with_optimizer(mut self, optimizer: Box<dyn Optimizer>) -> FoldSolver {
        self.set_optimizer(optimizer);
        self
    }

    pub fn phase(&self) -> FoldPhase {
        self.phase
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn get_state(&self) -> &FoldState {
        &self.state
    }

    pub fn get_params(&self) -> &SolverParams {
        &self.params
    }

    /// Advances every crease by at most `dt` worth of its fold rate.
    ///
    /// The planned increment is handed to the optimizer, which looks for the
    /// closest feasible increment. Rejected proposals are halved and retried up
    /// to `max_backoff` times. On failure the network is left untouched and the
    /// solver returns to `Idle`, so the caller may retry with a smaller `dt`.
    #[tracing::instrument(skip_all, fields(step = self.step))]
    pub fn advance(
        &mut self,
        network: &mut CreaseNetwork,
        points: &[PhysicalPoint],
        dt: f64,
    ) -> FoldResult<FoldPhase> {
        if self.phase == FoldPhase::Exhausted {
            return Ok(FoldPhase::Exhausted);
        }

        let tolerance = self.params.angle_tolerance;
        if self.state.is_reached(network, tolerance) {
            info!(steps = self.step, "all creases reached their targets");
            self.phase = FoldPhase::Exhausted;
            return Ok(self.phase);
        }

        let mut proposal = self.state.propose(network, dt, tolerance);
        if proposal.iter().all(|p| *p == 0.0) {
            self.phase = FoldPhase::Idle;
            return Ok(self.phase);
        }

        // Unaffected faces are read from cache during the search
        network.update_folding_matrices();
        self.phase = FoldPhase::Searching;

        let attempts = self.params.max_backoff + 1;
        let mut last = Rejection::Infeasible {
            max_violation: f64::INFINITY,
        };
        for attempt in 0..attempts {
            match self.search(network, points, &proposal) {
                Ok(increment) => {
                    self.commit(network, &increment);
                    debug!(attempt, optimizer = self.optimizer.name(), "committed increment");

                    self.phase = if self.state.is_reached(network, tolerance) {
                        info!(steps = self.step, "all creases reached their targets");
                        FoldPhase::Exhausted
                    } else {
                        FoldPhase::Committed
                    };
                    return Ok(self.phase);
                }
                Err(rejection) => {
                    debug!(attempt, ?rejection, "rejected proposal, halving");
                    last = rejection;
                    proposal = math::scale(&proposal, 0.5);
                }
            }
        }

        self.phase = FoldPhase::Idle;
        let error = match last {
            Rejection::IterationLimit { iterations } => FoldError::OptimizerNonconvergence {
                step: self.step,
                iterations,
                attempts,
            },
            _ => FoldError::FoldingInfeasible {
                step: self.step,
                attempts,
            },
        };
        warn!(%error, "fold step failed");
        Err(error)
    }

    fn search(
        &self,
        network: &CreaseNetwork,
        points: &[PhysicalPoint],
        proposal: &[f64],
    ) -> Result<Vec<f64>, Rejection> {
        let problem = FoldProblem::new(network, points, proposal, &self.params);
        let bounds = Bounds::between(&vec![0.0; proposal.len()], proposal);

        let solution = match self.optimizer.minimize(&problem, proposal, &bounds) {
            Ok(solution) => solution,
            Err(OptimizerFailure::IterationLimit { iterations }) => {
                return Err(Rejection::IterationLimit { iterations })
            }
            Err(OptimizerFailure::Infeasible { max_violation, .. }) => {
                return Err(Rejection::Infeasible { max_violation })
            }
        };

        // Never trust a strategy's own feasibility claim
        let tolerance = self.params.optimizer.constraint_tolerance;
        if !problem.is_valid(&solution.x, tolerance) {
            return Err(Rejection::Infeasible {
                max_violation: problem.max_violation(&solution.x),
            });
        }

        let relative = relative_deviation(&solution.x, problem.get_proposal());
        if relative > self.params.max_relative_deviation {
            return Err(Rejection::Deviation { relative });
        }

        debug!(
            objective = problem.objective(&solution.x),
            iterations = solution.iterations,
            "feasible increment"
        );
        Ok(solution.x)
    }

    fn commit(&mut self, network: &mut CreaseNetwork, increment: &[f64]) {
        let angles = network.angles();
        for (i, dx) in increment.iter().enumerate() {
            if *dx != 0.0 {
                network.update_rot_matrix(CreaseIndex(i), angles[i] + dx);
            }
        }
        self.step += 1;
    }
}

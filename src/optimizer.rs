//! Black-box constrained minimization.
//!
//! The fold solver only talks to the `Optimizer` trait: it hands over a
//! `Problem` (objective plus inequality constraints `g(x) <= 0`), an initial
//! guess and box bounds, and gets back either a decision vector or a failure.
//! Two derivative-free strategies are provided; others can be injected.

use crate::params::OptimizerParams;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An objective with inequality constraints, evaluated on a real vector.
pub trait Problem {
    fn objective(&self, x: &[f64]) -> f64;

    /// Constraint values; the point is feasible when every entry is `<= 0`.
    fn constraints(&self, x: &[f64]) -> Vec<f64>;
}

/// Per-coordinate box bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    /// The box spanned by two corners, in whatever order their coordinates come.
    pub fn between(a: &[f64], b: &[f64]) -> Bounds {
        assert_eq!(a.len(), b.len());
        Bounds {
            lower: a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).collect(),
            upper: a.iter().zip(b.iter()).map(|(x, y)| x.max(*y)).collect(),
        }
    }

    pub fn clamp(&self, x: &mut [f64]) {
        for (i, value) in x.iter_mut().enumerate() {
            *value = value.max(self.lower[i]).min(self.upper[i]);
        }
    }

    /// The widest extent over all coordinates.
    pub fn width(&self) -> f64 {
        self.lower
            .iter()
            .zip(self.upper.iter())
            .fold(0.0, |acc: f64, (l, u)| acc.max(u - l))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub x: Vec<f64>,
    pub objective: f64,
    pub max_violation: f64,
    pub iterations: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum OptimizerFailure {
    /// The search settled on a point that still violates the constraints.
    Infeasible { max_violation: f64, iterations: u32 },

    /// The iteration budget ran out before the search settled.
    IterationLimit { iterations: u32 },
}

pub trait Optimizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn minimize(
        &self,
        problem: &dyn Problem,
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<Solution, OptimizerFailure>;
}

/// Selects one of the built-in strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    CompassSearch,
    RaySearch,
}

impl OptimizerKind {
    pub fn build(self, params: &OptimizerParams) -> Box<dyn Optimizer> {
        match self {
            OptimizerKind::CompassSearch => Box::new(CompassSearch::new(params)),
            OptimizerKind::RaySearch => Box::new(RaySearch::new(params)),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<OptimizerKind, String> {
        match s {
            "compass_search" | "compass" => Ok(OptimizerKind::CompassSearch),
            "ray_search" | "ray" => Ok(OptimizerKind::RaySearch),
            _ => Err(format!("unknown optimizer `{}`", s)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            OptimizerKind::CompassSearch => f.write_str("compass_search"),
            OptimizerKind::RaySearch => f.write_str("ray_search"),
        }
    }
}

#[derive(Clone, Debug)]
struct Evaluation {
    objective: f64,
    constraints: Vec<f64>,
    max_violation: f64,
}

fn evaluate(problem: &dyn Problem, x: &[f64]) -> Evaluation {
    let objective = problem.objective(x);
    let constraints = problem.constraints(x);
    let max_violation = constraints.iter().fold(0.0, |acc: f64, g| acc.max(*g));

    Evaluation {
        objective,
        constraints,
        max_violation,
    }
}

// Penalty growth whenever a round fails to cut the violation to a quarter
const PENALTY_GROWTH: f64 = 10.0;

// The search gives up on reaching feasibility once the penalty weight has
// grown by this factor
const MAX_PENALTY_GROWTH: f64 = 1e10;

/// Multiplier estimates and penalty weight of the augmented Lagrangian
/// `f(x) + ρ/2 · Σ max(0, gᵢ(x) + λᵢ/ρ)²`.
#[derive(Clone, Debug)]
struct Multipliers {
    lambda: Vec<f64>,
    rho: f64,
}

impl Multipliers {
    fn new(constraints: usize, rho: f64) -> Multipliers {
        Multipliers {
            lambda: vec![0.0; constraints],
            rho,
        }
    }

    fn merit(&self, evaluation: &Evaluation) -> f64 {
        let penalty: f64 = evaluation
            .constraints
            .iter()
            .zip(self.lambda.iter())
            .map(|(g, l)| {
                let shifted = (g + l / self.rho).max(0.0);
                shifted * shifted
            })
            .sum();
        evaluation.objective + 0.5 * self.rho * penalty
    }

    /// How far `constraints` are from feasibility and complementary slackness.
    fn stationarity(&self, constraints: &[f64]) -> f64 {
        constraints
            .iter()
            .zip(self.lambda.iter())
            .fold(0.0, |acc: f64, (g, l)| acc.max(g.max(-l / self.rho).abs()))
    }

    fn update(&mut self, constraints: &[f64]) {
        for (l, g) in self.lambda.iter_mut().zip(constraints.iter()) {
            *l = (*l + self.rho * g).max(0.0);
        }
    }
}

struct Iterate {
    x: Vec<f64>,
    evaluation: Evaluation,
    merit: f64,
}

/// Derivative-free pattern search on an augmented Lagrangian.
///
/// The inner loop polls `x ± step · e_i` for every coordinate, moves to the
/// first point that lowers the merit, and halves the step when none does.
/// Each time the step falls below `step_tolerance`, the multipliers absorb the
/// remaining violation and the penalty weight grows if the violation did not
/// shrink enough. The merit is smooth across the constraint boundary, so the
/// search slides along constraints that couple several coordinates, such as a
/// bound on their sum.
///
/// A result that still violates the constraints is pulled back along the
/// segment to the best feasible point seen. With no such point the problem is
/// reported infeasible.
#[derive(Clone, Debug)]
pub struct CompassSearch {
    max_iterations: u32,
    step_tolerance: f64,
    objective_tolerance: f64,
    constraint_tolerance: f64,
    penalty_weight: f64,
}

impl CompassSearch {
    pub fn new(params: &OptimizerParams) -> CompassSearch {
        CompassSearch {
            max_iterations: params.max_iterations,
            step_tolerance: params.step_tolerance,
            objective_tolerance: params.objective_tolerance,
            constraint_tolerance: params.constraint_tolerance,
            penalty_weight: params.penalty_weight,
        }
    }

    /// Keeps the feasible point with the lowest objective in `incumbent`.
    fn record(&self, incumbent: &mut Option<(Vec<f64>, f64)>, x: &[f64], evaluation: &Evaluation) {
        if evaluation.max_violation > self.constraint_tolerance {
            return;
        }
        let better = match incumbent {
            Some((_, objective)) => evaluation.objective < *objective,
            None => true,
        };
        if better {
            *incumbent = Some((x.to_vec(), evaluation.objective));
        }
    }

    fn poll(
        &self,
        problem: &dyn Problem,
        current: &Iterate,
        step: f64,
        bounds: &Bounds,
        multipliers: &Multipliers,
        incumbent: &mut Option<(Vec<f64>, f64)>,
    ) -> Option<Iterate> {
        let x = &current.x;
        for i in 0..x.len() {
            for &direction in [1.0, -1.0].iter() {
                let moved = (x[i] + direction * step)
                    .max(bounds.lower[i])
                    .min(bounds.upper[i]);
                if moved == x[i] {
                    continue;
                }

                let mut candidate = x.clone();
                candidate[i] = moved;
                let evaluation = evaluate(problem, &candidate);
                self.record(incumbent, &candidate, &evaluation);

                let merit = multipliers.merit(&evaluation);
                if merit < current.merit {
                    return Some(Iterate {
                        x: candidate,
                        evaluation,
                        merit,
                    });
                }
            }
        }
        None
    }

    /// The feasible point closest to `x` on the segment from `anchor`.
    fn pull_back(&self, problem: &dyn Problem, anchor: &[f64], x: &[f64]) -> (Vec<f64>, Evaluation) {
        let along = |t: f64| -> Vec<f64> {
            anchor
                .iter()
                .zip(x.iter())
                .map(|(a, b)| a + t * (b - a))
                .collect()
        };

        let (mut low, mut high) = (0.0, 1.0);
        while high - low > self.step_tolerance {
            let middle = 0.5 * (low + high);
            if evaluate(problem, &along(middle)).max_violation <= self.constraint_tolerance {
                low = middle;
            } else {
                high = middle;
            }
        }

        let point = along(low);
        let evaluation = evaluate(problem, &point);
        (point, evaluation)
    }
}

fn solution(x: Vec<f64>, evaluation: Evaluation, iterations: u32) -> Solution {
    Solution {
        x,
        objective: evaluation.objective,
        max_violation: evaluation.max_violation,
        iterations,
    }
}

impl Optimizer for CompassSearch {
    fn name(&self) -> &'static str {
        "compass_search"
    }

    fn minimize(
        &self,
        problem: &dyn Problem,
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<Solution, OptimizerFailure> {
        let limit = Err(OptimizerFailure::IterationLimit {
            iterations: self.max_iterations,
        });

        let mut x = initial.to_vec();
        bounds.clamp(&mut x);
        let evaluation = evaluate(problem, &x);

        let mut incumbent = None;
        self.record(&mut incumbent, &x, &evaluation);

        let mut multipliers = Multipliers::new(evaluation.constraints.len(), self.penalty_weight);
        let mut previous_violation = evaluation.max_violation;
        let mut current = Iterate {
            merit: multipliers.merit(&evaluation),
            x,
            evaluation,
        };

        let width = bounds.width();
        let mut step = width;
        let mut iterations = 0;

        loop {
            while step >= self.step_tolerance {
                if iterations >= self.max_iterations {
                    return limit;
                }
                let settled = current.evaluation.objective <= self.objective_tolerance
                    && current.evaluation.max_violation <= self.constraint_tolerance;
                if settled {
                    return Ok(solution(current.x, current.evaluation, iterations));
                }

                iterations += 1;
                match self.poll(problem, &current, step, bounds, &multipliers, &mut incumbent) {
                    Some(better) => current = better,
                    None => step *= 0.5,
                }
            }

            let stationarity = multipliers.stationarity(&current.evaluation.constraints);
            if stationarity <= self.constraint_tolerance {
                break;
            }
            if iterations >= self.max_iterations {
                return limit;
            }

            let violation = current.evaluation.max_violation;
            if violation > self.constraint_tolerance && violation > 0.25 * previous_violation {
                multipliers.rho *= PENALTY_GROWTH;
                if multipliers.rho > self.penalty_weight * MAX_PENALTY_GROWTH {
                    break;
                }
            }

            multipliers.update(&current.evaluation.constraints);
            current.merit = multipliers.merit(&current.evaluation);
            previous_violation = violation;
            step = (1e3 * violation.max(stationarity))
                .min(width)
                .max(self.step_tolerance);
            iterations += 1;
        }

        if current.evaluation.max_violation <= self.constraint_tolerance {
            return Ok(solution(current.x, current.evaluation, iterations));
        }

        match incumbent {
            Some((anchor, _)) => {
                let (x, evaluation) = self.pull_back(problem, &anchor, &current.x);
                Ok(solution(x, evaluation, iterations))
            }
            None => Err(OptimizerFailure::Infeasible {
                max_violation: current.evaluation.max_violation,
                iterations,
            }),
        }
    }
}

/// Bisection along the ray from the origin to the initial guess.
///
/// Returns the feasible point `t · initial` with the largest `t` in `[0, 1]`.
/// Cheap and exact when the constraints only tighten as the step grows, which
/// is the usual situation for a fold increment.
#[derive(Clone, Debug)]
pub struct RaySearch {
    max_iterations: u32,
    step_tolerance: f64,
    constraint_tolerance: f64,
}

impl RaySearch {
    pub fn new(params: &OptimizerParams) -> RaySearch {
        RaySearch {
            max_iterations: params.max_iterations,
            step_tolerance: params.step_tolerance,
            constraint_tolerance: params.constraint_tolerance,
        }
    }

    fn point(initial: &[f64], t: f64, bounds: &Bounds) -> Vec<f64> {
        let mut x: Vec<f64> = initial.iter().map(|v| v * t).collect();
        bounds.clamp(&mut x);
        x
    }
}

impl Optimizer for RaySearch {
    fn name(&self) -> &'static str {
        "ray_search"
    }

    fn minimize(
        &self,
        problem: &dyn Problem,
        initial: &[f64],
        bounds: &Bounds,
    ) -> Result<Solution, OptimizerFailure> {
        let full = RaySearch::point(initial, 1.0, bounds);
        let evaluation = evaluate(problem, &full);
        if evaluation.max_violation <= self.constraint_tolerance {
            return Ok(solution(full, evaluation, 1));
        }

        let origin = RaySearch::point(initial, 0.0, bounds);
        let mut best = evaluate(problem, &origin);
        if best.max_violation > self.constraint_tolerance {
            return Err(OptimizerFailure::Infeasible {
                max_violation: best.max_violation,
                iterations: 1,
            });
        }

        let (mut low, mut high) = (0.0, 1.0);
        for iteration in 1..=self.max_iterations {
            if high - low < self.step_tolerance {
                return Ok(solution(
                    RaySearch::point(initial, low, bounds),
                    best,
                    iteration,
                ));
            }

            let middle = 0.5 * (low + high);
            let evaluation = evaluate(problem, &RaySearch::point(initial, middle, bounds));
            if evaluation.max_violation <= self.constraint_tolerance {
                low = middle;
                best = evaluation;
            } else {
                high = middle;
            }
        }

        Err(OptimizerFailure::IterationLimit {
            iterations: self.max_iterations,
        })
    }
}

use crate::data::SpringVertex;
use crate::error::FoldResult;
use crate::fold_specification::FoldSpecification;
use crate::model::CreaseNetwork;
use crate::motion::MotionApplicator;
use crate::solver::{FoldPhase, FoldSolver};

use tracing::info;

/// A folding sheet driven by an external integrator.
///
/// Per integrator step, `preprocess` advances the fold and moves the points,
/// and `postprocess` reports their velocity and acceleration.
pub struct OrigamiFold {
    network: CreaseNetwork,
    solver: FoldSolver,
    motion: MotionApplicator,

    // Simulation time of the last successful step
    last_time: f64,
}

impl OrigamiFold {
    /// Builds the crease network and pins every point of `points` to its face.
    pub fn new<P: SpringVertex>(spec: &FoldSpecification, points: &[P]) -> FoldResult<OrigamiFold> {
        let network = CreaseNetwork::from_specification(spec)?;
        let solver = FoldSolver::from_specification(spec, &network)?;
        let motion = MotionApplicator::assign_faces(&network, points)?;

        info!(
            title = %spec.frame_title,
            points = motion.get_points().len(),
            optimizer = %spec.solver.optimizer.algorithm,
            "fold ready"
        );

        Ok(OrigamiFold {
            network,
            solver,
            motion,
            last_time: 0.0,
        })
    }

    /// Folds by the time elapsed since the last successful step and writes the
    /// new positions into `points`.
    ///
    /// On error nothing moves and the stored time is kept, so the caller may
    /// retry with an earlier `time`.
    pub fn preprocess<P: SpringVertex>(&mut self, points: &mut [P], time: f64) -> FoldResult<FoldPhase> {
        self.motion.check_targets(points)?;
        let dt = (time - self.last_time).max(0.0);
        let phase = self
            .solver
            .advance(&mut self.network, self.motion.get_points(), dt)?;

        self.motion.apply(&mut self.network, dt);
        self.motion.write_positions(points)?;
        // An earlier `time` folds nothing and must not rewind the clock
        self.last_time = self.last_time.max(time);

        Ok(phase)
    }

    pub fn postprocess<P: SpringVertex>(&self, points: &mut [P]) -> FoldResult<()> {
        self.motion.write_kinematics(points)
    }

    pub fn get_network(&self) -> &CreaseNetwork {
        &self.network
    }

    pub fn get_solver(&self) -> &FoldSolver {
        &self.solver
    }

    pub fn get_solver_mut(&mut self) -> &mut FoldSolver {
        &mut self.solver
    }

    pub fn get_motion(&self) -> &MotionApplicator {
        &self.motion
    }

    pub fn last_time(&self) -> f64 {
        self.last_time
    }
}

//! Moves the integrator's points rigidly with the faces they sit on.

use crate::data::SpringVertex;
use crate::error::{FoldError, FoldResult};
use crate::model::{CreaseNetwork, FaceIndex};

use cgmath::{Point3, Transform, Vector3, Zero};
use rayon::prelude::*;
use tracing::debug;

/// A point of the external integrator, pinned to a face of the crease network.
#[derive(Clone, Debug)]
pub struct PhysicalPoint {
    // Index of this point in the integrator's point list
    index: usize,

    // Where the point sits in the flat reference pose
    reference: Point3<f64>,

    // Every face containing `reference`, in construction order; the first one
    // carries the point
    faces: Vec<FaceIndex>,

    position: Point3<f64>,
    velocity: Vector3<f64>,
    acceleration: Vector3<f64>,
}

impl PhysicalPoint {
    pub fn get_index(&self) -> usize {
        self.index
    }

    pub fn get_reference(&self) -> &Point3<f64> {
        &self.reference
    }

    /// The face this point moves with.
    pub fn get_face(&self) -> FaceIndex {
        self.faces[0]
    }

    pub fn get_faces(&self) -> &[FaceIndex] {
        &self.faces
    }

    pub fn get_position(&self) -> &Point3<f64> {
        &self.position
    }

    pub fn get_velocity(&self) -> &Vector3<f64> {
        &self.velocity
    }

    pub fn get_acceleration(&self) -> &Vector3<f64> {
        &self.acceleration
    }
}

#[derive(Clone, Debug)]
pub struct MotionApplicator {
    points: Vec<PhysicalPoint>,

    // Number of completed `apply` calls
    applied: u64,
}

impl MotionApplicator {
    /// Pins every integrator point to the first face containing it.
    ///
    /// The assignment is made once, in the reference pose, and never revisited.
    pub fn assign_faces<P: SpringVertex>(
        network: &CreaseNetwork,
        points: &[P],
    ) -> FoldResult<MotionApplicator> {
        let references: Vec<Point3<f64>> = points.iter().map(|p| p.coords()).collect();
        MotionApplicator::from_references(network, &references)
    }

    pub fn from_references(
        network: &CreaseNetwork,
        references: &[Point3<f64>],
    ) -> FoldResult<MotionApplicator> {
        let points = references
            .par_iter()
            .enumerate()
            .map(|(index, &reference)| {
                let faces = network.faces_containing(reference);
                if faces.is_empty() {
                    return Err(FoldError::InvalidTopology(format!(
                        "point {} at ({}, {}, {}) lies on no face",
                        index, reference.x, reference.y, reference.z
                    )));
                }

                Ok(PhysicalPoint {
                    index,
                    reference,
                    faces,
                    position: reference,
                    velocity: Vector3::zero(),
                    acceleration: Vector3::zero(),
                })
            })
            .collect::<FoldResult<Vec<PhysicalPoint>>>()?;

        Ok(MotionApplicator { points, applied: 0 })
    }

    /// Recomputes every point from its face's folding matrix.
    ///
    /// Velocity and acceleration are backward differences over `dt`. The first
    /// call reports zero velocity, the first two zero acceleration, and so does
    /// any call with a non-positive `dt`.
    pub fn apply(&mut self, network: &mut CreaseNetwork, dt: f64) {
        network.update_folding_matrices();

        let network: &CreaseNetwork = network;
        let applied = self.applied;
        self.points.par_iter_mut().for_each(|point| {
            let position = network
                .get_face(point.get_face())
                .get_folding_matrix()
                .transform_point(point.reference);

            let velocity = if applied == 0 || dt <= 0.0 {
                Vector3::zero()
            } else {
                (position - point.position) / dt
            };
            let acceleration = if applied < 2 || dt <= 0.0 {
                Vector3::zero()
            } else {
                (velocity - point.velocity) / dt
            };

            point.position = position;
            point.velocity = velocity;
            point.acceleration = acceleration;
        });

        self.applied += 1;
        debug!(points = self.points.len(), applied = self.applied, "applied motion");
    }

    /// Fails unless `targets` is the point list the faces were assigned from.
    pub fn check_targets<P: SpringVertex>(&self, targets: &[P]) -> FoldResult<()> {
        if targets.len() != self.points.len() {
            return Err(FoldError::InvalidTopology(format!(
                "integrator has {} points, {} were pinned to faces",
                targets.len(),
                self.points.len()
            )));
        }
        Ok(())
    }

    pub fn write_positions<P: SpringVertex>(&self, targets: &mut [P]) -> FoldResult<()> {
        self.check_targets(targets)?;
        for (point, target) in self.points.iter().zip(targets.iter_mut()) {
            target.set_position(point.position);
        }
        Ok(())
    }

    pub fn write_kinematics<P: SpringVertex>(&self, targets: &mut [P]) -> FoldResult<()> {
        self.check_targets(targets)?;
        for (point, target) in self.points.iter().zip(targets.iter_mut()) {
            target.set_velocity(point.velocity);
            target.set_acceleration(point.acceleration);
        }
        Ok(())
    }

    pub fn get_points(&self) -> &[PhysicalPoint] {
        &self.points
    }

    pub fn applied(&self) -> u64 {
        self.applied
    }
}

//! The validity predicate of a candidate fold increment, posed as an
//! optimization problem over per-crease angle increments.

use crate::face;
use crate::math;
use crate::model::{CreaseIndex, CreaseNetwork, FaceIndex};
use crate::motion::PhysicalPoint;
use crate::optimizer::Problem;
use crate::params::SolverParams;

use cgmath::{Matrix4, MetricSpace, Transform};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Minimize `Σ (xᵢ - pᵢ)²` for a proposed increment `p`, subject to:
///
/// - every crease stays `hard_limit_margin` inside `(-π, π)`
/// - every structural vertex with an angle sum limit respects it
/// - monitored face pairs keep their centroids `face_clearance` apart
/// - optionally, no physical point moves farther than `max_point_displacement`
///
/// Candidate folding matrices are only recomposed for faces whose crease path
/// goes through a moving crease; all other faces use their cached matrices, so
/// the network has to be refreshed before the problem is built.
pub struct FoldProblem<'a> {
    network: &'a CreaseNetwork,
    points: &'a [PhysicalPoint],
    params: &'a SolverParams,

    current: Vec<f64>,
    proposal: Vec<f64>,

    // Faces downstream of a moving crease, sorted by index
    affected: Vec<FaceIndex>,

    // Points whose assigned face is in `affected`
    affected_points: Vec<usize>,
}

impl<'a> FoldProblem<'a> {
    pub fn new(
        network: &'a CreaseNetwork,
        points: &'a [PhysicalPoint],
        proposal: &[f64],
        params: &'a SolverParams,
    ) -> FoldProblem<'a> {
        let moving = proposal
            .iter()
            .enumerate()
            .filter(|(_, p)| **p != 0.0)
            .map(|(i, _)| CreaseIndex(i));
        let affected = network.affected_faces(moving);

        let affected_points = points
            .iter()
            .enumerate()
            .filter(|(_, point)| affected.binary_search(&point.get_face()).is_ok())
            .map(|(i, _)| i)
            .collect();

        FoldProblem {
            network,
            points,
            params,
            current: network.angles(),
            proposal: proposal.to_vec(),
            affected,
            affected_points,
        }
    }

    pub fn get_proposal(&self) -> &[f64] {
        &self.proposal
    }

    pub fn get_affected_faces(&self) -> &[FaceIndex] {
        &self.affected
    }

    /// Whether `x` satisfies every constraint to within `tolerance`.
    pub fn is_valid(&self, x: &[f64], tolerance: f64) -> bool {
        self.max_violation(x) <= tolerance
    }

    pub fn max_violation(&self, x: &[f64]) -> f64 {
        self.constraints(x)
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Folding matrices of the affected faces at angles `current + x`, in the
    /// order of `affected`.
    fn candidate_matrices(&self, x: &[f64]) -> Vec<Matrix4<f64>> {
        self.affected
            .par_iter()
            .map(|&f| {
                let path = self.network.get_face(f).get_crease_path();
                face::compose(path, |c| {
                    let crease = self.network.get_crease(c);
                    if x[c.0] == 0.0 {
                        *crease.get_transform()
                    } else {
                        crease.transform_at(self.current[c.0] + x[c.0])
                    }
                })
            })
            .collect()
    }

    fn matrix(&self, f: FaceIndex, candidates: &[Matrix4<f64>]) -> Matrix4<f64> {
        match self.affected.binary_search(&f) {
            Ok(i) => candidates[i],
            Err(_) => *self.network.get_face(f).get_folding_matrix(),
        }
    }

    fn face_separations(&self, candidates: &[Matrix4<f64>]) -> Vec<f64> {
        self.network
            .get_monitored_pairs()
            .iter()
            .map(|&[a, b]| {
                let centroid_a = self
                    .matrix(a, candidates)
                    .transform_point(*self.network.get_face(a).get_centroid());
                let centroid_b = self
                    .matrix(b, candidates)
                    .transform_point(*self.network.get_face(b).get_centroid());
                centroid_a.distance(centroid_b)
            })
            .collect()
    }

    fn largest_displacement(&self, candidates: &[Matrix4<f64>]) -> f64 {
        self.affected_points
            .par_iter()
            .map(|&i| {
                let point = &self.points[i];
                let face = point.get_face();
                let reference = *point.get_reference();

                let now = self
                    .network
                    .get_face(face)
                    .get_folding_matrix()
                    .transform_point(reference);
                let next = self.matrix(face, candidates).transform_point(reference);
                now.distance(next)
            })
            .reduce(|| 0.0, f64::max)
    }
}

impl<'a> Problem for FoldProblem<'a> {
    fn objective(&self, x: &[f64]) -> f64 {
        let deviation = math::sub(x, &self.proposal);
        deviation.iter().map(|d| d * d).sum()
    }

    fn constraints(&self, x: &[f64]) -> Vec<f64> {
        let hard_limit = PI - self.params.hard_limit_margin;
        let mut g: Vec<f64> = self
            .current
            .iter()
            .zip(x.iter())
            .map(|(angle, dx)| (angle + dx).abs() - hard_limit)
            .collect();

        for vertex in self.network.get_vertices() {
            if let Some(limit) = vertex.get_angle_sum_limit() {
                let sum: f64 = vertex
                    .get_creases()
                    .iter()
                    .map(|c| (self.current[c.0] + x[c.0]).abs())
                    .sum();
                g.push(sum - limit);
            }
        }

        let pairs = self.network.get_monitored_pairs();
        let displacement = self.params.max_point_displacement;
        if pairs.is_empty() && displacement.is_none() {
            return g;
        }

        let candidates = self.candidate_matrices(x);
        g.extend(
            self.face_separations(&candidates)
                .into_iter()
                .map(|separation| self.params.face_clearance - separation),
        );
        if let Some(limit) = displacement {
            g.push(self.largest_displacement(&candidates) - limit);
        }

        g
    }
}

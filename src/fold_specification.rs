use crate::assignment::Assignment;
use crate::error::{FoldError, FoldResult};
use crate::params::SolverParams;

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

/// Shape tag of a face, with the data its inside test needs.
///
/// Arc edges are given by index: edge `k` runs from vertex `k` to vertex
/// `k + 1` (wrapping around) of the face's vertex list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FaceShapeSpecification {
    Polygon,
    OneArc { center: [f64; 3], edge: usize },
    TwoArc { center: [f64; 3], edges: [usize; 2] },
}

impl Default for FaceShapeSpecification {
    fn default() -> Self {
        FaceShapeSpecification::Polygon
    }
}

/// Upper bound on the summed absolute fold angles of the creases around a vertex.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleSumLimit {
    pub vertex: usize,
    pub limit: f64,
}

/// A fold plan: the crease pattern in its flat reference pose plus the target
/// angle and rate of every crease.
///
/// The layout follows the FOLD file format's parallel-array style, but `creases_*`
/// only lists foldable hinges (no boundary edges) and `faces_creasePath` gives, for
/// every face, the creases crossed when walking to it from a reference face.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FoldSpecification {
    #[serde(default)]
    pub frame_title: String,

    #[serde(rename = "vertices_coords")]
    pub vertices: Vec<[f64; 3]>,

    // Indices of auxiliary (intersection) vertices, which carry no creases of their own
    #[serde(default, rename = "vertices_auxiliary")]
    pub auxiliary_vertices: Vec<usize>,

    #[serde(default, rename = "vertices_angleSumLimit")]
    pub angle_sum_limits: Vec<AngleSumLimit>,

    #[serde(rename = "creases_vertices")]
    pub creases: Vec<[usize; 2]>,

    // Optional: when present, overrides the sign of the matching fold angle
    #[serde(default, rename = "creases_assignment")]
    pub assignments: Vec<Assignment>,

    #[serde(rename = "creases_foldAngles")]
    pub fold_angles: Vec<f64>,

    // Radians per unit of simulation time
    #[serde(rename = "creases_foldRates")]
    pub fold_rates: Vec<f64>,

    #[serde(rename = "faces_vertices")]
    pub faces: Vec<Vec<usize>>,

    #[serde(default, rename = "faces_creasePath")]
    pub crease_paths: Vec<Vec<usize>>,

    #[serde(default, rename = "faces_shape")]
    pub shapes: Vec<FaceShapeSpecification>,

    // Face pairs whose centroids must not come closer than the solver's clearance
    #[serde(default, rename = "faces_monitoredPairs")]
    pub monitored_pairs: Vec<[usize; 2]>,

    #[serde(default)]
    pub solver: SolverParams,
}

impl FoldSpecification {
    pub fn from_file(path: &Path) -> FoldResult<FoldSpecification> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        FoldSpecification::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> FoldResult<FoldSpecification> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn to_json(&self) -> FoldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The signed target angle of every crease, with assignments applied.
    pub fn target_angles(&self) -> FoldResult<Vec<f64>> {
        if self.fold_angles.len() != self.creases.len() {
            return Err(FoldError::InvalidTopology(format!(
                "{} fold angles given for {} creases",
                self.fold_angles.len(),
                self.creases.len()
            )));
        }

        if self.assignments.is_empty() {
            return Ok(self.fold_angles.clone());
        }

        if self.assignments.len() != self.creases.len() {
            return Err(FoldError::InvalidTopology(format!(
                "{} assignments given for {} creases",
                self.assignments.len(),
                self.creases.len()
            )));
        }

        Ok(self
            .fold_angles
            .iter()
            .zip(self.assignments.iter())
            .map(|(&angle, assignment)| assignment.signed_target(angle))
            .collect())
    }

    pub fn fold_rates(&self) -> FoldResult<Vec<f64>> {
        if self.fold_rates.len() != self.creases.len() {
            return Err(FoldError::InvalidTopology(format!(
                "{} fold rates given for {} creases",
                self.fold_rates.len(),
                self.creases.len()
            )));
        }
        Ok(self.fold_rates.clone())
    }
}

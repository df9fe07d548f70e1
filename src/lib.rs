//! Rigid origami kinematics: panels joined by hinge creases fold toward target
//! angles one feasible increment at a time, carrying the points of an external
//! mass-spring integrator with them.

pub mod assignment;
pub mod data;
pub mod error;
pub mod face;
pub mod fold;
pub mod fold_specification;
pub mod math;
pub mod model;
pub mod motion;
pub mod optimizer;
pub mod params;
pub mod pattern;
pub mod solver;
pub mod validity;

pub use crate::data::{SpringVertex, VertexData};
pub use crate::error::{FoldError, FoldResult};
pub use crate::fold::OrigamiFold;
pub use crate::fold_specification::FoldSpecification;
pub use crate::model::{CreaseIndex, CreaseNetwork, FaceIndex, VertexIndex};
pub use crate::solver::{FoldPhase, FoldSolver, FoldState};

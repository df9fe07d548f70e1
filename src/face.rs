//! Rigid panels and the composition of their folding matrices.

use crate::error::{FoldError, FoldResult};
use crate::math;
use crate::model::{Crease, CreaseIndex, Vertex, VertexIndex};

use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3};

/// The closed set of face kinds, each with the data its inside test needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FaceShape {
    /// Every edge is a straight segment.
    Polygon,

    /// Edge `edge` is a circular arc about `center`; the rest are straight.
    OneArc { center: Point3<f64>, edge: usize },

    /// Both `edges` are circular arcs about the shared `center` (a ring sector).
    TwoArc { center: Point3<f64>, edges: [usize; 2] },
}

impl FaceShape {
    /// The arc center of edge `edge`, if that edge is an arc.
    fn arc_center(&self, edge: usize) -> Option<Point3<f64>> {
        match *self {
            FaceShape::Polygon => None,
            FaceShape::OneArc { center, edge: arc } if arc == edge => Some(center),
            FaceShape::TwoArc { center, edges } if edges.contains(&edge) => Some(center),
            _ => None,
        }
    }

    fn arc_edges(&self) -> Vec<usize> {
        match *self {
            FaceShape::Polygon => vec![],
            FaceShape::OneArc { edge, .. } => vec![edge],
            FaceShape::TwoArc { edges, .. } => edges.to_vec(),
        }
    }
}

/// Product of the transforms along `path`, taken left to right.
///
/// The path runs from the reference face outward, so the transform of the crease
/// nearest the reference face is outermost: `T1 * T2 * ... * Tk`. An empty path
/// gives the identity.
pub fn compose<F>(path: &[CreaseIndex], transform: F) -> Matrix4<f64>
where
    F: Fn(CreaseIndex) -> Matrix4<f64>,
{
    path.iter()
        .fold(Matrix4::identity(), |accumulated, &crease| accumulated * transform(crease))
}

#[derive(Clone, Debug)]
pub struct Face {
    // The vertices bounding this face, in boundary order
    vertices: Vec<VertexIndex>,

    // The creases crossed on the way from a reference face to this one
    crease_path: Vec<CreaseIndex>,

    shape: FaceShape,

    // Unit normal of the face in its reference pose (right-hand rule over `vertices`)
    normal: Vector3<f64>,

    // Average of the boundary vertices in the reference pose
    centroid: Point3<f64>,

    // Maps reference-pose coordinates on this face to the current folded pose
    folding_matrix: Matrix4<f64>,

    // Set when a crease on the path changed since `folding_matrix` was composed
    stale: bool,
}

impl Face {
    pub fn new(
        vertices: Vec<VertexIndex>,
        crease_path: Vec<CreaseIndex>,
        shape: FaceShape,
        vertex_store: &[Vertex],
    ) -> FoldResult<Face> {
        if vertices.len() < 3 {
            return Err(FoldError::InvalidTopology(format!(
                "face needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }

        for edge in shape.arc_edges() {
            if edge >= vertices.len() {
                return Err(FoldError::InvalidTopology(format!(
                    "arc edge {} does not exist on a face with {} edges",
                    edge,
                    vertices.len()
                )));
            }
        }

        let corners: Vec<Point3<f64>> = vertices
            .iter()
            .map(|&v| *vertex_store[v.0].get_coordinates())
            .collect();

        let mut normal = math::newell_normal(&corners);
        math::normalize(&mut normal).map_err(|_| {
            FoldError::InvalidTopology(format!("face with vertices {:?} has no area", vertices))
        })?;

        let centroid = Point3::centroid(&corners);

        Ok(Face {
            vertices,
            crease_path,
            shape,
            normal,
            centroid,
            folding_matrix: Matrix4::identity(),
            stale: true,
        })
    }

    /// Whether `point` (in reference-pose coordinates) lies inside or on the
    /// boundary of this face.
    ///
    /// Every edge is tested for the point being on its interior side: straight
    /// edges with the segment test, arc edges with the arc test about the stored
    /// center. Orientation comes from the face's own normal.
    pub fn po_inside(&self, point: Point3<f64>, vertex_store: &[Vertex]) -> bool {
        let count = self.vertices.len();

        (0..count).all(|edge| {
            let a = *vertex_store[self.vertices[edge].0].get_coordinates();
            let b = *vertex_store[self.vertices[(edge + 1) % count].0].get_coordinates();

            match self.shape.arc_center(edge) {
                Some(center) => math::left_on_arc(point, a, b, center, self.normal),
                None => math::left_on_straight_line(point, a, b, self.normal),
            }
        })
    }

    /// Recomposes the folding matrix from the current crease transforms.
    pub fn update_folding_matrix(&mut self, creases: &[Crease]) {
        self.folding_matrix = compose(&self.crease_path, |c| *creases[c.0].get_transform());
        self.stale = false;
    }

    /// The cached folding matrix. Callers that may have changed crease angles
    /// should go through `CreaseNetwork::folding_matrix` instead.
    pub fn get_folding_matrix(&self) -> &Matrix4<f64> {
        &self.folding_matrix
    }

    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_reference(&self) -> bool {
        self.crease_path.is_empty()
    }

    pub fn get_vertices(&self) -> &[VertexIndex] {
        &self.vertices
    }

    pub fn get_crease_path(&self) -> &[CreaseIndex] {
        &self.crease_path
    }

    pub fn get_shape(&self) -> &FaceShape {
        &self.shape
    }

    pub fn get_normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn get_centroid(&self) -> &Point3<f64> {
        &self.centroid
    }
}

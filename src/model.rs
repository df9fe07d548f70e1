use crate::error::{FoldError, FoldResult};
use crate::face::{Face, FaceShape};
use crate::fold_specification::{FaceShapeSpecification, FoldSpecification};
use crate::math;

use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexIndex(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CreaseIndex(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FaceIndex(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum VertexKind {
    /// A physically simulated vertex, which knows the creases meeting at it.
    Structural {
        creases: Vec<CreaseIndex>,

        // Upper bound on the summed absolute fold angles of `creases`
        angle_sum_limit: Option<f64>,
    },

    /// An intersection vertex kept only for geometric bookkeeping.
    Auxiliary,
}

#[derive(Clone, Debug)]
pub struct Vertex {
    index: VertexIndex,

    // The XYZ-coordinates of this vertex in the flat reference pose
    coordinates: Point3<f64>,

    kind: VertexKind,
}

impl Vertex {
    pub fn new(index: VertexIndex, coordinates: Point3<f64>, kind: VertexKind) -> Vertex {
        Vertex {
            index,
            coordinates,
            kind,
        }
    }

    pub fn get_index(&self) -> VertexIndex {
        self.index
    }

    pub fn get_coordinates(&self) -> &Point3<f64> {
        &self.coordinates
    }

    pub fn is_structural(&self) -> bool {
        matches!(self.kind, VertexKind::Structural { .. })
    }

    /// The creases meeting at this vertex (always empty for auxiliary vertices).
    pub fn get_creases(&self) -> &[CreaseIndex] {
        match &self.kind {
            VertexKind::Structural { creases, .. } => creases,
            VertexKind::Auxiliary => &[],
        }
    }

    pub fn get_angle_sum_limit(&self) -> Option<f64> {
        match self.kind {
            VertexKind::Structural { angle_sum_limit, .. } => angle_sum_limit,
            VertexKind::Auxiliary => None,
        }
    }
}

/// A hinge between two rigid panels.
#[derive(Clone, Debug)]
pub struct Crease {
    endpoints: [VertexIndex; 2],

    // The first endpoint: the rotation axis passes through it
    pivot: Point3<f64>,

    // Unit vector from the first endpoint to the second
    direction: Vector3<f64>,

    // The current fold angle, in radians
    angle: f64,

    // Rotation by `angle` about this crease's line, as an affine transform
    transform: Matrix4<f64>,

    // Faces whose crease path goes through this crease
    faces: Vec<FaceIndex>,
}

impl Crease {
    pub fn new(endpoints: [VertexIndex; 2], vertices: &[Vertex]) -> FoldResult<Crease> {
        let pivot = *vertices[endpoints[0].0].get_coordinates();
        let mut direction = vertices[endpoints[1].0].get_coordinates() - pivot;
        math::normalize(&mut direction)?;

        Ok(Crease {
            endpoints,
            pivot,
            direction,
            angle: 0.0,
            transform: Matrix4::identity(),
            faces: vec![],
        })
    }

    /// Replaces the fold angle and recomputes the rotation from it.
    ///
    /// Faces are not notified here: go through `CreaseNetwork::update_rot_matrix`
    /// so that their folding matrices get invalidated.
    fn update_rot_matrix(&mut self, angle: f64) {
        self.angle = angle;
        self.transform = self.transform_at(angle);
    }

    /// The transform this crease would have at `angle`, without changing it.
    pub fn transform_at(&self, angle: f64) -> Matrix4<f64> {
        math::hinge_transform(self.pivot, self.direction, angle)
    }

    pub fn get_endpoints(&self) -> [VertexIndex; 2] {
        self.endpoints
    }

    pub fn get_direction(&self) -> &Vector3<f64> {
        &self.direction
    }

    pub fn get_pivot(&self) -> &Point3<f64> {
        &self.pivot
    }

    pub fn get_angle(&self) -> f64 {
        self.angle
    }

    pub fn get_transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    pub fn get_faces(&self) -> &[FaceIndex] {
        &self.faces
    }
}

/// The crease pattern: arenas of vertices, creases and faces that refer to each
/// other by index.
#[derive(Clone, Debug)]
pub struct CreaseNetwork {
    vertices: Vec<Vertex>,
    creases: Vec<Crease>,
    faces: Vec<Face>,

    // Face pairs the solver keeps apart
    monitored_pairs: Vec<[FaceIndex; 2]>,
}

fn invalid<T>(message: String) -> FoldResult<T> {
    Err(FoldError::InvalidTopology(message))
}

impl CreaseNetwork {
    pub fn from_specification(spec: &FoldSpecification) -> FoldResult<CreaseNetwork> {
        let vertex_count = spec.vertices.len();
        let crease_count = spec.creases.len();
        let face_count = spec.faces.len();

        // The per-crease arrays have to line up with the creases
        spec.target_angles()?;
        spec.fold_rates()?;

        for &v in spec.auxiliary_vertices.iter() {
            if v >= vertex_count {
                return invalid(format!("auxiliary vertex {} does not exist", v));
            }
        }

        // Incident creases of every vertex
        let mut incident: Vec<Vec<CreaseIndex>> = vec![vec![]; vertex_count];
        for (i, endpoints) in spec.creases.iter().enumerate() {
            for &v in endpoints.iter() {
                if v >= vertex_count {
                    return invalid(format!("crease {} references unknown vertex {}", i, v));
                }
                incident[v].push(CreaseIndex(i));
            }
        }

        let mut limits: Vec<Option<f64>> = vec![None; vertex_count];
        for limit in spec.angle_sum_limits.iter() {
            if limit.vertex >= vertex_count {
                return invalid(format!(
                    "angle sum limit on unknown vertex {}",
                    limit.vertex
                ));
            }
            if spec.auxiliary_vertices.contains(&limit.vertex) {
                return invalid(format!(
                    "angle sum limit on auxiliary vertex {}",
                    limit.vertex
                ));
            }
            if !(limit.limit > 0.0) {
                return invalid(format!(
                    "angle sum limit {} on vertex {} is not positive",
                    limit.limit, limit.vertex
                ));
            }
            limits[limit.vertex] = Some(limit.limit);
        }

        let vertices: Vec<Vertex> = spec
            .vertices
            .iter()
            .zip(incident.into_iter().zip(limits.into_iter()))
            .enumerate()
            .map(|(i, (coordinates, (creases, angle_sum_limit)))| {
                let kind = if spec.auxiliary_vertices.contains(&i) {
                    VertexKind::Auxiliary
                } else {
                    VertexKind::Structural {
                        creases,
                        angle_sum_limit,
                    }
                };
                Vertex::new(
                    VertexIndex(i),
                    Point3::new(coordinates[0], coordinates[1], coordinates[2]),
                    kind,
                )
            })
            .collect();

        let mut creases = spec
            .creases
            .iter()
            .map(|&[a, b]| Crease::new([VertexIndex(a), VertexIndex(b)], &vertices))
            .collect::<FoldResult<Vec<Crease>>>()?;

        if !spec.crease_paths.is_empty() && spec.crease_paths.len() != face_count {
            return invalid(format!(
                "{} crease paths given for {} faces",
                spec.crease_paths.len(),
                face_count
            ));
        }
        if !spec.shapes.is_empty() && spec.shapes.len() != face_count {
            return invalid(format!(
                "{} face shapes given for {} faces",
                spec.shapes.len(),
                face_count
            ));
        }

        let mut faces = Vec::with_capacity(face_count);
        for (i, face_vertices) in spec.faces.iter().enumerate() {
            for &v in face_vertices.iter() {
                if v >= vertex_count {
                    return invalid(format!("face {} references unknown vertex {}", i, v));
                }
            }

            let path = spec.crease_paths.get(i).cloned().unwrap_or_default();
            for &c in path.iter() {
                if c >= crease_count {
                    return invalid(format!("face {} references unknown crease {}", i, c));
                }
                creases[c].faces.push(FaceIndex(i));
            }

            let shape = match spec.shapes.get(i).cloned().unwrap_or_default() {
                FaceShapeSpecification::Polygon => FaceShape::Polygon,
                FaceShapeSpecification::OneArc { center, edge } => FaceShape::OneArc {
                    center: Point3::new(center[0], center[1], center[2]),
                    edge,
                },
                FaceShapeSpecification::TwoArc { center, edges } => FaceShape::TwoArc {
                    center: Point3::new(center[0], center[1], center[2]),
                    edges,
                },
            };

            let face = Face::new(
                face_vertices.iter().map(|&v| VertexIndex(v)).collect(),
                path.into_iter().map(CreaseIndex).collect(),
                shape,
                &vertices,
            )
            .map_err(|e| match e {
                FoldError::InvalidTopology(message) => {
                    FoldError::InvalidTopology(format!("face {}: {}", i, message))
                }
                other => other,
            })?;
            faces.push(face);
        }

        let mut monitored_pairs = vec![];
        for &[a, b] in spec.monitored_pairs.iter() {
            if a >= face_count || b >= face_count || a == b {
                return invalid(format!("monitored face pair ({}, {}) is invalid", a, b));
            }
            monitored_pairs.push([FaceIndex(a), FaceIndex(b)]);
        }

        let mut network = CreaseNetwork {
            vertices,
            creases,
            faces,
            monitored_pairs,
        };
        network.update_folding_matrices();

        info!(
            vertices = network.vertices.len(),
            creases = network.creases.len(),
            faces = network.faces.len(),
            "built crease network"
        );

        Ok(network)
    }

    /// Sets the fold angle of `crease` and marks every face folded through it as
    /// stale. Those faces are recomposed the next time they are queried.
    pub fn update_rot_matrix(&mut self, crease: CreaseIndex, angle: f64) {
        let crease = &mut self.creases[crease.0];
        crease.update_rot_matrix(angle);

        for &face in crease.faces.iter() {
            self.faces[face.0].mark_stale();
        }
    }

    /// The folding matrix of `face`, recomposed first if it is stale.
    pub fn folding_matrix(&mut self, face: FaceIndex) -> Matrix4<f64> {
        let creases = &self.creases;
        let face = &mut self.faces[face.0];
        if face.is_stale() {
            face.update_folding_matrix(creases);
        }
        *face.get_folding_matrix()
    }

    /// Recomposes every stale folding matrix.
    pub fn update_folding_matrices(&mut self) {
        let creases = &self.creases;
        let refreshed = self
            .faces
            .par_iter_mut()
            .filter(|face| face.is_stale())
            .map(|face| face.update_folding_matrix(creases))
            .count();

        if refreshed > 0 {
            debug!(refreshed, "recomposed folding matrices");
        }
    }

    /// Faces whose folding matrix depends on any of `creases`, in index order.
    pub fn affected_faces<I>(&self, creases: I) -> Vec<FaceIndex>
    where
        I: IntoIterator<Item = CreaseIndex>,
    {
        creases
            .into_iter()
            .flat_map(|c| self.creases[c.0].faces.iter().copied())
            .collect::<BTreeSet<FaceIndex>>()
            .into_iter()
            .collect()
    }

    /// All faces containing `point` (reference pose), in construction order.
    pub fn faces_containing(&self, point: Point3<f64>) -> Vec<FaceIndex> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.po_inside(point, &self.vertices))
            .map(|(i, _)| FaceIndex(i))
            .collect()
    }

    /// Current fold angle of every crease.
    pub fn angles(&self) -> Vec<f64> {
        self.creases.iter().map(|c| c.get_angle()).collect()
    }

    pub fn get_vertex(&self, index: VertexIndex) -> &Vertex {
        &self.vertices[index.0]
    }

    pub fn get_crease(&self, index: CreaseIndex) -> &Crease {
        &self.creases[index.0]
    }

    pub fn get_face(&self, index: FaceIndex) -> &Face {
        &self.faces[index.0]
    }

    pub fn get_vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn get_creases(&self) -> &[Crease] {
        &self.creases
    }

    pub fn get_faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn get_monitored_pairs(&self) -> &[[FaceIndex; 2]] {
        &self.monitored_pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fold_specification::AngleSumLimit;
    use crate::pattern::{Pattern, SingleCrease};
    use approx::assert_abs_diff_eq;
    use cgmath::{Matrix3, Rad, Transform};
    use std::f64::consts::FRAC_PI_2;

    /// Three panels in a row, folded through two parallel creases.
    fn strip() -> FoldSpecification {
        FoldSpecification {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [2.0, 0.0, 0.0],
                [2.0, 1.0, 0.0],
                [3.0, 0.0, 0.0],
                [3.0, 1.0, 0.0],
            ],
            creases: vec![[2, 3], [4, 5]],
            fold_angles: vec![FRAC_PI_2, -FRAC_PI_2],
            fold_rates: vec![1.0, 1.0],
            faces: vec![vec![0, 2, 3, 1], vec![2, 4, 5, 3], vec![4, 6, 7, 5]],
            crease_paths: vec![vec![], vec![0], vec![0, 1]],
            ..Default::default()
        }
    }

    #[test]
    fn zero_angles_give_identity_everywhere() {
        let mut network = CreaseNetwork::from_specification(&strip()).unwrap();
        for crease in network.get_creases() {
            assert_eq!(*crease.get_transform(), Matrix4::identity());
        }
        for i in 0..3 {
            assert_eq!(network.folding_matrix(FaceIndex(i)), Matrix4::identity());
        }
    }

    #[test]
    fn structural_vertices_know_their_creases() {
        let network = CreaseNetwork::from_specification(&strip()).unwrap();
        assert_eq!(network.get_vertex(VertexIndex(2)).get_creases(), &[CreaseIndex(0)]);
        assert!(network.get_vertex(VertexIndex(0)).get_creases().is_empty());
        assert!(network.get_vertex(VertexIndex(0)).is_structural());
        assert_eq!(network.get_crease(CreaseIndex(0)).get_faces(), &[FaceIndex(1), FaceIndex(2)]);
        assert_eq!(
            network.affected_faces(vec![CreaseIndex(1)]),
            vec![FaceIndex(2)]
        );
        assert_eq!(
            network.affected_faces(vec![CreaseIndex(1), CreaseIndex(0)]),
            vec![FaceIndex(1), FaceIndex(2)]
        );
    }

    #[test]
    fn updates_invalidate_lazily() {
        let mut network = CreaseNetwork::from_specification(&strip()).unwrap();
        network.update_rot_matrix(CreaseIndex(1), 0.3);

        assert!(!network.get_face(FaceIndex(0)).is_stale());
        assert!(!network.get_face(FaceIndex(1)).is_stale());
        assert!(network.get_face(FaceIndex(2)).is_stale());

        network.update_rot_matrix(CreaseIndex(0), 0.2);
        assert!(network.get_face(FaceIndex(1)).is_stale());

        let m = network.folding_matrix(FaceIndex(2));
        assert!(!network.get_face(FaceIndex(2)).is_stale());
        assert!(network.get_face(FaceIndex(1)).is_stale());

        let expected = network.get_crease(CreaseIndex(0)).transform_at(0.2)
            * network.get_crease(CreaseIndex(1)).transform_at(0.3);
        assert_eq!(m, expected);
    }

    #[test]
    fn rotation_part_stays_orthonormal() {
        let mut network = CreaseNetwork::from_specification(&strip()).unwrap();
        for (i, angle) in [0.1, 1.3, -2.9, 3.1].iter().enumerate() {
            network.update_rot_matrix(CreaseIndex(i % 2), *angle);
            let t = network.get_crease(CreaseIndex(i % 2)).get_transform();
            let r = Matrix3::new(
                t.x.x, t.x.y, t.x.z, t.y.x, t.y.y, t.y.z, t.z.x, t.z.y, t.z.z,
            );
            assert!(math::is_rotation(&r, 1e-12));
            assert_eq!(network.get_crease(CreaseIndex(i % 2)).get_angle(), *angle);
        }
    }

    #[test]
    fn recomposition_is_idempotent() {
        let mut network = CreaseNetwork::from_specification(&strip()).unwrap();
        network.update_rot_matrix(CreaseIndex(0), 0.7);
        network.update_rot_matrix(CreaseIndex(1), -1.1);

        let first = network.folding_matrix(FaceIndex(2));
        let creases = network.get_creases().to_vec();
        let mut face = network.get_face(FaceIndex(2)).clone();
        face.update_folding_matrix(&creases);
        let second = *face.get_folding_matrix();
        face.update_folding_matrix(&creases);
        let third = *face.get_folding_matrix();

        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn path_product_matches_sequential_folding() {
        let mut network = CreaseNetwork::from_specification(&strip()).unwrap();
        network.update_rot_matrix(CreaseIndex(0), FRAC_PI_2);
        network.update_rot_matrix(CreaseIndex(1), -FRAC_PI_2);
        network.update_folding_matrices();

        let corner = Point3::new(3.0, 0.0, 0.0);
        let full = network.get_face(FaceIndex(2)).get_folding_matrix().transform_point(corner);

        let outer = network.get_crease(CreaseIndex(0)).get_transform();
        let inner = network.get_crease(CreaseIndex(1)).get_transform();
        let sequential = outer.transform_point(inner.transform_point(corner));
        assert_abs_diff_eq!(full, sequential, epsilon = 1e-12);

        // The middle panel hangs straight down and the last one turns back level
        assert_abs_diff_eq!(full, Point3::new(2.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn single_crease_face_rotates_about_the_crease_line() {
        let spec = SingleCrease::new(1.0, FRAC_PI_2, 1.0).generate();
        let mut network = CreaseNetwork::from_specification(&spec).unwrap();
        network.update_rot_matrix(CreaseIndex(0), 0.8);

        let corner = Point3::new(-1.0, 1.0, 0.0);
        let moved = network.folding_matrix(FaceIndex(1)).transform_point(corner);
        let rotation = Matrix3::from_axis_angle(Vector3::unit_y(), Rad(0.8));
        let expected = Point3::new(0.0, 0.0, 0.0) + rotation * (corner - Point3::new(0.0, 0.0, 0.0));
        assert_abs_diff_eq!(moved, expected, epsilon = 1e-12);
    }

    #[test]
    fn faces_containing_reports_construction_order() {
        let network = CreaseNetwork::from_specification(&strip()).unwrap();
        assert_eq!(
            network.faces_containing(Point3::new(1.0, 0.5, 0.0)),
            vec![FaceIndex(0), FaceIndex(1)]
        );
        assert_eq!(
            network.faces_containing(Point3::new(2.5, 0.5, 0.0)),
            vec![FaceIndex(2)]
        );
        assert!(network.faces_containing(Point3::new(4.0, 0.5, 0.0)).is_empty());
    }

    #[test]
    fn malformed_networks_are_rejected() {
        let mut spec = strip();
        spec.creases[1] = [4, 42];
        assert!(matches!(
            CreaseNetwork::from_specification(&spec),
            Err(FoldError::InvalidTopology(_))
        ));

        let mut spec = strip();
        spec.crease_paths[2] = vec![0, 7];
        assert!(matches!(
            CreaseNetwork::from_specification(&spec),
            Err(FoldError::InvalidTopology(_))
        ));

        let mut spec = strip();
        spec.faces[1] = vec![2, 4, 99];
        assert!(CreaseNetwork::from_specification(&spec).is_err());

        let mut spec = strip();
        spec.fold_rates.pop();
        assert!(CreaseNetwork::from_specification(&spec).is_err());

        let mut spec = strip();
        spec.monitored_pairs = vec![[0, 3]];
        assert!(CreaseNetwork::from_specification(&spec).is_err());

        let mut spec = strip();
        spec.auxiliary_vertices = vec![2];
        spec.angle_sum_limits = vec![AngleSumLimit { vertex: 2, limit: 1.0 }];
        assert!(CreaseNetwork::from_specification(&spec).is_err());

        // Zero-length crease
        let mut spec = strip();
        spec.vertices[3] = spec.vertices[2];
        assert!(matches!(
            CreaseNetwork::from_specification(&spec),
            Err(FoldError::InvalidAxis { .. })
        ));
    }
}

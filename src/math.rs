//! Small linear-algebra kernel on top of `cgmath`.
//!
//! `cgmath` already covers the fixed-size basics (products, sums, transpose,
//! identity / zero, dot / cross, distance). This module adds the pieces the
//! folding code needs that it lacks: the Rodrigues builder, rotations about an
//! arbitrary line, orientation predicates for straight and circular edges,
//! p-norms, and helpers for the optimizer's dynamically sized decision vectors.

use crate::error::{FoldError, FoldResult};

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, Point3, SquareMatrix, Vector3, Zero};

/// Absolute tolerance used by the geometric classification predicates.
pub const GEOMETRY_EPSILON: f64 = 1e-10;

/// Axes shorter than this are treated as degenerate.
pub const AXIS_EPSILON: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Norm {
    L1,
    L2,
    Infinity,
}

/// The p-norm of a (dynamically sized) vector.
pub fn vector_norm(v: &[f64], norm: Norm) -> f64 {
    match norm {
        Norm::L1 => v.iter().map(|x| x.abs()).sum(),
        Norm::L2 => v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        Norm::Infinity => v.iter().fold(0.0, |acc: f64, x| acc.max(x.abs())),
    }
}

/// Matrix norm: induced 1-norm (max column sum), induced infinity-norm (max row
/// sum), or Frobenius for `Norm::L2`.
pub fn matrix_norm(m: &Matrix3<f64>, norm: Norm) -> f64 {
    match norm {
        Norm::L1 => (0..3)
            .map(|c| (0..3).map(|r| m[c][r].abs()).sum::<f64>())
            .fold(0.0, f64::max),
        Norm::Infinity => (0..3)
            .map(|r| (0..3).map(|c| m[c][r].abs()).sum::<f64>())
            .fold(0.0, f64::max),
        Norm::L2 => (0..3)
            .flat_map(|c| (0..3).map(move |r| (c, r)))
            .map(|(c, r)| m[c][r] * m[c][r])
            .sum::<f64>()
            .sqrt(),
    }
}

/// Euclidean length of a decision vector.
pub fn magnitude(v: &[f64]) -> f64 {
    vector_norm(v, Norm::L2)
}

pub fn add(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

pub fn sub(a: &[f64], b: &[f64]) -> Vec<f64> {
    assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| x - y).collect()
}

pub fn scale(a: &[f64], s: f64) -> Vec<f64> {
    a.iter().map(|x| x * s).collect()
}

/// Signed volume `a · (b × c)`.
pub fn triple_product(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> f64 {
    a.dot(b.cross(c))
}

/// Normalizes `v` in place and returns its original length.
pub fn normalize(v: &mut Vector3<f64>) -> FoldResult<f64> {
    let length = v.magnitude();
    if !(length > AXIS_EPSILON) {
        return Err(FoldError::InvalidAxis { length });
    }
    *v /= length;
    Ok(length)
}

/// The skew-symmetric matrix `K` such that `K v = axis × v`.
pub fn cross_product_matrix(axis: Vector3<f64>) -> Matrix3<f64> {
    // Columns, not rows
    Matrix3::new(
        0.0, axis.z, -axis.y, //
        -axis.z, 0.0, axis.x, //
        axis.y, -axis.x, 0.0,
    )
}

/// Rodrigues' formula `R = I + sin(θ) K + (1 - cos(θ)) K²`.
///
/// The axis is normalized first; a zero axis is an error.
pub fn rotation_matrix(axis: Vector3<f64>, angle: f64) -> FoldResult<Matrix3<f64>> {
    let mut unit = axis;
    normalize(&mut unit)?;
    Ok(rotation_about_unit_axis(unit, angle))
}

/// Same as `rotation_matrix`, for callers that already hold a unit axis.
pub(crate) fn rotation_about_unit_axis(unit: Vector3<f64>, angle: f64) -> Matrix3<f64> {
    let k = cross_product_matrix(unit);
    Matrix3::identity() + k * angle.sin() + (k * k) * (1.0 - angle.cos())
}

/// Affine rotation by `angle` about the line through `pivot` along the unit `axis`.
pub fn hinge_transform(pivot: Point3<f64>, unit_axis: Vector3<f64>, angle: f64) -> Matrix4<f64> {
    let offset = Vector3::new(pivot.x, pivot.y, pivot.z);
    let rotation = Matrix4::from(rotation_about_unit_axis(unit_axis, angle));
    Matrix4::from_translation(offset) * rotation * Matrix4::from_translation(-offset)
}

/// Whether `m` is a proper rotation (orthonormal with determinant one).
pub fn is_rotation(m: &Matrix3<f64>, tolerance: f64) -> bool {
    let gram = m.transpose() * m - Matrix3::identity();
    matrix_norm(&gram, Norm::Infinity) <= tolerance && (m.determinant() - 1.0).abs() <= tolerance
}

/// Plane normal of a (possibly non-convex) polygon by Newell's method. The
/// result is not normalized and points along the right-hand winding direction.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::zero();
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Whether `p` lies to the left of (or on) the directed segment `a -> b`, as seen
/// looking down the unit `normal` of the plane containing all three points.
pub fn left_on_straight_line(
    p: Point3<f64>,
    a: Point3<f64>,
    b: Point3<f64>,
    normal: Vector3<f64>,
) -> bool {
    let edge = b - a;
    triple_product(normal, edge, p - a) >= -GEOMETRY_EPSILON * edge.magnitude().max(1.0)
}

/// Whether `p` lies on the interior side of (or on) the circular arc from `a` to
/// `b` about `center`.
///
/// When the center is left of the chord the arc bulges away from the interior,
/// so the interior is the disk; otherwise the arc bulges into the face and the
/// interior is everything outside the disk.
pub fn left_on_arc(
    p: Point3<f64>,
    a: Point3<f64>,
    b: Point3<f64>,
    center: Point3<f64>,
    normal: Vector3<f64>,
) -> bool {
    let radius = (a - center).magnitude();
    let distance = (p - center).magnitude();
    let tolerance = GEOMETRY_EPSILON * radius.max(1.0);

    if left_on_straight_line(center, a, b, normal) {
        distance <= radius + tolerance
    } else {
        distance >= radius - tolerance
    }
}

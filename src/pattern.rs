use crate::assignment::Assignment;
use crate::fold_specification::{FaceShapeSpecification, FoldSpecification};

use std::f64::consts::PI;

/// Something that can lay out a crease pattern and its fold plan.
pub trait Pattern {
    fn generate(&self) -> FoldSpecification;
}

fn rate(target: f64, duration: f64) -> f64 {
    if duration > 0.0 {
        target.abs() / duration
    } else {
        target.abs()
    }
}

/// Two square panels of side `size` hinged along the y-axis.
///
/// The panel on `+x` is the reference face; the other one valley-folds by
/// `target` radians over `duration` units of time.
#[derive(Clone, Copy, Debug)]
pub struct SingleCrease {
    size: f64,
    target: f64,
    duration: f64,
}

impl SingleCrease {
    pub fn new(size: f64, target: f64, duration: f64) -> SingleCrease {
        SingleCrease {
            size,
            target,
            duration,
        }
    }
}

impl Pattern for SingleCrease {
    fn generate(&self) -> FoldSpecification {
        let s = self.size;

        FoldSpecification {
            frame_title: "single crease".to_string(),
            vertices: vec![
                [0.0, 0.0, 0.0],
                [0.0, s, 0.0],
                [s, 0.0, 0.0],
                [s, s, 0.0],
                [-s, 0.0, 0.0],
                [-s, s, 0.0],
            ],
            creases: vec![[0, 1]],
            assignments: vec![Assignment::V],
            fold_angles: vec![self.target.abs()],
            fold_rates: vec![rate(self.target, self.duration)],
            faces: vec![vec![0, 2, 3, 1], vec![0, 1, 5, 4]],
            crease_paths: vec![vec![], vec![0]],
            shapes: vec![FaceShapeSpecification::Polygon; 2],
            monitored_pairs: vec![[0, 1]],
            ..Default::default()
        }
    }
}

/// A disk cut open along the positive x-axis and divided into `sectors` equal
/// slices. Neighbouring slices are joined by radial creases that alternate
/// valley and mountain. With a positive `inner_radius` the center is cut out
/// and every slice becomes a ring sector bounded by two arcs.
///
/// The first slice is the reference face; slice `k` is reached through the
/// first `k` radial creases.
#[derive(Clone, Copy, Debug)]
pub struct Disk {
    sectors: usize,
    radius: f64,
    inner_radius: f64,
    target: f64,
    duration: f64,
}

impl Disk {
    pub fn new(sectors: usize, radius: f64, target: f64, duration: f64) -> Disk {
        Disk {
            sectors: sectors.max(3),
            radius,
            inner_radius: 0.0,
            target,
            duration,
        }
    }

    pub fn ring(
        sectors: usize,
        radius: f64,
        inner_radius: f64,
        target: f64,
        duration: f64,
    ) -> Disk {
        Disk {
            inner_radius,
            ..Disk::new(sectors, radius, target, duration)
        }
    }

    fn is_ring(&self) -> bool {
        self.inner_radius > 0.0
    }

    fn on_circle(radius: f64, angle: f64) -> [f64; 3] {
        [radius * angle.cos(), radius * angle.sin(), 0.0]
    }
}

impl Pattern for Disk {
    fn generate(&self) -> FoldSpecification {
        let n = self.sectors;
        let sweep = 2.0 * PI / n as f64;

        // Outer rim vertices 0..=n (the last one closes the cut), then either the
        // center or the inner rim 0..=n
        let mut vertices: Vec<[f64; 3]> = (0..=n)
            .map(|k| Disk::on_circle(self.radius, k as f64 * sweep))
            .collect();
        let inner = |k: usize| n + 1 + if self.is_ring() { k } else { 0 };
        if self.is_ring() {
            vertices.extend((0..=n).map(|k| Disk::on_circle(self.inner_radius, k as f64 * sweep)));
        } else {
            vertices.push([0.0, 0.0, 0.0]);
        }

        // Crease `k - 1` runs outward to outer rim vertex `k`
        let creases: Vec<[usize; 2]> = (1..n).map(|k| [inner(k), k]).collect();
        let assignments: Vec<Assignment> = (0..creases.len())
            .map(|i| if i % 2 == 0 { Assignment::V } else { Assignment::M })
            .collect();

        let mut faces = Vec::with_capacity(n);
        let mut shapes = Vec::with_capacity(n);
        for k in 0..n {
            if self.is_ring() {
                faces.push(vec![inner(k), k, k + 1, inner(k + 1)]);
                shapes.push(FaceShapeSpecification::TwoArc {
                    center: [0.0, 0.0, 0.0],
                    edges: [1, 3],
                });
            } else {
                faces.push(vec![inner(k), k, k + 1]);
                shapes.push(FaceShapeSpecification::OneArc {
                    center: [0.0, 0.0, 0.0],
                    edge: 1,
                });
            }
        }

        FoldSpecification {
            frame_title: (if self.is_ring() { "ring" } else { "disk" }).to_string(),
            vertices,
            creases,
            assignments,
            fold_angles: vec![self.target.abs(); n - 1],
            fold_rates: vec![rate(self.target, self.duration); n - 1],
            faces,
            crease_paths: (0..n).map(|k| (0..k).collect()).collect(),
            shapes,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CreaseNetwork, FaceIndex};
    use cgmath::Point3;

    #[test]
    fn single_crease_builds() {
        let spec = SingleCrease::new(2.0, 1.5, 3.0).generate();
        assert_eq!(spec.fold_rates, vec![0.5]);
        assert_eq!(spec.target_angles().unwrap(), vec![1.5]);

        let network = CreaseNetwork::from_specification(&spec).unwrap();
        assert_eq!(network.get_faces().len(), 2);
        assert!(network.get_face(FaceIndex(0)).is_reference());
    }

    #[test]
    fn disk_sectors_cover_the_disk() {
        let spec = Disk::new(6, 1.0, 0.5, 1.0).generate();
        assert_eq!(spec.creases.len(), 5);
        assert_eq!(spec.target_angles().unwrap(), vec![0.5, -0.5, 0.5, -0.5, 0.5]);
        assert_eq!(spec.crease_paths[3], vec![0, 1, 2]);

        let network = CreaseNetwork::from_specification(&spec).unwrap();

        // Just inside the rim, in the middle of the second slice
        let angle = 1.5 * PI / 3.0;
        let inside = Point3::new(0.99 * angle.cos(), 0.99 * angle.sin(), 0.0);
        assert_eq!(network.faces_containing(inside), vec![FaceIndex(1)]);

        // Between the chord and the arc
        let bulge = Point3::new(0.999 * (PI / 6.0).cos(), 0.999 * (PI / 6.0).sin(), 0.0);
        assert_eq!(network.faces_containing(bulge), vec![FaceIndex(0)]);
        assert!(network.faces_containing(Point3::new(1.01, 0.01, 0.0)).is_empty());
    }

    #[test]
    fn ring_sectors_exclude_the_hole() {
        let spec = Disk::ring(4, 2.0, 1.0, 1.0, 1.0).generate();
        let network = CreaseNetwork::from_specification(&spec).unwrap();

        let diagonal = |r: f64| Point3::new(r * (PI / 4.0).cos(), r * (PI / 4.0).sin(), 0.0);
        assert_eq!(network.faces_containing(diagonal(1.5)), vec![FaceIndex(0)]);
        assert_eq!(network.faces_containing(diagonal(1.98)), vec![FaceIndex(0)]);
        // Past the inner chord but still in the hole
        assert!(network.faces_containing(diagonal(0.999)).is_empty());
        assert!(network.faces_containing(diagonal(0.5)).is_empty());
    }
}

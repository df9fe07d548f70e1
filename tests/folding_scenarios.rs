use rigid_folding::fold_specification::AngleSumLimit;
use rigid_folding::model::CreaseIndex;
use rigid_folding::optimizer::OptimizerKind;
use rigid_folding::params::{OptimizerParams, SolverParams};
use rigid_folding::pattern::{Disk, Pattern, SingleCrease};
use rigid_folding::{
    CreaseNetwork, FaceIndex, FoldError, FoldPhase, FoldSolver, FoldSpecification, OrigamiFold,
    VertexData,
};

use approx::assert_abs_diff_eq;
use cgmath::{Matrix3, MetricSpace, Point3, Rad, Transform, Vector3, Zero};
use std::f64::consts::{FRAC_PI_2, PI};

fn vertices(spec: &FoldSpecification) -> Vec<VertexData> {
    spec.vertices
        .iter()
        .map(|v| VertexData::new(Point3::new(v[0], v[1], v[2])))
        .collect()
}

/// Runs `fold` in steps of `dt` until it reports `Exhausted`, returning the
/// number of steps taken.
fn fold_to_completion(fold: &mut OrigamiFold, points: &mut [VertexData], dt: f64) -> u32 {
    for step in 1..=1000 {
        let phase = fold.preprocess(points, f64::from(step) * dt).unwrap();
        fold.postprocess(points).unwrap();
        if phase == FoldPhase::Exhausted {
            return step;
        }
    }
    panic!("fold never completed");
}

/// Every face keeps its shape, and neighbouring faces agree along the crease
/// that joins them.
fn assert_rigid(network: &CreaseNetwork) {
    for face in network.get_faces() {
        let matrix = face.get_folding_matrix();
        let corners: Vec<Point3<f64>> = face
            .get_vertices()
            .iter()
            .map(|&v| *network.get_vertex(v).get_coordinates())
            .collect();

        for a in corners.iter() {
            for b in corners.iter() {
                let moved = matrix.transform_point(*a).distance(matrix.transform_point(*b));
                assert_abs_diff_eq!(moved, a.distance(*b), epsilon = 1e-9);
            }
        }
    }

    for (i, crease) in network.get_creases().iter().enumerate() {
        let faces = crease.get_faces();
        if faces.is_empty() {
            continue;
        }

        // The nearest face past the crease, and the face it is folded from
        let child = network.get_face(faces[0]);
        let position = child
            .get_crease_path()
            .iter()
            .position(|c| *c == CreaseIndex(i))
            .unwrap();
        let parent = network
            .get_faces()
            .iter()
            .find(|f| f.get_crease_path() == &child.get_crease_path()[..position])
            .unwrap();

        for endpoint in crease.get_endpoints().iter() {
            let p = *network.get_vertex(*endpoint).get_coordinates();
            assert_abs_diff_eq!(
                child.get_folding_matrix().transform_point(p),
                parent.get_folding_matrix().transform_point(p),
                epsilon = 1e-9
            );
        }
    }
}

#[test]
fn single_crease_folds_a_quarter_turn() {
    let spec = SingleCrease::new(1.0, FRAC_PI_2, 1.0).generate();
    let mut points = vec![
        VertexData::new(Point3::new(-1.0, 0.0, 0.0)),
        VertexData::new(Point3::new(-0.5, 0.7, 0.0)),
        VertexData::new(Point3::new(-1.0, 1.0, 0.0)),
        VertexData::new(Point3::new(0.5, 0.5, 0.0)),
    ];
    let references: Vec<Point3<f64>> = points.iter().map(|p| p.position).collect();
    let mut fold = OrigamiFold::new(&spec, &points).unwrap();

    assert_eq!(fold_to_completion(&mut fold, &mut points, 0.1), 10);
    assert_abs_diff_eq!(fold.get_network().angles()[0], FRAC_PI_2, epsilon = 1e-9);

    // Rotation about the crease line, which runs along +y through the origin
    let rotation = Matrix3::from_axis_angle(Vector3::unit_y(), Rad(FRAC_PI_2));
    for (point, reference) in points.iter().take(3).zip(references.iter()) {
        let expected = Point3::new(0.0, 0.0, 0.0) + rotation * (reference - Point3::new(0.0, 0.0, 0.0));
        assert_abs_diff_eq!(point.position, expected, epsilon = 1e-9);
    }
    assert_eq!(points[3].position, references[3]);
}

#[test]
fn both_strategies_agree_on_an_unconstrained_fold() {
    for kind in [OptimizerKind::CompassSearch, OptimizerKind::RaySearch].iter() {
        let mut spec = SingleCrease::new(1.0, 1.2, 1.0).generate();
        spec.solver.optimizer.algorithm = *kind;
        let mut points = vertices(&spec);
        let mut fold = OrigamiFold::new(&spec, &points).unwrap();

        assert_eq!(fold_to_completion(&mut fold, &mut points, 0.25), 4);
        assert_abs_diff_eq!(fold.get_network().angles()[0], 1.2, epsilon = 1e-12);
    }
}

/// Two creases around a vertex whose summed fold angles may not exceed 1.
fn bounded_fan() -> FoldSpecification {
    FoldSpecification {
        frame_title: "bounded fan".to_string(),
        vertices: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.0, -1.0, 0.0],
        ],
        angle_sum_limits: vec![AngleSumLimit {
            vertex: 0,
            limit: 1.0,
        }],
        creases: vec![[0, 1], [0, 2]],
        fold_angles: vec![1.0, 1.0],
        fold_rates: vec![1.0, 1.0],
        faces: vec![vec![0, 4, 1], vec![0, 1, 2], vec![0, 2, 3]],
        crease_paths: vec![vec![], vec![0], vec![0, 1]],
        ..Default::default()
    }
}

#[test]
fn angle_sum_limit_makes_the_fold_infeasible() {
    let spec = bounded_fan();
    let mut network = CreaseNetwork::from_specification(&spec).unwrap();
    let mut solver = FoldSolver::from_specification(&spec, &network).unwrap();

    for _ in 0..5 {
        assert_eq!(
            solver.advance(&mut network, &[], 0.1).unwrap(),
            FoldPhase::Committed
        );
    }

    let before = network.angles();
    match solver.advance(&mut network, &[], 0.1) {
        Err(FoldError::FoldingInfeasible { step, attempts }) => {
            assert_eq!(step, 5);
            assert_eq!(attempts, 9);
        }
        other => panic!("expected an infeasible step, got {:?}", other),
    }

    let after = network.angles();
    assert_eq!(before, after);
    assert!(after.iter().map(|a| a.abs()).sum::<f64>() <= 1.0 + 1e-9);
    assert_eq!(solver.phase(), FoldPhase::Idle);
}

#[test]
fn exhausted_steps_change_nothing() {
    let spec = SingleCrease::new(1.0, 0.6, 1.0).generate();
    let mut points = vertices(&spec);
    let mut fold = OrigamiFold::new(&spec, &points).unwrap();
    let steps = fold_to_completion(&mut fold, &mut points, 0.2);

    let angles = fold.get_network().angles();
    let positions: Vec<Point3<f64>> = points.iter().map(|p| p.position).collect();

    for step in 1..=3 {
        let time = f64::from(steps + step) * 0.2;
        assert_eq!(fold.preprocess(&mut points, time).unwrap(), FoldPhase::Exhausted);
        fold.postprocess(&mut points).unwrap();
    }

    assert_eq!(fold.get_network().angles(), angles);
    assert_eq!(fold.get_solver().steps(), u64::from(steps));
    for (point, before) in points.iter().zip(positions.iter()) {
        assert_eq!(point.position, *before);
        assert_eq!(point.velocity, Vector3::zero());
    }
}

#[test]
fn monitored_faces_stop_short_of_touching() {
    let mut spec = SingleCrease::new(1.0, 3.0, 1.0).generate();
    spec.solver = SolverParams::default().with_face_clearance(0.5);
    let mut network = CreaseNetwork::from_specification(&spec).unwrap();
    let mut solver = FoldSolver::from_specification(&spec, &network).unwrap();

    let error = (0..100)
        .find_map(|_| solver.advance(&mut network, &[], 0.1).err())
        .unwrap();
    assert!(matches!(error, FoldError::FoldingInfeasible { .. }));
    assert!(error.is_recoverable());

    // Centroids one unit apart in the flat pose close to half that at 2π/3
    assert_abs_diff_eq!(network.angles()[0], 2.0 * PI / 3.0, epsilon = 1e-6);
    network.update_folding_matrices();
    let a = network
        .get_face(FaceIndex(0))
        .get_folding_matrix()
        .transform_point(*network.get_face(FaceIndex(0)).get_centroid());
    let b = network
        .get_face(FaceIndex(1))
        .get_folding_matrix()
        .transform_point(*network.get_face(FaceIndex(1)).get_centroid());
    assert!(a.distance(b) >= 0.5 - 1e-9);
}

#[test]
fn disk_folds_rigidly() {
    let spec = Disk::new(6, 1.0, 0.5, 1.0).generate();
    let mut points = vertices(&spec);
    let mut fold = OrigamiFold::new(&spec, &points).unwrap();

    assert_eq!(fold_to_completion(&mut fold, &mut points, 0.1), 10);
    for (angle, target) in fold
        .get_network()
        .angles()
        .iter()
        .zip(spec.target_angles().unwrap().iter())
    {
        assert_abs_diff_eq!(*angle, *target, epsilon = 1e-10);
    }
    assert_rigid(fold.get_network());

    // The center sits on every crease and never moves
    assert_abs_diff_eq!(points[7].position, Point3::new(0.0, 0.0, 0.0), epsilon = 1e-12);
}

#[test]
fn ring_folds_rigidly() {
    let spec = Disk::ring(5, 2.0, 1.0, 0.8, 2.0).generate();
    let mut points = vertices(&spec);
    let mut fold = OrigamiFold::new(&spec, &points).unwrap();

    fold_to_completion(&mut fold, &mut points, 0.1);
    assert_rigid(fold.get_network());

    // All creases are radial, so every hinge passes through the center
    let center = Point3::new(0.0, 0.0, 0.0);
    for (point, reference) in points.iter().zip(spec.vertices.iter()) {
        let reference = Point3::new(reference[0], reference[1], reference[2]);
        assert_abs_diff_eq!(
            point.position.distance(center),
            reference.distance(center),
            epsilon = 1e-9
        );

        let face = fold.get_network().faces_containing(reference)[0];
        if face == FaceIndex(0) {
            assert_abs_diff_eq!(point.position, reference, epsilon = 1e-12);
        }
    }
}

#[test]
fn json_plans_drive_the_fold() {
    let plan = r#"{
        "frame_title": "waterbomb corner",
        "vertices_coords": [[0, 0, 0], [1, 0, 0], [0, 1, 0], [-1, 0, 0], [0, -1, 0]],
        "vertices_angleSumLimit": [{ "vertex": 0, "limit": 2.0 }],
        "creases_vertices": [[0, 1], [0, 2]],
        "creases_assignment": ["V", "M"],
        "creases_foldAngles": [0.6, 0.6],
        "creases_foldRates": [1.0, 1.0],
        "faces_vertices": [[0, 4, 1], [0, 1, 2], [0, 2, 3]],
        "faces_creasePath": [[], [0], [0, 1]],
        "solver": { "optimizer": { "algorithm": "ray_search" } }
    }"#;
    let spec = FoldSpecification::from_json(plan).unwrap();
    assert_eq!(spec.solver.optimizer, OptimizerParams::default().with_algorithm(OptimizerKind::RaySearch));

    let mut points = vertices(&spec);
    let mut fold = OrigamiFold::new(&spec, &points).unwrap();
    assert_eq!(fold_to_completion(&mut fold, &mut points, 0.2), 3);

    let angles = fold.get_network().angles();
    assert_abs_diff_eq!(angles[0], 0.6, epsilon = 1e-12);
    assert_abs_diff_eq!(angles[1], -0.6, epsilon = 1e-12);
    assert_rigid(fold.get_network());

    let crease = fold.get_network().get_crease(CreaseIndex(1));
    assert_eq!(crease.get_faces(), &[FaceIndex(2)]);
}

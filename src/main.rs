//! Command-line driver: folds a plan (or a generated pattern) for a number of
//! steps and prints the final state as JSON.

use rigid_folding::optimizer::OptimizerKind;
use rigid_folding::pattern::{Disk, Pattern, SingleCrease};
use rigid_folding::{FoldError, FoldPhase, FoldResult, FoldSpecification, OrigamiFold, VertexData};

use cgmath::{EuclideanSpace, Point3};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;
use std::path::PathBuf;
use tracing::{error, info, warn, Level};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PatternKind {
    SingleCrease,
    Disk,
    Ring,
}

#[derive(Parser)]
#[command(name = "folding")]
#[command(version, about = "Rigid origami folding along planned crease angles")]
struct Cli {
    /// Fold plan (JSON) to simulate.
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// Built-in pattern to fold when no plan is given.
    #[arg(long, value_enum)]
    pattern: Option<PatternKind>,

    /// Target fold angle of generated patterns, in radians.
    #[arg(long, default_value_t = FRAC_PI_2)]
    target: f64,

    /// Number of sectors of the disk and ring patterns.
    #[arg(long, default_value_t = 8)]
    sectors: usize,

    /// Number of integrator steps to run.
    #[arg(short, long, default_value_t = 100)]
    steps: u32,

    /// Simulation time per step.
    #[arg(long, default_value_t = 0.05)]
    dt: f64,

    /// Optimization strategy (compass_search, ray_search); overrides the plan.
    #[arg(long)]
    optimizer: Option<OptimizerKind>,

    /// Print the fold plan instead of folding it.
    #[arg(long)]
    emit_plan: bool,

    /// Log every step.
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Serialize)]
struct Snapshot {
    title: String,
    phase: FoldPhase,
    steps: u64,
    time: f64,
    angles: Vec<f64>,
    positions: Vec<[f64; 3]>,

    #[serde(skip_serializing_if = "Option::is_none")]
    stopped: Option<String>,
}

fn load(cli: &Cli) -> FoldResult<FoldSpecification> {
    let mut spec = match &cli.plan {
        Some(path) => FoldSpecification::from_file(path)?,
        None => match cli.pattern.unwrap_or(PatternKind::SingleCrease) {
            PatternKind::SingleCrease => SingleCrease::new(1.0, cli.target, 1.0).generate(),
            PatternKind::Disk => Disk::new(cli.sectors, 1.0, cli.target, 1.0).generate(),
            PatternKind::Ring => Disk::ring(cli.sectors, 1.0, 0.4, cli.target, 1.0).generate(),
        },
    };

    if let Some(kind) = cli.optimizer {
        spec.solver.optimizer.algorithm = kind;
    }
    Ok(spec)
}

/// The plan's vertices followed by the centroid of every face.
fn sample_points(spec: &FoldSpecification) -> Vec<VertexData> {
    let vertex = |v: &[f64; 3]| Point3::new(v[0], v[1], v[2]);

    let mut points: Vec<VertexData> = spec
        .vertices
        .iter()
        .map(|v| VertexData::new(vertex(v)))
        .collect();

    for face in spec.faces.iter() {
        let corners: Vec<Point3<f64>> = face
            .iter()
            .filter_map(|&v| spec.vertices.get(v))
            .map(vertex)
            .collect();
        if !corners.is_empty() {
            points.push(VertexData::new(Point3::centroid(&corners)));
        }
    }
    points
}

fn run(cli: &Cli) -> FoldResult<()> {
    let spec = load(cli)?;
    if cli.emit_plan {
        println!("{}", spec.to_json()?);
        return Ok(());
    }

    let mut points = sample_points(&spec);
    let mut fold = OrigamiFold::new(&spec, &points)?;

    let mut stopped: Option<FoldError> = None;
    for step in 1..=cli.steps {
        let time = f64::from(step) * cli.dt;
        match fold.preprocess(&mut points, time) {
            Ok(phase) => {
                fold.postprocess(&mut points)?;
                if phase == FoldPhase::Exhausted {
                    info!(step, "fold complete");
                    break;
                }
            }
            Err(e) if e.is_recoverable() => {
                warn!(step, error = %e, "stopping early");
                stopped = Some(e);
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let snapshot = Snapshot {
        title: spec.frame_title.clone(),
        phase: fold.get_solver().phase(),
        steps: fold.get_solver().steps(),
        time: fold.last_time(),
        angles: fold.get_network().angles(),
        positions: points
            .iter()
            .map(|p| [p.position.x, p.position.y, p.position.z])
            .collect(),
        stopped: stopped.map(|e| e.to_string()),
    };
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    if let Err(e) = run(&cli) {
        error!(error = %e, "folding failed");
        std::process::exit(1);
    }
}

//! Orient randomly signed normals on a sampled sphere
//!
//! Samples points on a (slightly noisy) sphere, assigns each its outward
//! normal with a random sign, runs the orientation pipeline and reports
//! whether every normal ended up on the same side of the surface.

use std::time::Instant;

use anyhow::{ensure, Result};
use clap::{Parser, ValueEnum};
use normalcrate_algorithms::{
    compute_distances, orient_normals, DistanceBackend, OrientationConfig, SpanningTreeAlgorithm,
};
use normalcrate_core::{Point3f, Vector3f};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    Exact,
    Indexed,
}

impl From<Backend> for DistanceBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Exact => DistanceBackend::Exact,
            Backend::Indexed => DistanceBackend::Indexed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Tree {
    Kruskal,
    Prim,
}

impl From<Tree> for SpanningTreeAlgorithm {
    fn from(tree: Tree) -> Self {
        match tree {
            Tree::Kruskal => SpanningTreeAlgorithm::Kruskal,
            Tree::Prim => SpanningTreeAlgorithm::Prim,
        }
    }
}

/// Consistent normal orientation on a synthetic sphere.
#[derive(Parser, Debug)]
#[command(name = "orient-sphere")]
struct Args {
    /// Number of sampled points.
    #[arg(long, default_value_t = 3000)]
    points: usize,

    /// Neighbours per point in the k-NN graph.
    #[arg(short, long, default_value_t = 10)]
    k: usize,

    /// Neighbourhood search backend.
    #[arg(long, value_enum, default_value_t = Backend::Indexed)]
    backend: Backend,

    /// Spanning tree algorithm.
    #[arg(long, value_enum, default_value_t = Tree::Kruskal)]
    tree: Tree,

    /// Index of the point whose normal is trusted.
    #[arg(long, default_value_t = 0)]
    root: usize,

    /// Radial noise added to every sample.
    #[arg(long, default_value_t = 0.01)]
    noise: f32,

    /// Seed for sampling and sign scrambling.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Also time both distance matrix backends (quadratic memory).
    #[arg(long)]
    compare_distances: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn sample_sphere(args: &Args, rng: &mut StdRng) -> (Vec<Point3f>, Vec<Vector3f>) {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let n = args.points;

    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f32 + 0.5) / n as f32;
            let r = (1.0 - z * z).sqrt();
            let theta = golden_angle * i as f32;
            let normal = Vector3f::new(r * theta.cos(), r * theta.sin(), z);
            let radius = 1.0 + rng.gen_range(-1.0..=1.0) * args.noise;
            (Point3f::from(normal * radius), normal)
        })
        .unzip()
}

fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    ensure!(args.points > 0, "--points must be positive");

    let mut rng = StdRng::seed_from_u64(args.seed);
    let (points, outward) = sample_sphere(&args, &mut rng);
    let mut normals: Vec<Vector3f> = outward
        .iter()
        .map(|n| if rng.gen_bool(0.5) { -*n } else { *n })
        .collect();

    let inward_before = normals.iter().zip(&outward).filter(|(n, o)| n.dot(o) < 0.0).count();
    info!(points = points.len(), inward = inward_before, "sampled sphere with scrambled normals");

    if args.compare_distances {
        for backend in [DistanceBackend::Exact, DistanceBackend::Indexed] {
            let start = Instant::now();
            let matrix = compute_distances(&points, backend);
            info!(?backend, size = matrix.len(), elapsed = ?start.elapsed(), "distance matrix");
        }
    }

    let config = OrientationConfig::default()
        .with_k_neighbors(args.k)
        .with_backend(args.backend.into())
        .with_spanning_tree(args.tree.into())
        .with_root(args.root);

    let start = Instant::now();
    let report = orient_normals(&points, &mut normals, &config)?;
    info!(elapsed = ?start.elapsed(), ?report, "oriented normals");

    let inward_after = normals.iter().zip(&outward).filter(|(n, o)| n.dot(o) < 0.0).count();
    let consistent = inward_after == 0 || inward_after == normals.len();

    println!("points:        {}", report.points);
    println!("graph edges:   {}", report.graph_edges);
    println!("tree edges:    {}", report.tree_edges);
    println!("components:    {}", report.components);
    println!("flipped:       {}", report.flipped);
    println!("inward before: {}", inward_before);
    println!("inward after:  {}", inward_after);
    println!("consistent:    {}", consistent);

    Ok(())
}

use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use tracer3d_core::{
    to_fill, write_to, BidirectionalEngine, CancelToken, Coord, CostOracle, DenseVolume,
    EngineConfig, EuclideanHeuristic, InvertedIntensityCost, ReciprocalIntensityCost,
    SliceBackend, UnidirectionalEngine,
};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Path,
    Fill,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Metric {
    Reciprocal,
    Inverted,
}

#[derive(Parser, Debug)]
#[command(name = "tracer3d-cli", version, about = "Exercise the tracer3d-core search engine against a raw f32 volume")]
struct Args {
    /// Path to a raw little-endian f32 volume, row-major within each z slice
    #[arg(long, value_name = "PATH")]
    volume: PathBuf,

    #[arg(long)]
    width: usize,
    #[arg(long)]
    height: usize,
    #[arg(long)]
    depth: usize,

    /// "x,y,z"
    #[arg(long, value_parser = parse_coord)]
    start: Coord,
    /// "x,y,z"; required unless --mode fill
    #[arg(long, value_parser = parse_coord)]
    goal: Option<Coord>,

    #[arg(long, value_enum, default_value_t = Mode::Path)]
    mode: Mode,

    #[arg(long, value_enum, default_value_t = Metric::Inverted)]
    metric: Metric,

    /// Required when --mode fill
    #[arg(long)]
    threshold: Option<f64>,

    #[arg(long, default_value_t = 1.0)]
    spacing_x: f64,
    #[arg(long, default_value_t = 1.0)]
    spacing_y: f64,
    #[arg(long, default_value_t = 1.0)]
    spacing_z: f64,
    #[arg(long, default_value = "voxel")]
    units: String,

    #[arg(long, value_enum, default_value_t = BackendArg::Hash)]
    backend: BackendArg,

    #[arg(long, value_name = "PATH")]
    out: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    Array,
    Hash,
    Sorted,
}

impl From<BackendArg> for SliceBackend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Array => SliceBackend::Array,
            BackendArg::Hash => SliceBackend::Hash,
            BackendArg::Sorted => SliceBackend::Sorted,
        }
    }
}

fn parse_coord(s: &str) -> Result<Coord, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(format!("expected \"x,y,z\", got {s:?}"));
    }
    let mut coord = [0i32; 3];
    for (i, p) in parts.iter().enumerate() {
        coord[i] = p.trim().parse().map_err(|_| format!("not an integer: {p:?}"))?;
    }
    Ok(coord)
}

fn load_volume(path: &PathBuf, width: usize, height: usize, depth: usize) -> Result<DenseVolume> {
    let mut bytes = Vec::new();
    File::open(path).with_context(|| format!("opening {path:?}"))?.read_to_end(&mut bytes)?;
    let expected = width * height * depth * 4;
    anyhow::ensure!(bytes.len() == expected, "volume file is {} bytes, expected {expected}", bytes.len());
    let data: Vec<f64> = bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64).collect();
    Ok(DenseVolume::new(width, height, depth, data))
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_ansi(false).json().finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();
    info!(?args, "starting tracer3d-cli");

    let volume = load_volume(&args.volume, args.width, args.height, args.depth)?;
    let spacing = (args.spacing_x, args.spacing_y, args.spacing_z);
    let config = EngineConfig { spacing_x: spacing.0, spacing_y: spacing.1, spacing_z: spacing.2, units: args.units.clone(), backend: args.backend.into(), ..EngineConfig::default() };

    let out = File::create(&args.out).with_context(|| format!("creating {:?}", args.out))?;

    match args.mode {
        Mode::Path => {
            let goal = args.goal.context("--goal is required in path mode")?;
            let path = match args.metric {
                Metric::Reciprocal => {
                    let cost = ReciprocalIntensityCost::new(&volume, 255.0);
                    let heuristic = EuclideanHeuristic::new(spacing);
                    let mut engine = BidirectionalEngine::new(&volume, cost, heuristic, config);
                    engine
                        .find_path(args.start, goal, CancelToken::new(), None)
                        .map(|p| p.as_deref().map(|path| engine.physical_path(path)))
                }
                Metric::Inverted => {
                    let cost = InvertedIntensityCost::new(&volume, 255.0, 0.01);
                    let heuristic = EuclideanHeuristic::new(spacing);
                    let mut engine = BidirectionalEngine::new(&volume, cost, heuristic, config);
                    engine
                        .find_path(args.start, goal, CancelToken::new(), None)
                        .map(|p| p.as_deref().map(|path| engine.physical_path(path)))
                }
            };
            match path {
                Ok(Some(physical)) => {
                    info!(len = physical.points.len(), "path found");
                    serde_json::to_writer_pretty(BufWriter::new(out), &physical)?;
                }
                Ok(None) => {
                    info!("no path found");
                    anyhow::bail!("no path exists between the requested endpoints");
                }
                Err(e) => {
                    error!(error = %e, "find_path failed");
                    return Err(e.into());
                }
            }
        }
        Mode::Fill => {
            let threshold = args.threshold.context("--threshold is required in fill mode")?;
            let record = match args.metric {
                Metric::Reciprocal => {
                    let cost = ReciprocalIntensityCost::new(&volume, 255.0);
                    let metric_tag = cost.metric_tag();
                    let heuristic = EuclideanHeuristic::new(spacing);
                    let mut engine = UnidirectionalEngine::new(&volume, cost, heuristic, config);
                    engine.fill(args.start, threshold, CancelToken::new(), None)?;
                    to_fill(engine.voxel_map(), metric_tag, threshold, spacing, &args.units)?
                }
                Metric::Inverted => {
                    let cost = InvertedIntensityCost::new(&volume, 255.0, 0.01);
                    let metric_tag = cost.metric_tag();
                    let heuristic = EuclideanHeuristic::new(spacing);
                    let mut engine = UnidirectionalEngine::new(&volume, cost, heuristic, config);
                    engine.fill(args.start, threshold, CancelToken::new(), None)?;
                    to_fill(engine.voxel_map(), metric_tag, threshold, spacing, &args.units)?
                }
            };
            info!(entries = record.entries.len(), "fill computed");
            write_to(&record, BufWriter::new(out))?;
        }
    }

    Ok(())
}

//! Example: flatten the projections of a centred disk phantom.
//!
//! Builds a synthetic curved-detector sinogram of a uniform disk, flattens
//! it and reports the width of the disk shadow in the first row before and
//! after resampling.
//!
//! Run from the workspace root:
//!   cargo run -p flat-detector --example phantom -- --help
//!   cargo run -p flat-detector --example phantom

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use flat_detector::{CurvedDetector, Execution, Volume, flatten_detector_with};
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Flatten a synthetic disk phantom sinogram")]
struct Args {
    /// Curved detector columns.
    #[arg(long, default_value_t = 384)]
    num_detectors: usize,

    /// Detector rows per projection.
    #[arg(long, default_value_t = 16)]
    num_rows: usize,

    /// Number of projections.
    #[arg(long, default_value_t = 90)]
    num_proj: usize,

    /// Source-to-detector distance in mm.
    #[arg(long, default_value_t = 1100.0)]
    dsd: f64,

    /// Detector angular span in radians.
    #[arg(long, default_value_t = 0.8)]
    arclength: f64,

    /// Disk radius in mm, centred halfway to the detector.
    #[arg(long, default_value_t = 150.0)]
    radius: f64,

    /// Run the kernel on the calling thread only.
    #[arg(long)]
    sequential: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    let geometry = CurvedDetector::new(args.dsd, args.arclength);
    let proj = disk_sinogram(&args, &geometry).context("building phantom sinogram")?;

    let exec = if args.sequential {
        Execution::Sequential
    } else {
        Execution::Parallel
    };

    let start = Instant::now();
    let flat = flatten_detector_with(&proj.as_view(), &geometry, exec)
        .context("flattening phantom sinogram")?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

    let curved_width = shadow_width(proj.as_view().row(0, 0));
    let flat_width = shadow_width(flat.as_view().row(0, 0));

    info!(
        num_proj = args.num_proj,
        num_rows = args.num_rows,
        orig_num_detectors = args.num_detectors,
        num_cols = flat.num_cols(),
        elapsed_ms,
        "flattened phantom"
    );
    println!("curved shadow width: {curved_width} columns");
    println!("flat shadow width:   {flat_width} columns");

    Ok(())
}

/// Chord length through a disk of `radius` at distance `dsd / 2` from the
/// source, for every curved column. Identical for every projection and row.
fn disk_sinogram(args: &Args, geometry: &CurvedDetector) -> Result<Volume<f32>> {
    let n = args.num_detectors;
    let pixel = geometry.pixel_arclength(n);
    let centre_dist = args.dsd / 2.0;

    let row: Vec<f32> = (0..n)
        .map(|d| {
            let gamma = (d as f64 + 0.5) * pixel - args.arclength / 2.0;
            let miss = centre_dist * gamma.sin();
            if miss.abs() >= args.radius {
                0.0
            } else {
                (2.0 * (args.radius * args.radius - miss * miss).sqrt()) as f32
            }
        })
        .collect();

    let lines = args.num_proj * args.num_rows;
    let data = row.iter().copied().cycle().take(lines * n).collect();
    Ok(Volume::from_vec(args.num_proj, args.num_rows, n, data)?)
}

fn shadow_width(row: &[f32]) -> usize {
    row.iter().filter(|&&v| v > 0.0).count()
}

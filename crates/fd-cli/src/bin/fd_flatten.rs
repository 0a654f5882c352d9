use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use fd_core::{Volume, VolumeView};
use fd_geom::{CurvedDetector, flatten_detector_with};
use fd_kernel::Execution;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fd_flatten")]
#[command(about = "Resample curved-detector projection stacks onto a flat detector")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Flatten a raw little-endian f32 projection volume.
    #[command(name = "flatten")]
    Flatten(FlattenArgs),
    /// Write the normalized-angle table for a detector as CSV.
    #[command(name = "angles")]
    Angles(AnglesArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct GeometryArgs {
    /// Source-to-detector distance in mm.
    #[arg(long)]
    dsd: Option<f64>,
    /// Angular span of the curved detector in radians.
    #[arg(long)]
    arclength: Option<f64>,
    /// Flat-detector oversampling factor.
    #[arg(long)]
    oversample: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
struct FlattenArgs {
    /// JSON job file; command-line flags override its fields.
    #[arg(long)]
    job: Option<PathBuf>,
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
    /// Input extents as `num_proj,num_rows,num_detectors`.
    #[arg(long, value_delimiter = ',')]
    shape: Option<Vec<usize>>,
    #[command(flatten)]
    geometry: GeometryArgs,
    /// Worker threads; defaults to all available cores.
    #[arg(long)]
    threads: Option<usize>,
    /// Optional PNG preview of the first flattened projection.
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Run metadata JSON; defaults to `<output>.meta.json`.
    #[arg(long)]
    meta: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct AnglesArgs {
    /// Number of curved detector columns.
    #[arg(long)]
    num_detectors: usize,
    #[command(flatten)]
    geometry: GeometryArgs,
    /// CSV destination; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

/// A fully resolved job; built from an optional JSON file plus flags.
#[derive(Debug, Clone, PartialEq)]
struct FlattenJob {
    input: PathBuf,
    output: PathBuf,
    shape: [usize; 3],
    geometry: CurvedDetector,
    threads: Option<usize>,
    preview: Option<PathBuf>,
    meta: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialJob {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    shape: Option<[usize; 3]>,
    geometry: Option<PartialGeometry>,
    threads: Option<usize>,
    preview: Option<PathBuf>,
    meta: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PartialGeometry {
    dsd: Option<f64>,
    arclength: Option<f64>,
    oversample: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
struct MetaFlatten {
    input: PathBuf,
    output: PathBuf,
    input_shape: [usize; 3],
    output_shape: [usize; 3],
    geometry: CurvedDetector,
    threads: Option<usize>,
    elapsed_ms: f64,
    layout: &'static str,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Flatten(args) => run_flatten(args),
        Command::Angles(args) => run_angles(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_flatten(args: FlattenArgs) -> Result<()> {
    let base = match &args.job {
        Some(path) => {
            ensure_file_exists(path, "job")?;
            read_json(path)?
        }
        None => PartialJob::default(),
    };
    let job = resolve_job(base, &args)?;
    debug!(?job, "resolved flatten job");
    check_distinct_paths(&job, args.job.as_deref())?;

    ensure_file_exists(&job.input, "input")?;
    let [num_proj, num_rows, num_detectors] = job.shape;
    let data = read_raw_f32(&job.input)?;
    let proj = VolumeView::from_slice(num_proj, num_rows, num_detectors, &data).with_context(
        || {
            format!(
                "input {} does not hold a {num_proj}x{num_rows}x{num_detectors} f32 volume",
                job.input.display()
            )
        },
    )?;

    let exec = match job.threads {
        Some(n) => Execution::Threads(n),
        None => Execution::Parallel,
    };

    let start = Instant::now();
    let out = flatten_detector_with(&proj, &job.geometry, exec)
        .with_context(|| format!("flattening {}", job.input.display()))?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;

    info!(
        num_proj,
        num_rows,
        orig_num_detectors = num_detectors,
        num_cols = out.num_cols(),
        elapsed_ms,
        "flattened projection stack"
    );

    create_parent_dir(&job.output)?;
    write_raw_f32(&job.output, out.data())?;

    if let Some(preview) = &job.preview {
        create_parent_dir(preview)?;
        save_preview(preview, &out)?;
    }

    create_parent_dir(&job.meta)?;
    write_json(
        &job.meta,
        &MetaFlatten {
            input: job.input.clone(),
            output: job.output.clone(),
            input_shape: job.shape,
            output_shape: [out.num_proj(), out.num_rows(), out.num_cols()],
            geometry: job.geometry,
            threads: job.threads,
            elapsed_ms,
            layout: "row-major [projection][row][column], little-endian f32",
        },
    )?;

    Ok(())
}

fn run_angles(args: AnglesArgs) -> Result<()> {
    let geometry = resolve_geometry(None, &args.geometry)?;
    let angles = geometry
        .normalized_angles(args.num_detectors)
        .context("computing normalized angles")?;
    info!(
        orig_num_detectors = args.num_detectors,
        num_cols = angles.len(),
        "computed normalized angle table"
    );

    match &args.out {
        Some(path) => {
            let mut file =
                fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(&mut file, &angles)
        }
        None => write_csv(&mut std::io::stdout().lock(), &angles),
    }
}

fn resolve_job(base: PartialJob, args: &FlattenArgs) -> Result<FlattenJob> {
    let input = args
        .input
        .clone()
        .or(base.input)
        .context("missing input path (--input or job.input)")?;
    let output = args
        .output
        .clone()
        .or(base.output)
        .context("missing output path (--output or job.output)")?;

    let shape = match &args.shape {
        Some(dims) => {
            let Ok(shape) = <[usize; 3]>::try_from(dims.as_slice()) else {
                bail!(
                    "--shape expects num_proj,num_rows,num_detectors, got {} values.",
                    dims.len()
                );
            };
            shape
        }
        None => base
            .shape
            .context("missing volume shape (--shape or job.shape)")?,
    };

    let geometry = resolve_geometry(base.geometry, &args.geometry)?;
    let meta = args
        .meta
        .clone()
        .or(base.meta)
        .unwrap_or_else(|| default_meta_path(&output));

    Ok(FlattenJob {
        input,
        output,
        shape,
        geometry,
        threads: args.threads.or(base.threads),
        preview: args.preview.clone().or(base.preview),
        meta,
    })
}

/// `<output>.meta.json`, keeping the full output file name.
fn default_meta_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// Refuses jobs where one written file would replace another file the run
/// reads or writes.
fn check_distinct_paths(job: &FlattenJob, job_file: Option<&Path>) -> Result<()> {
    let mut taken: Vec<(&str, &Path)> = vec![("input", job.input.as_path())];
    if let Some(path) = job_file {
        taken.push(("job", path));
    }

    let mut written: Vec<(&str, &Path)> = vec![
        ("output", job.output.as_path()),
        ("meta", job.meta.as_path()),
    ];
    if let Some(path) = &job.preview {
        written.push(("preview", path.as_path()));
    }

    for (what, path) in written {
        if let Some((other, _)) = taken.iter().find(|(_, p)| same_file(path, p)) {
            bail!(
                "{what} path {} is also the {other} path; pass a different --{what}.",
                path.display()
            );
        }
        taken.push((what, path));
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (absolute_path(a), absolute_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Canonical form of `path`, resolving only the parent when the file itself
/// does not exist yet.
fn absolute_path(path: &Path) -> Option<PathBuf> {
    if let Ok(path) = fs::canonicalize(path) {
        return Some(path);
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Some(fs::canonicalize(parent).ok()?.join(path.file_name()?))
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    Ok(())
}

fn resolve_geometry(base: Option<PartialGeometry>, args: &GeometryArgs) -> Result<CurvedDetector> {
    let base = base.unwrap_or_default();
    let dsd = args
        .dsd
        .or(base.dsd)
        .context("missing source-to-detector distance (--dsd)")?;
    let arclength = args
        .arclength
        .or(base.arclength)
        .context("missing detector arclength (--arclength)")?;
    let oversample = args.oversample.or(base.oversample).unwrap_or(1);

    let geometry = CurvedDetector::new(dsd, arclength).with_oversample(oversample);
    geometry.validate().context("validating detector geometry")?;
    Ok(geometry)
}

fn read_raw_f32(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.len() % 4 != 0 {
        bail!(
            "{} is {} bytes, not a whole number of f32 samples.",
            path.display(),
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn write_raw_f32(path: &Path, values: &[f32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn save_preview(path: &Path, vol: &Volume<f32>) -> Result<()> {
    if vol.is_empty() {
        bail!("cannot render a preview of an empty volume.");
    }
    let frame = vol.as_view().frame(0);
    let gray = GrayImage::from_raw(
        vol.num_cols() as u32,
        vol.num_rows() as u32,
        f32_to_u8_vis(frame),
    )
    .context("constructing GrayImage from flattened frame")?;
    gray.save(path)
        .with_context(|| format!("saving preview {}", path.display()))
}

/// Min/max scales samples to 8-bit; non-finite samples render black.
fn f32_to_u8_vis(data: &[f32]) -> Vec<u8> {
    let mut min_v = f32::INFINITY;
    let mut max_v = f32::NEG_INFINITY;
    for &v in data.iter().filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }

    if !(max_v - min_v).is_finite() || (max_v - min_v).abs() < 1e-12 {
        return vec![0u8; data.len()];
    }

    let scale = 255.0 / (max_v - min_v);
    data.iter()
        .map(|&v| {
            if v.is_finite() {
                ((v - min_v) * scale).round().clamp(0.0, 255.0) as u8
            } else {
                0
            }
        })
        .collect()
}

fn write_json(path: &Path, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing json {}", path.display()))
}

fn write_csv(writer: &mut impl Write, values: &[f64]) -> Result<()> {
    writeln!(writer, "column,normalized_angle").context("writing csv header")?;
    for (i, v) in values.iter().enumerate() {
        writeln!(writer, "{i},{v}").context("writing csv row")?;
    }
    Ok(())
}

fn ensure_file_exists(path: &Path, what: &str) -> Result<()> {
    if !path.exists() {
        bail!("{} file does not exist: {}", what, path.display());
    }
    if !path.is_file() {
        bail!("{} path is not a file: {}", what, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use fd_core::VolumeView;
    use fd_geom::{CurvedDetector, flatten_detector};
    use tempfile::tempdir;

    use super::{
        FlattenArgs, GeometryArgs, PartialGeometry, PartialJob, f32_to_u8_vis, read_raw_f32,
        resolve_job, run_flatten, write_csv,
    };

    const SHAPE: [usize; 3] = [2, 3, 8];

    fn geometry_args() -> GeometryArgs {
        GeometryArgs {
            dsd: Some(1000.0),
            arclength: Some(0.5),
            oversample: None,
        }
    }

    fn sample_projections() -> Vec<f32> {
        (0..SHAPE.iter().product::<usize>())
            .map(|i| ((i * 13) % 29) as f32 * 0.25 - 3.0)
            .collect()
    }

    fn write_le_f32(path: &Path, values: &[f32]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        fs::write(path, bytes).expect("write test input");
    }

    fn read_le_f32(path: &Path) -> Vec<f32> {
        fs::read(path)
            .expect("read test output")
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect()
    }

    fn flatten_args(input: &Path, output: &Path) -> FlattenArgs {
        FlattenArgs {
            input: Some(input.to_path_buf()),
            output: Some(output.to_path_buf()),
            shape: Some(SHAPE.to_vec()),
            geometry: geometry_args(),
            ..FlattenArgs::default()
        }
    }

    #[test]
    fn flatten_command_writes_volume_and_metadata() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("proj.f32");
        let output = dir.path().join("flat").join("proj_flat.f32");
        let proj = sample_projections();
        write_le_f32(&input, &proj);

        run_flatten(flatten_args(&input, &output)).expect("flatten run");

        let view = VolumeView::from_slice(SHAPE[0], SHAPE[1], SHAPE[2], &proj).expect("view");
        let geometry = CurvedDetector::new(1000.0, 0.5);
        let expected = flatten_detector(&view, &geometry).expect("in-process flatten");

        let written = read_le_f32(&output);
        let bits = |v: &[f32]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(written.as_slice()), bits(expected.data()));

        let meta_path = dir.path().join("flat").join("proj_flat.f32.meta.json");
        let meta: serde_json::Value =
            serde_json::from_slice(&fs::read(&meta_path).expect("meta written"))
                .expect("meta json");
        assert_eq!(
            meta["output_shape"],
            serde_json::json!([SHAPE[0], SHAPE[1], expected.num_cols()])
        );
        assert_eq!(meta["input_shape"], serde_json::json!(SHAPE));
    }

    #[test]
    fn read_raw_rejects_partial_samples() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("short.f32");
        fs::write(&path, [0u8; 7]).expect("write");

        let err = read_raw_f32(&path).unwrap_err();
        assert!(err.to_string().contains("not a whole number of f32 samples"));

        fs::write(&path, 1.5f32.to_le_bytes()).expect("write");
        assert_eq!(read_raw_f32(&path).expect("one sample"), vec![1.5]);
    }

    #[test]
    fn json_output_name_keeps_volume_and_metadata_apart() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("proj.f32");
        let output = dir.path().join("x.json");
        let proj = sample_projections();
        write_le_f32(&input, &proj);

        run_flatten(flatten_args(&input, &output)).expect("flatten run");

        let written = read_le_f32(&output);
        assert_eq!(written.len() % (SHAPE[0] * SHAPE[1]), 0);
        assert!(!written.is_empty());
        assert!(dir.path().join("x.json.meta.json").is_file());
    }

    #[test]
    fn metadata_path_may_not_replace_job_input_or_output() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("proj.f32");
        let output = dir.path().join("run.f32");
        write_le_f32(&input, &sample_projections());

        let clash_output = FlattenArgs {
            meta: Some(output.clone()),
            ..flatten_args(&input, &output)
        };
        let err = run_flatten(clash_output).unwrap_err();
        assert!(err.to_string().contains("--meta"), "{err}");
        assert!(!output.exists());

        let clash_input = FlattenArgs {
            meta: Some(input.clone()),
            ..flatten_args(&input, &output)
        };
        assert!(run_flatten(clash_input).is_err());
        assert_eq!(read_le_f32(&input), sample_projections());

        let job = dir.path().join("run.json");
        let job_text = format!(
            r#"{{
                "input": {input:?},
                "output": {output:?},
                "shape": [2, 3, 8],
                "geometry": {{ "dsd": 1000.0, "arclength": 0.5 }},
                "meta": {job:?}
            }}"#
        );
        fs::write(&job, &job_text).expect("write job");
        let from_job = FlattenArgs {
            job: Some(job.clone()),
            ..FlattenArgs::default()
        };
        assert!(run_flatten(from_job).is_err());
        assert_eq!(fs::read_to_string(&job).expect("job kept"), job_text);
    }

    #[test]
    fn job_file_survives_a_run_it_describes() {
        let dir = tempdir().expect("temp dir");
        let input = dir.path().join("proj.f32");
        let output = dir.path().join("run.f32");
        write_le_f32(&input, &sample_projections());

        let job = dir.path().join("run.json");
        let job_text = format!(
            r#"{{
                "input": {input:?},
                "output": {output:?},
                "shape": [2, 3, 8],
                "geometry": {{ "dsd": 1000.0, "arclength": 0.5 }}
            }}"#
        );
        fs::write(&job, &job_text).expect("write job");
        let args = FlattenArgs {
            job: Some(job.clone()),
            ..FlattenArgs::default()
        };

        run_flatten(args.clone()).expect("first run");
        run_flatten(args).expect("rerun from the same job file");
        assert_eq!(fs::read_to_string(&job).expect("job kept"), job_text);
        assert!(dir.path().join("run.f32.meta.json").is_file());
    }

    #[test]
    fn flags_override_job_file() {
        let base: PartialJob = serde_json::from_str(
            r#"{
                "input": "in.f32",
                "output": "out.f32",
                "shape": [2, 3, 4],
                "geometry": { "dsd": 1000.0, "arclength": 0.5 },
                "threads": 4
            }"#,
        )
        .expect("valid job json");

        let args = FlattenArgs {
            output: Some(PathBuf::from("elsewhere.f32")),
            geometry: GeometryArgs {
                oversample: Some(2),
                ..GeometryArgs::default()
            },
            ..FlattenArgs::default()
        };

        let job = resolve_job(base, &args).expect("complete job");
        assert_eq!(job.input, PathBuf::from("in.f32"));
        assert_eq!(job.output, PathBuf::from("elsewhere.f32"));
        assert_eq!(job.shape, [2, 3, 4]);
        assert_eq!(
            job.geometry,
            CurvedDetector::new(1000.0, 0.5).with_oversample(2)
        );
        assert_eq!(job.threads, Some(4));
        assert_eq!(job.preview, None);
        assert_eq!(job.meta, PathBuf::from("elsewhere.f32.meta.json"));
    }

    #[test]
    fn incomplete_jobs_are_rejected() {
        let args = FlattenArgs {
            input: Some(PathBuf::from("in.f32")),
            output: Some(PathBuf::from("out.f32")),
            shape: Some(vec![1, 2]),
            ..FlattenArgs::default()
        };
        let err = resolve_job(PartialJob::default(), &args).unwrap_err();
        assert!(err.to_string().contains("--shape"));

        let args = FlattenArgs {
            shape: Some(vec![1, 2, 3]),
            ..args
        };
        let err = resolve_job(PartialJob::default(), &args).unwrap_err();
        assert!(err.to_string().contains("--dsd"));

        let base = PartialJob {
            geometry: Some(PartialGeometry {
                dsd: Some(1000.0),
                arclength: Some(4.0),
                oversample: None,
            }),
            ..PartialJob::default()
        };
        assert!(resolve_job(base, &args).is_err());
    }

    #[test]
    fn preview_scaling_spans_full_range() {
        assert_eq!(f32_to_u8_vis(&[1.0, 2.0, 3.0]), vec![0, 128, 255]);
        assert_eq!(f32_to_u8_vis(&[5.0, 5.0]), vec![0, 0]);
        assert_eq!(f32_to_u8_vis(&[0.0, f32::NAN, 1.0]), vec![0, 0, 255]);
    }

    #[test]
    fn csv_lists_one_row_per_column() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[0.5, 1.25]).expect("in-memory write");
        assert_eq!(
            String::from_utf8(buf).expect("utf8"),
            "column,normalized_angle\n0,0.5\n1,1.25\n"
        );
    }
}

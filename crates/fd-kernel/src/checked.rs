use fd_core::{Dims3, Error, Volume, VolumeView, VolumeViewMut};

use crate::flatten::{flatten, flatten_seq};

/// How the `(projection, row)` fan-out is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// Global rayon pool, sized to the available hardware threads.
    #[default]
    Parallel,
    /// Calling thread only.
    Sequential,
    /// Dedicated pool with this many workers; `0` picks rayon's default.
    Threads(usize),
}

pub fn flatten_volume(
    proj: &VolumeView<'_, f32>,
    normalized_angles: &[f64],
    out: &mut VolumeViewMut<'_, f32>,
) -> Result<(), Error> {
    flatten_volume_with(proj, normalized_angles, out, Execution::Parallel)
}

pub fn flatten_volume_with(
    proj: &VolumeView<'_, f32>,
    normalized_angles: &[f64],
    out: &mut VolumeViewMut<'_, f32>,
    exec: Execution,
) -> Result<(), Error> {
    validate_shapes(proj.dims(), normalized_angles.len(), out.dims())?;

    let Dims3 {
        num_proj,
        num_rows,
        num_cols: orig_num_detectors,
    } = proj.dims();
    let num_cols = normalized_angles.len();
    let src = proj.as_slice();
    let dst = out.as_slice_mut();

    match exec {
        Execution::Parallel => flatten(
            src,
            normalized_angles,
            dst,
            num_proj,
            num_rows,
            orig_num_detectors,
            num_cols,
        ),
        Execution::Sequential => flatten_seq(
            src,
            normalized_angles,
            dst,
            num_proj,
            num_rows,
            orig_num_detectors,
            num_cols,
        ),
        Execution::Threads(threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            pool.install(|| {
                flatten(
                    src,
                    normalized_angles,
                    dst,
                    num_proj,
                    num_rows,
                    orig_num_detectors,
                    num_cols,
                )
            });
        }
    }

    Ok(())
}

/// Allocates a `num_proj × num_rows × normalized_angles.len()` volume and
/// fills it from `proj`.
pub fn flatten_to_volume(
    proj: &VolumeView<'_, f32>,
    normalized_angles: &[f64],
) -> Result<Volume<f32>, Error> {
    flatten_to_volume_with(proj, normalized_angles, Execution::Parallel)
}

pub fn flatten_to_volume_with(
    proj: &VolumeView<'_, f32>,
    normalized_angles: &[f64],
    exec: Execution,
) -> Result<Volume<f32>, Error> {
    let dims = Dims3::new(proj.num_proj(), proj.num_rows(), normalized_angles.len());
    let len = dims.try_len()?;

    let mut out = Volume::from_vec(
        dims.num_proj,
        dims.num_rows,
        dims.num_cols,
        vec![0.0f32; len],
    )?;
    flatten_volume_with(proj, normalized_angles, &mut out.as_view_mut(), exec)?;
    Ok(out)
}

fn validate_shapes(proj: Dims3, num_angles: usize, out: Dims3) -> Result<(), Error> {
    if out.num_proj != proj.num_proj {
        return Err(Error::ShapeMismatch {
            what: "projection count",
            expected: proj.num_proj,
            actual: out.num_proj,
        });
    }
    if out.num_rows != proj.num_rows {
        return Err(Error::ShapeMismatch {
            what: "detector row count",
            expected: proj.num_rows,
            actual: out.num_rows,
        });
    }
    if out.num_cols != num_angles {
        return Err(Error::ShapeMismatch {
            what: "flat column count",
            expected: num_angles,
            actual: out.num_cols,
        });
    }
    if proj.num_cols == 0 && num_angles > 0 {
        return Err(Error::EmptyDetector);
    }
    Ok(())
}

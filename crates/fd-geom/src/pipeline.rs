use fd_core::{Error, Volume, VolumeView};
use fd_kernel::{Execution, flatten_to_volume_with};
use tracing::{debug, debug_span};

use crate::geometry::CurvedDetector;

/// Flattens a curved-detector projection stack using the global rayon pool.
pub fn flatten_detector(
    proj: &VolumeView<'_, f32>,
    geometry: &CurvedDetector,
) -> Result<Volume<f32>, Error> {
    flatten_detector_with(proj, geometry, Execution::Parallel)
}

pub fn flatten_detector_with(
    proj: &VolumeView<'_, f32>,
    geometry: &CurvedDetector,
    exec: Execution,
) -> Result<Volume<f32>, Error> {
    let normalized_angles = geometry.normalized_angles(proj.num_cols())?;

    let span = debug_span!(
        "flatten_detector",
        num_proj = proj.num_proj(),
        num_rows = proj.num_rows(),
        orig_num_detectors = proj.num_cols(),
        num_cols = normalized_angles.len()
    );
    let _enter = span.enter();

    debug!(
        dsd = geometry.dsd,
        arclength = geometry.arclength,
        oversample = geometry.oversample,
        ?exec,
        "resampling onto flat detector"
    );

    flatten_to_volume_with(proj, &normalized_angles, exec)
}

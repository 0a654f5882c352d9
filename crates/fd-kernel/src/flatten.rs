use fd_core::{Bracket, bracket, lerp_f32};
use rayon::prelude::*;

/// Resamples every curved-detector row of `proj` onto the flat columns
/// described by `normalized_angles`, writing `out` in place.
///
/// `proj` holds `num_proj * num_rows` rows of `orig_num_detectors` samples;
/// `out` holds the same number of rows of `num_cols` samples. Rows are
/// dispatched across the rayon pool that is current for the calling thread.
///
/// Panics if a buffer is shorter than its extents require, if the extents
/// overflow `usize`, or if the curved detector is empty while there are
/// output samples to write.
pub fn flatten(
    proj: &[f32],
    normalized_angles: &[f64],
    out: &mut [f32],
    num_proj: usize,
    num_rows: usize,
    orig_num_detectors: usize,
    num_cols: usize,
) {
    let Some((src_len, dst_len)) = checked_lens(
        proj,
        normalized_angles,
        out,
        num_proj,
        num_rows,
        orig_num_detectors,
        num_cols,
    ) else {
        return;
    };

    let src = &proj[..src_len];
    let dst = &mut out[..dst_len];
    let angles = &normalized_angles[..num_cols];

    dst.par_chunks_mut(num_cols)
        .zip(src.par_chunks(orig_num_detectors))
        .for_each(|(out_row, proj_row)| flatten_row(proj_row, angles, out_row));
}

/// Single-threaded form of [`flatten`] with identical output.
pub fn flatten_seq(
    proj: &[f32],
    normalized_angles: &[f64],
    out: &mut [f32],
    num_proj: usize,
    num_rows: usize,
    orig_num_detectors: usize,
    num_cols: usize,
) {
    let Some((src_len, dst_len)) = checked_lens(
        proj,
        normalized_angles,
        out,
        num_proj,
        num_rows,
        orig_num_detectors,
        num_cols,
    ) else {
        return;
    };

    let src = &proj[..src_len];
    let dst = &mut out[..dst_len];
    let angles = &normalized_angles[..num_cols];

    for (out_row, proj_row) in dst
        .chunks_exact_mut(num_cols)
        .zip(src.chunks_exact(orig_num_detectors))
    {
        flatten_row(proj_row, angles, out_row);
    }
}

/// Resamples one detector row. `out_row` and `angles` have equal length.
#[inline]
pub fn flatten_row(proj_row: &[f32], angles: &[f64], out_row: &mut [f32]) {
    debug_assert_eq!(out_row.len(), angles.len());
    debug_assert!(!proj_row.is_empty());

    let n = proj_row.len();
    let first = proj_row[0];
    let last = proj_row[n - 1];

    for (o, &x) in out_row.iter_mut().zip(angles) {
        *o = match bracket(x, n) {
            Bracket::Left => first,
            Bracket::Right => last,
            Bracket::Interior { idx, t } => {
                // SAFETY: `Interior` is only produced for `idx + 1 < n`.
                let (v0, v1) = unsafe {
                    (
                        *proj_row.get_unchecked(idx),
                        *proj_row.get_unchecked(idx + 1),
                    )
                };
                lerp_f32(v0, v1, t)
            }
        };
    }
}

/// Returns the `proj` and `out` prefix lengths the kernel touches, or `None`
/// when there is nothing to write.
fn checked_lens(
    proj: &[f32],
    normalized_angles: &[f64],
    out: &[f32],
    num_proj: usize,
    num_rows: usize,
    orig_num_detectors: usize,
    num_cols: usize,
) -> Option<(usize, usize)> {
    let lines = num_proj
        .checked_mul(num_rows)
        .expect("num_proj * num_rows overflows usize");
    if lines == 0 || num_cols == 0 {
        return None;
    }

    assert!(orig_num_detectors > 0, "curved detector must have columns");
    assert!(
        normalized_angles.len() >= num_cols,
        "normalized_angles shorter than num_cols"
    );

    let src_len = lines
        .checked_mul(orig_num_detectors)
        .expect("num_proj * num_rows * orig_num_detectors overflows usize");
    let dst_len = lines
        .checked_mul(num_cols)
        .expect("num_proj * num_rows * num_cols overflows usize");
    assert!(
        proj.len() >= src_len,
        "proj shorter than num_proj * num_rows * orig_num_detectors"
    );
    assert!(
        out.len() >= dst_len,
        "out shorter than num_proj * num_rows * num_cols"
    );

    Some((src_len, dst_len))
}

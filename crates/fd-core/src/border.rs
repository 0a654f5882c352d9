/// Where a fractional detector position lands on a row of `n` columns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bracket {
    /// Left of column 0; clamps to the first sample.
    Left,
    /// At or past column `n - 1`; clamps to the last sample.
    Right,
    /// Between columns `idx` and `idx + 1`, at fraction `t` from `idx`.
    Interior { idx: usize, t: f64 },
}

/// Resolves position `x` against a row of `n` columns.
///
/// The left test runs first, so a detector with a single column maps every
/// non-negative position to `Right`. Positions are never extrapolated.
/// NaN counts as left of column 0, like the most negative index.
#[inline]
pub fn bracket(x: f64, n: usize) -> Bracket {
    // Saturating cast: +-inf land on the matching edge.
    let idx = x.floor() as i64;
    let t = x - idx as f64;

    if idx < 0 || x.is_nan() {
        return Bracket::Left;
    }

    let idx = idx as u64;
    if idx.saturating_add(1) >= n as u64 {
        return Bracket::Right;
    }

    Bracket::Interior {
        idx: idx as usize,
        t,
    }
}

/// Blends two single-precision samples in double precision.
#[inline]
pub fn lerp_f32(v0: f32, v1: f32, t: f64) -> f32 {
    ((1.0 - t) * v0 as f64 + t * v1 as f64) as f32
}

/// Samples `row` at fractional column `x` with clamped edges.
///
/// Panics if `row` is empty.
#[inline]
pub fn sample_linear_clamped(row: &[f32], x: f64) -> f32 {
    assert!(!row.is_empty(), "cannot sample an empty detector row");
    match bracket(x, row.len()) {
        Bracket::Left => row[0],
        Bracket::Right => row[row.len() - 1],
        Bracket::Interior { idx, t } => lerp_f32(row[idx], row[idx + 1], t),
    }
}

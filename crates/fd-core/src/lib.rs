//! Foundational primitives for curved-to-flat detector resampling.
//!
//! ## Volume Layout
//! Projection stacks are dense `[projection][row][column]` volumes stored
//! row-major. A detector row is contiguous, so the row stride equals the
//! column count and the frame stride equals `num_rows * num_cols`. Views are
//! always contiguous; there is no padded-stride form.
//!
//! ## Edge Policy
//! Fractional positions are resolved against a detector row with a strict
//! clamp: positions left of column 0 take the first sample, positions at or
//! past the last column take the last sample. Nothing is extrapolated.
//!
//! ## Precision
//! Positions and blend weights are `f64`; samples are stored as `f32` and
//! widened for the blend, then narrowed once on write.

mod border;
mod error;
mod volume;

pub use border::{Bracket, bracket, lerp_f32, sample_linear_clamped};
pub use error::Error;
pub use volume::{Dims3, Volume, VolumeView, VolumeViewMut, to_f32_u16};

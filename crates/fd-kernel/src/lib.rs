//! Curved-to-flat detector interpolation kernel.
//!
//! Each flat-detector column `j` has a precomputed position
//! `normalized_angles[j]` expressed as a fractional curved-detector column.
//! Every `(projection, row)` line is resampled with the same table:
//!
//! - position left of column 0: first curved sample;
//! - position at or past the last column: last curved sample;
//! - otherwise: linear blend of the two bracketing samples, computed in
//!   `f64` and narrowed to `f32`.
//!
//! Lines are independent and write disjoint output rows, so they are
//! fanned out over rayon without synchronization. Parallel and sequential
//! execution produce bit-identical output.
//!
//! [`flatten`] is the raw slice entry point and only asserts buffer lengths.
//! [`flatten_volume`] and [`flatten_to_volume`] validate extents against
//! `fd-core` volume views and report mismatches as [`fd_core::Error`].

mod checked;
mod flatten;

pub use checked::{
    Execution, flatten_to_volume, flatten_to_volume_with, flatten_volume, flatten_volume_with,
};
pub use flatten::{flatten, flatten_row, flatten_seq};

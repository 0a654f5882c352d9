//! Curved detector geometry and the flattening pipeline built on it.
//!
//! [`CurvedDetector`] derives the normalized-angle table consumed by
//! `fd-kernel`: each flat column sits on a plane tangent to the detector
//! arc, its ray angle is expressed in curved-pixel units and offset so that
//! the left detector edge is position `0`.
//!
//! Flat columns are spaced at the projected pitch of the central curved
//! pixel divided by `oversample`, and span the projected width of the whole
//! arc. The flat column count therefore depends on the geometry and is
//! usually a little larger than the curved column count.

mod geometry;
mod pipeline;

pub use geometry::CurvedDetector;
pub use pipeline::{flatten_detector, flatten_detector_with};

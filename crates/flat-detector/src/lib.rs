//! Umbrella crate for the `flat-detector` workspace.
//!
//! Re-exports the volume containers, the interpolation kernel and the
//! curved detector geometry so pipelines can depend on a single crate.

pub use fd_core::*;
pub use fd_geom::*;
pub use fd_kernel::*;

use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    SizeMismatch {
        expected: usize,
        actual: usize,
    },
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// Volume extents whose element count does not fit in `usize`.
    SizeOverflow {
        num_proj: usize,
        num_rows: usize,
        num_cols: usize,
    },
    EmptyDetector,
    InvalidGeometry(&'static str),
    ThreadPool(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            Self::ShapeMismatch {
                what,
                expected,
                actual,
            } => write!(f, "{what} mismatch: expected {expected}, got {actual}"),
            Self::SizeOverflow {
                num_proj,
                num_rows,
                num_cols,
            } => write!(
                f,
                "volume extents {num_proj}x{num_rows}x{num_cols} overflow usize"
            ),
            Self::EmptyDetector => write!(f, "curved detector has no columns"),
            Self::InvalidGeometry(reason) => write!(f, "invalid detector geometry: {reason}"),
            Self::ThreadPool(msg) => write!(f, "failed to build thread pool: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

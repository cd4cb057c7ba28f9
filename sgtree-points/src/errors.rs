//! The errors that can occur when building or querying a `Point`/`PointMatrix`.
use std::error::Error;
use std::fmt;

/// Helper type for a call that could go wrong.
pub type PointsResult<T> = Result<T, PointsError>;

/// Error type for `sgtree-points`.
#[derive(Debug, Clone, PartialEq)]
pub enum PointsError {
    /// Two points (or a point and a matrix row) were compared but had different dimension.
    DimensionMismatch {
        /// Dimension the caller expected.
        expected: usize,
        /// Dimension actually found.
        found: usize,
    },
    /// A `PointMatrix` was built from a slice whose length isn't a multiple of its row width.
    RaggedMatrix {
        /// Total number of scalars passed in.
        len: usize,
        /// Row width (dimension) requested.
        dim: usize,
    },
    /// A row index was out of bounds for a `PointMatrix`.
    RowOutOfBounds {
        /// The row requested.
        row: usize,
        /// The number of rows available.
        rows: usize,
    },
}

impl fmt::Display for PointsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PointsError::DimensionMismatch { expected, found } => write!(
                f,
                "dimension mismatch: expected {}, found {}",
                expected, found
            ),
            PointsError::RaggedMatrix { len, dim } => write!(
                f,
                "{} scalars do not divide evenly into rows of width {}",
                len, dim
            ),
            PointsError::RowOutOfBounds { row, rows } => {
                write!(f, "row {} is out of bounds, matrix has {} rows", row, rows)
            }
        }
    }
}

impl Error for PointsError {}

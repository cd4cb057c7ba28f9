#![allow(dead_code)]
#![warn(missing_docs)]

//! # sgtree-points
//! The point and metric primitives consumed by `sgtree`. This crate is deliberately small: a
//! fixed-dimension real vector, a metric trait with an L2 implementation, and a row-major matrix
//! view for bulk tree construction. No file loading, no dataset management, no label tracking —
//! those concerns belong to a caller, not to the index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod errors;
pub use errors::{PointsError, PointsResult};

/// The scalar type used throughout the tree: a real-valued, uniform-precision number.
pub type Scalar = f64;

/// A fixed-dimension vector of `Scalar`. Cloning a `Point` is a refcount bump, not a copy, since
/// points are shared between a node and every query result that references it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point(Arc<[Scalar]>);

impl Point {
    /// Builds a point from an owned vector of scalars.
    pub fn new(values: Vec<Scalar>) -> Self {
        Point(values.into())
    }

    /// The dimension of this point.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrowed access to the underlying scalars.
    pub fn as_slice(&self) -> &[Scalar] {
        &self.0
    }
}

impl From<Vec<Scalar>> for Point {
    fn from(values: Vec<Scalar>) -> Self {
        Point::new(values)
    }
}

impl<'a> From<&'a [Scalar]> for Point {
    fn from(values: &'a [Scalar]) -> Self {
        Point(values.into())
    }
}

/// A distance function between two points of the same dimension. Kept as a trait, rather than a
/// free function, so a caller could plug in a different metric without touching the tree's
/// control flow — only `L2` is provided here, per the Non-goal on approximate metrics.
pub trait Metric: Send + Sync {
    /// The distance between `x` and `y`. Undefined if `x.len() != y.len()`.
    fn dist(x: &[Scalar], y: &[Scalar]) -> Scalar;
}

/// Euclidean (L2) distance.
#[derive(Debug, Clone, Copy)]
pub struct L2;

impl Metric for L2 {
    #[inline]
    fn dist(x: &[Scalar], y: &[Scalar]) -> Scalar {
        sq_l2(x, y).sqrt()
    }
}

/// The squared L2 distance, useful when only relative ordering matters and the sqrt can be
/// skipped.
#[inline]
pub fn sq_l2(x: &[Scalar], y: &[Scalar]) -> Scalar {
    x.iter()
        .zip(y)
        .map(|(xi, yi)| (xi - yi) * (xi - yi))
        .fold(0.0, |acc, v| acc + v)
}

/// The L2 norm of a single vector (distance to the origin).
#[inline]
pub fn l2_norm(x: &[Scalar]) -> Scalar {
    x.iter().map(|xi| xi * xi).fold(0.0, |acc, v| acc + v).sqrt()
}

/// A row-major dense matrix view used for bulk tree construction: `rows` points of dimension
/// `dim`, stored contiguously.
#[derive(Debug, Clone)]
pub struct PointMatrix {
    data: Arc<[Scalar]>,
    dim: usize,
}

impl PointMatrix {
    /// Builds a matrix view over `data`, which must have a length that is a multiple of `dim`.
    pub fn new(data: Vec<Scalar>, dim: usize) -> PointsResult<Self> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(PointsError::RaggedMatrix {
                len: data.len(),
                dim,
            });
        }
        Ok(PointMatrix {
            data: data.into(),
            dim,
        })
    }

    /// The number of rows (points) in the matrix.
    pub fn rows(&self) -> usize {
        self.data.len() / self.dim
    }

    /// The dimension of each row.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Borrows row `i` as a slice.
    pub fn row(&self, i: usize) -> PointsResult<&[Scalar]> {
        let rows = self.rows();
        if i >= rows {
            return Err(PointsError::RowOutOfBounds { row: i, rows });
        }
        Ok(&self.data[i * self.dim..(i + 1) * self.dim])
    }

    /// Clones row `i` out into an owned `Point`.
    pub fn point(&self, i: usize) -> PointsResult<Point> {
        self.row(i).map(Point::from)
    }

    /// An iterator over `(row_index, Point)` for every row after row 0 — the rows a bulk build
    /// inserts once the root has been seeded from row 0.
    pub fn tail_points(&self) -> impl Iterator<Item = (usize, Point)> + '_ {
        (1..self.rows()).map(move |i| (i, self.point(i).expect("index in bounds")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn l2_distance_basic() {
        let a = Point::new(vec![0.0, 0.0]);
        let b = Point::new(vec![3.0, 4.0]);
        assert_approx_eq!(L2::dist(a.as_slice(), b.as_slice()), 5.0);
    }

    #[test]
    fn l2_distance_zero_for_identical_points() {
        let a = Point::new(vec![1.0, -2.0, 3.5]);
        assert_approx_eq!(L2::dist(a.as_slice(), a.as_slice()), 0.0);
    }

    #[test]
    fn matrix_rejects_ragged_data() {
        let err = PointMatrix::new(vec![1.0, 2.0, 3.0], 2).unwrap_err();
        assert_eq!(err, PointsError::RaggedMatrix { len: 3, dim: 2 });
    }

    #[test]
    fn matrix_rows_and_tail() {
        let m = PointMatrix::new(vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0], 2).unwrap();
        assert_eq!(m.rows(), 3);
        let tail: Vec<_> = m.tail_points().collect();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].0, 1);
        assert_eq!(tail[0].1.as_slice(), &[1.0, 0.0]);
    }

    #[test]
    fn row_out_of_bounds() {
        let m = PointMatrix::new(vec![0.0, 0.0], 2).unwrap();
        assert!(m.row(5).is_err());
    }
}

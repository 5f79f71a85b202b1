//! Row-major task-gradient matrix.
//!
//! Row `i` is the gradient of task `i` with respect to the shared parameters,
//! flattened to `cols` entries. Every row has the same length.

use alloc::vec::Vec;

use crate::error::{PcGradError, Result};
use crate::scalar::Real;

/// Dense `rows × cols` matrix stored row-major.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "RawMatrix<T>",
        bound(deserialize = "T: Real + serde::Deserialize<'de>")
    )
)]
pub struct Matrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawMatrix<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

#[cfg(feature = "serde")]
impl<T: Real> TryFrom<RawMatrix<T>> for Matrix<T> {
    type Error = PcGradError;

    fn try_from(raw: RawMatrix<T>) -> Result<Self> {
        Self::new(raw.rows, raw.cols, raw.data)
    }
}

impl<T: Real> Matrix<T> {
    /// Wrap a row-major buffer.
    ///
    /// Fails with [`PcGradError::BufferLength`] if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<T>) -> Result<Self> {
        if rows.checked_mul(cols) != Some(data.len()) {
            return Err(PcGradError::BufferLength {
                expected: rows.saturating_mul(cols),
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a slice of equally sized rows.
    ///
    /// ```
    /// use pcgrad_core::Matrix;
    ///
    /// let j = Matrix::from_rows(&[[-4.0_f64, 1.0, 1.0], [6.0, 1.0, 1.0]]).unwrap();
    /// assert_eq!((j.rows(), j.cols()), (2, 3));
    /// ```
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(PcGradError::shape("rows of equal length", rows.len(), row.len()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Number of task gradients.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Parameter dimensionality of every gradient.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `i`.
    ///
    /// # Panics
    /// If `i >= self.rows()`.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over the rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        // chunks_exact(0) panics; an empty-column matrix still has `rows` empty rows.
        let cols = self.cols;
        (0..self.rows).map(move |i| &self.data[i * cols..(i + 1) * cols])
    }

    /// The underlying row-major buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Consume into the row-major buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

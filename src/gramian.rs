//! Gramian of the task gradients: the only input the weighting engine reads.
//!
//! `G[i, j] = ⟨g_i, g_j⟩`. Once a [`Gramian`] exists it is known to be
//!
//! - square with at least one row,
//! - finite everywhere,
//! - non-negative on the diagonal (squared norms),
//! - symmetric up to a relative tolerance.
//!
//! The engine relies on all four and does not re-check them.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{PcGradError, Result};
use crate::matrix::Matrix;
use crate::scalar::Real;

/// Relative tolerance used by [`Gramian::new`] when checking symmetry.
pub const DEFAULT_SYMMETRY_TOLERANCE: f64 = 1e-6;

/// Validated N×N symmetric matrix of pairwise inner products.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(
        try_from = "RawGramian<T>",
        bound(deserialize = "T: Real + serde::Deserialize<'de>")
    )
)]
pub struct Gramian<T> {
    dim: usize,
    data: Vec<T>,
}

/// Unvalidated wire form; deserialisation goes through [`Gramian::new`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawGramian<T> {
    dim: usize,
    data: Vec<T>,
}

#[cfg(feature = "serde")]
impl<T: Real> TryFrom<RawGramian<T>> for Gramian<T> {
    type Error = PcGradError;

    fn try_from(raw: RawGramian<T>) -> Result<Self> {
        Self::new(raw.dim, raw.data)
    }
}

impl<T: Real> Gramian<T> {
    /// Validate and wrap a row-major `dim × dim` buffer.
    pub fn new(dim: usize, data: Vec<T>) -> Result<Self> {
        Self::with_tolerance(dim, data, DEFAULT_SYMMETRY_TOLERANCE)
    }

    /// As [`Gramian::new`], with an explicit relative symmetry tolerance.
    ///
    /// `G[i, j]` and `G[j, i]` are accepted when
    /// `|G[i, j] − G[j, i]| ≤ tolerance × max(1, |G[i, j]|, |G[j, i]|)`.
    pub fn with_tolerance(dim: usize, data: Vec<T>, tolerance: f64) -> Result<Self> {
        if dim == 0 {
            return Err(PcGradError::Empty);
        }
        if dim.checked_mul(dim) != Some(data.len()) {
            return Err(PcGradError::BufferLength {
                expected: dim.saturating_mul(dim),
                actual: data.len(),
            });
        }
        validate(dim, &data, tolerance)?;
        Ok(Self { dim, data })
    }

    /// Build from a slice of rows, which must form a square matrix.
    pub fn from_rows<R: AsRef<[T]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.len();
        let mut data = Vec::with_capacity(dim * dim);
        for row in rows {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(PcGradError::shape("square gramian", dim, row.len()));
            }
            data.extend_from_slice(row);
        }
        Self::new(dim, data)
    }

    /// Number of task gradients N.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// `G[i, j]`.
    ///
    /// # Panics
    /// If either index is out of range.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> T {
        self.data[i * self.dim + j]
    }

    /// Row `j`: inner products of gradient `j` with every gradient.
    #[inline]
    pub fn row(&self, j: usize) -> &[T] {
        &self.data[j * self.dim..(j + 1) * self.dim]
    }

    /// Squared norm of gradient `j`.
    #[inline]
    pub fn squared_norm(&self, j: usize) -> T {
        self.get(j, j)
    }

    /// `true` when no pair of task gradients conflicts.
    pub fn is_conflict_free(&self) -> bool {
        self.data.iter().all(|&g| g >= T::ZERO)
    }

    /// Row-major buffer.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Convert every entry to another precision.
    ///
    /// Narrowing can overflow: an entry that does not fit `U` fails with
    /// [`PcGradError::GramianOverflow`]. Symmetry and diagonal signs survive
    /// rounding, so only finiteness is re-checked.
    pub fn to_precision<U: Real>(&self) -> Result<Gramian<U>> {
        let mut data = Vec::with_capacity(self.data.len());
        for (k, &g) in self.data.iter().enumerate() {
            let converted = U::from_f64(g.to_f64());
            if !converted.is_finite() {
                return Err(PcGradError::GramianOverflow {
                    row: k / self.dim,
                    col: k % self.dim,
                });
            }
            data.push(converted);
        }
        Ok(Gramian { dim: self.dim, data })
    }

    /// Exact widening to `f64`; every `Real` fits.
    pub(crate) fn widened(&self) -> Gramian<f64> {
        Gramian {
            dim: self.dim,
            data: self.data.iter().map(|&g| g.to_f64()).collect(),
        }
    }
}

/// Compute the Gramian of the rows of `matrix`.
///
/// Only the upper triangle is computed and then mirrored, so the result is
/// exactly symmetric. Products are accumulated in `f64` whatever `T` is; an
/// inner product that does not fit `T` fails with
/// [`PcGradError::GramianOverflow`].
///
/// ```
/// use pcgrad_core::{compute_gramian, Matrix};
///
/// let j = Matrix::from_rows(&[[-4.0_f64, 1.0, 1.0], [6.0, 1.0, 1.0]]).unwrap();
/// let g = compute_gramian(&j).unwrap();
/// assert_eq!(g.as_slice(), &[18.0, -22.0, -22.0, 38.0]);
/// ```
pub fn compute_gramian<T: Real>(matrix: &Matrix<T>) -> Result<Gramian<T>> {
    let m = matrix.rows();
    if m == 0 {
        return Err(PcGradError::Empty);
    }
    for (row, values) in matrix.iter_rows().enumerate() {
        if let Some(col) = values.iter().position(|v| !v.is_finite()) {
            return Err(PcGradError::NonFiniteInput { row, col });
        }
    }

    let mut data = vec![T::ZERO; m * m];
    for i in 0..m {
        let gi = matrix.row(i);
        for j in i..m {
            let gj = matrix.row(j);
            let dot: f64 = gi
                .iter()
                .zip(gj.iter())
                .map(|(&a, &b)| a.to_f64() * b.to_f64())
                .sum();
            let dot = T::from_f64(dot);
            if !dot.is_finite() {
                return Err(PcGradError::GramianOverflow { row: i, col: j });
            }
            data[i * m + j] = dot;
            data[j * m + i] = dot;
        }
    }

    Gramian::new(m, data)
}

pub(crate) fn validate<T: Real>(dim: usize, data: &[T], tolerance: f64) -> Result<()> {
    for i in 0..dim {
        for j in 0..dim {
            if !data[i * dim + j].is_finite() {
                return Err(PcGradError::NonFiniteInput { row: i, col: j });
            }
        }
    }
    for i in 0..dim {
        if data[i * dim + i] < T::ZERO {
            return Err(PcGradError::NegativeDiagonal { index: i });
        }
        for j in (i + 1)..dim {
            let a = data[i * dim + j].to_f64();
            let b = data[j * dim + i].to_f64();
            let scale = 1.0_f64.max(a.magnitude()).max(b.magnitude());
            if (a - b).magnitude() > tolerance * scale {
                return Err(PcGradError::NotSymmetric { row: i, col: j });
            }
        }
    }
    Ok(())
}

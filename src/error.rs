//! Error taxonomy for Gramian validation, weighting, and aggregation.
//!
//! Every fallible operation in the crate returns [`Result`]. Nothing is
//! retried or recovered locally: a failed call leaves no state behind, so the
//! caller decides what to do.

use thiserror::Error;

/// Errors raised by the PCGrad pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PcGradError {
    /// A matrix, Gramian, or weight vector has inconsistent dimensions.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    Shape {
        /// Human-readable description of the expected shape.
        expected: &'static str,
        /// Human-readable description of what was supplied.
        actual: ShapeDesc,
    },

    /// A flat buffer does not hold the number of entries its dimensions imply.
    #[error("buffer length mismatch: expected {expected} entries, got {actual}")]
    BufferLength {
        /// Entries implied by the declared dimensions.
        expected: usize,
        /// Entries actually supplied.
        actual: usize,
    },

    /// Zero task gradients were supplied.
    #[error("at least one task gradient is required")]
    Empty,

    /// `G[row, col]` and `G[col, row]` disagree beyond the symmetry tolerance.
    #[error("gramian is not symmetric at ({row}, {col})")]
    NotSymmetric {
        /// Row index of the offending entry.
        row: usize,
        /// Column index of the offending entry.
        col: usize,
    },

    /// A diagonal (squared-norm) entry is negative.
    #[error("gramian diagonal entry {index} is negative")]
    NegativeDiagonal {
        /// Task index.
        index: usize,
    },

    /// An input entry is NaN or infinite.
    #[error("input entry ({row}, {col}) is not finite")]
    NonFiniteInput {
        /// Row of the offending entry.
        row: usize,
        /// Column of the offending entry.
        col: usize,
    },

    /// The inner product of two finite gradients does not fit the scalar type.
    #[error("inner product of task gradients {row} and {col} overflows")]
    GramianOverflow {
        /// First task index.
        row: usize,
        /// Second task index.
        col: usize,
    },

    /// Task gradient `index` has (near-)zero norm and cannot be projected against.
    #[error("task gradient {index} is degenerate (squared norm {squared_norm:e})")]
    DegenerateGradient {
        /// Task index.
        index: usize,
        /// The offending diagonal value `G[index, index]`.
        squared_norm: f64,
    },

    /// The computed weight for task `index` overflowed or became NaN.
    #[error("weight {index} is not finite")]
    NonFinite {
        /// Task index.
        index: usize,
    },

    /// The aggregator output was fed back into a differentiation pass.
    #[error("{aggregator} is not differentiable; its output cannot be back-propagated through")]
    NonDifferentiable {
        /// Name of the aggregator that rejected the pass.
        aggregator: &'static str,
    },

    /// The permutation source failed to produce a valid permutation.
    #[error("permutation source failed: {0}")]
    PermutationSource(&'static str),
}

/// Row/column pair carried by [`PcGradError::Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeDesc {
    /// Number of rows (or vector length).
    pub rows: usize,
    /// Number of columns (1 for vectors).
    pub cols: usize,
}

impl core::fmt::Display for ShapeDesc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl PcGradError {
    pub(crate) fn shape(expected: &'static str, rows: usize, cols: usize) -> Self {
        Self::Shape {
            expected,
            actual: ShapeDesc { rows, cols },
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, PcGradError>;

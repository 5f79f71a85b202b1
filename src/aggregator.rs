//! The PCGrad aggregator: task-gradient matrix in, combined gradient out.
//!
//! ```text
//! Matrix (M×D) ──compute_gramian──▶ Gramian (M×M) ──weights──▶ w (M) ──combine──▶ w @ J (D)
//! ```
//!
//! [`Weighting`] and [`Aggregator`] are the seams an optimizer integration
//! programs against; [`PcGrad`] implements both.
//!
//! # Differentiation
//!
//! PCGrad's weights are produced by a data-dependent, randomised procedure
//! and are not meant to be differentiated through. [`Aggregator::backward_pre_hook`]
//! is the guard: an autodiff integration must call it before running a
//! backward pass through the aggregator's output, and PCGrad always refuses.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{PcGradError, Result};
use crate::gramian::{compute_gramian, Gramian};
use crate::matrix::Matrix;
use crate::permutation::{PermutationSource, RngPermutations};
use crate::scalar::Real;
use crate::weighting::{PcGradWeighting, WeightingConfig};

// ─── traits ──────────────────────────────────────────────────────────────────

/// Extracts one weight per task gradient.
pub trait Weighting<T: Real> {
    /// Weights computed from a precomputed Gramian.
    fn weights_from_gramian(&mut self, gramian: &Gramian<T>) -> Result<Vec<T>>;

    /// Weights for the rows of `matrix`.
    fn weights(&mut self, matrix: &Matrix<T>) -> Result<Vec<T>> {
        let gramian = compute_gramian(matrix)?;
        self.weights_from_gramian(&gramian)
    }
}

/// Reduces a task-gradient matrix to a single update direction.
pub trait Aggregator<T: Real> {
    /// Combine the rows of `matrix`.
    fn aggregate(&mut self, matrix: &Matrix<T>) -> Result<Vec<T>>;

    /// Called before a backward pass through this aggregator's output.
    ///
    /// The default accepts. Non-differentiable aggregators return
    /// [`PcGradError::NonDifferentiable`].
    fn backward_pre_hook(&self) -> Result<()> {
        Ok(())
    }
}

// ─── combiner ────────────────────────────────────────────────────────────────

/// `weights @ matrix`: the weighted sum of the rows of `matrix`.
///
/// Products are accumulated in `f64`.
pub fn combine<T: Real>(weights: &[T], matrix: &Matrix<T>) -> Result<Vec<T>> {
    if weights.len() != matrix.rows() {
        return Err(PcGradError::shape(
            "one weight per matrix row",
            weights.len(),
            matrix.rows(),
        ));
    }
    let mut acc = vec![0.0_f64; matrix.cols()];
    for (&w, row) in weights.iter().zip(matrix.iter_rows()) {
        let w = w.to_f64();
        for (a, &x) in acc.iter_mut().zip(row.iter()) {
            *a += w * x.to_f64();
        }
    }
    Ok(acc.into_iter().map(T::from_f64).collect())
}

// ─── PcGrad ──────────────────────────────────────────────────────────────────

/// PCGrad aggregator (algorithm 1 of *Gradient Surgery for Multi-Task Learning*).
///
/// Randomness follows the paper rather than the authors' reference code: a
/// fresh ordering is drawn for every task, not one shared shuffle.
///
/// ```
/// use pcgrad_core::{Aggregator, Matrix, PcGrad};
///
/// let j = Matrix::from_rows(&[[-4.0_f64, 1.0, 1.0], [6.0, 1.0, 1.0]]).unwrap();
/// let update = PcGrad::seeded(0).aggregate(&j).unwrap();
/// assert!((update[0] - 0.5848).abs() < 1e-3);
/// assert!((update[1] - 3.8012).abs() < 1e-3);
/// assert!((update[2] - 3.8012).abs() < 1e-3);
/// ```
#[derive(Clone, Debug)]
pub struct PcGrad<P = RngPermutations> {
    engine: PcGradWeighting,
    permutations: P,
}

impl PcGrad<RngPermutations> {
    /// Aggregator with an entropy-seeded permutation source.
    #[cfg(feature = "std")]
    pub fn new() -> Self {
        Self::with_source(RngPermutations::from_entropy())
    }

    /// Aggregator whose permutation sequence is fixed by `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(RngPermutations::seeded(seed))
    }
}

#[cfg(feature = "std")]
impl Default for PcGrad<RngPermutations> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PermutationSource> PcGrad<P> {
    /// Aggregator drawing orderings from `permutations`.
    pub fn with_source(permutations: P) -> Self {
        Self {
            engine: PcGradWeighting::new(),
            permutations,
        }
    }

    /// Replace the engine configuration.
    pub fn with_config(mut self, config: WeightingConfig) -> Self {
        self.engine = PcGradWeighting::with_config(config);
        self
    }

    /// The underlying weighting engine.
    pub fn engine(&self) -> &PcGradWeighting {
        &self.engine
    }

    /// Mutable access to the permutation source, e.g. to reseed between steps.
    pub fn permutations_mut(&mut self) -> &mut P {
        &mut self.permutations
    }

    /// Recover the permutation source.
    pub fn into_source(self) -> P {
        self.permutations
    }
}

impl<T: Real, P: PermutationSource> Weighting<T> for PcGrad<P> {
    fn weights_from_gramian(&mut self, gramian: &Gramian<T>) -> Result<Vec<T>> {
        self.engine.compute_weights(gramian, &mut self.permutations)
    }
}

impl<T: Real, P: PermutationSource> Aggregator<T> for PcGrad<P> {
    fn aggregate(&mut self, matrix: &Matrix<T>) -> Result<Vec<T>> {
        let weights = self.weights(matrix)?;
        log::debug!(
            "pcgrad: aggregated {} task gradients of dimension {}",
            matrix.rows(),
            matrix.cols()
        );
        combine(&weights, matrix)
    }

    fn backward_pre_hook(&self) -> Result<()> {
        Err(PcGradError::NonDifferentiable {
            aggregator: "PCGrad",
        })
    }
}

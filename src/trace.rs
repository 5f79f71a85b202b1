//! Step-by-step record of one weighting run.
//!
//! A [`WeightingTrace`] holds, for every outer index `i`, the ordering that was
//! drawn, each correction applied to the coefficients of `g_i^PC`, and the
//! coefficients it ended with. Tracing does not change the arithmetic: a traced
//! and an untraced run over the same permutations return identical weights.
//!
//! With the `serde` feature the trace is serialisable, e.g. for attaching to a
//! training log:
//!
//! ```rust,ignore
//! let (weights, trace) = engine.compute_weights_traced(&gramian, &mut source)?;
//! let json = serde_json::to_string(&trace)?;
//! ```
//!
//! Values are stored as `f64` regardless of the run's element type.

use alloc::vec::Vec;

use crate::gramian::Gramian;
use crate::scalar::Real;

/// One PCGrad correction: `g_i^PC` conflicted with `g_against` and was projected.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Correction {
    /// Index `j` of the gradient projected against.
    pub against: usize,
    /// `⟨g_i^PC, g_j⟩` before the correction (always negative).
    pub inner_product: f64,
    /// Amount added to coefficient `j` (always positive).
    pub delta: f64,
}

/// Record of a single outer iteration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OuterStep {
    /// Outer index `i`.
    pub index: usize,
    /// Ordering drawn for this iteration, including `i` itself.
    pub permutation: Vec<usize>,
    /// Corrections in the order they were applied.
    pub corrections: Vec<Correction>,
    /// Final coefficients of `g_i^PC` over the original gradients.
    pub coefficients: Vec<f64>,
}

impl OuterStep {
    /// The last gradient `j != i` visited in this iteration.
    ///
    /// `None` when there is only one task.
    pub fn last_processed(&self) -> Option<usize> {
        self.permutation
            .iter()
            .rev()
            .copied()
            .find(|&j| j != self.index)
    }

    /// `⟨g_i^PC, g_j⟩` for the final coefficients, reconstructed from `gramian`.
    pub fn inner_product_with<T: Real>(&self, gramian: &Gramian<T>, j: usize) -> f64 {
        gramian
            .row(j)
            .iter()
            .zip(self.coefficients.iter())
            .map(|(&g, &c)| g.to_f64() * c)
            .sum()
    }
}

/// Full record of one weighting run.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightingTrace {
    /// One entry per outer index, in order.
    pub steps: Vec<OuterStep>,
}

impl WeightingTrace {
    /// Total number of corrections over all outer iterations.
    pub fn total_corrections(&self) -> usize {
        self.steps.iter().map(|s| s.corrections.len()).sum()
    }

    /// Step for outer index `i`.
    pub fn step(&self, i: usize) -> Option<&OuterStep> {
        self.steps.get(i)
    }

    /// Sum of all step coefficients; equals the returned weights (as `f64`).
    pub fn summed_coefficients(&self) -> Vec<f64> {
        let n = self.steps.len();
        let mut total = alloc::vec![0.0; n];
        for step in &self.steps {
            for (t, &c) in total.iter_mut().zip(step.coefficients.iter()) {
                *t += c;
            }
        }
        total
    }
}

// ─── recording hooks ─────────────────────────────────────────────────────────

/// Observer for the weighting loop. The no-op implementation compiles away.
pub(crate) trait Recorder {
    fn begin(&mut self, _index: usize, _permutation: &[usize]) {}
    fn correction(&mut self, _against: usize, _inner_product: f64, _delta: f64) {}
    fn end<T: Real>(&mut self, _coefficients: &[T]) {}
}

/// Records nothing.
pub(crate) struct Silent;

impl Recorder for Silent {}

impl Recorder for WeightingTrace {
    fn begin(&mut self, index: usize, permutation: &[usize]) {
        self.steps.push(OuterStep {
            index,
            permutation: permutation.to_vec(),
            corrections: Vec::new(),
            coefficients: Vec::new(),
        });
    }

    fn correction(&mut self, against: usize, inner_product: f64, delta: f64) {
        if let Some(step) = self.steps.last_mut() {
            step.corrections.push(Correction {
                against,
                inner_product,
                delta,
            });
        }
    }

    fn end<T: Real>(&mut self, coefficients: &[T]) {
        if let Some(step) = self.steps.last_mut() {
            step.coefficients = coefficients.iter().map(|c| c.to_f64()).collect();
        }
    }
}

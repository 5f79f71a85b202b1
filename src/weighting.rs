//! PCGrad weighting engine: Gramian in, per-task weights out.
//!
//! Algorithm 1 of *Gradient Surgery for Multi-Task Learning*, expressed purely
//! in coefficients over the original task gradients. For each task `i`:
//!
//! ```text
//! c ← e_i
//! for j in fresh_random_permutation(0..N), j ≠ i:
//!     p ← Σ_k c[k] · G[j, k]          // ⟨g_i^PC, g_j⟩
//!     if p < 0:
//!         c[j] ← c[j] − p / G[j, j]    // project g_i^PC off g_j
//! w ← w + c
//! ```
//!
//! The returned `w` is the sum over all `i` (not the mean), so that
//! `w @ J = Σ_i g_i^PC`. Each correction costs O(N) because only Gramian
//! entries are read; the D-dimensional gradients are never touched.
//!
//! # Invariants
//!
//! - A fresh permutation is drawn for every outer index; one is never reused
//!   across iterations.
//! - Degenerate (zero-norm) gradients are rejected before any division, so the
//!   error does not depend on which permutations are drawn.
//! - No state survives a call. Scratch buffers are allocated per call and the
//!   `current` buffer is re-zeroed for every outer index.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{PcGradError, Result};
use crate::gramian::Gramian;
use crate::permutation::{is_permutation, PermutationSource};
use crate::scalar::Real;
use crate::trace::{Recorder, Silent, WeightingTrace};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Precision the double loop runs in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComputePrecision {
    /// Run in the Gramian's own element type.
    #[default]
    Native,
    /// Convert the Gramian to `f64` once, run in `f64`, convert the weights back once.
    Double,
}

/// Configuration for [`PcGradWeighting`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeightingConfig {
    /// Squared norms `G[j, j] <= degenerate_epsilon` are rejected with
    /// [`PcGradError::DegenerateGradient`].
    ///
    /// Default `0.0`: only exactly-zero gradients are rejected. A negative
    /// value disables the check; a true Gramian with a zero diagonal entry has
    /// a zero row, which never registers as a conflict, so the division is
    /// then never reached.
    pub degenerate_epsilon: f64,

    /// Default [`ComputePrecision::Native`].
    pub precision: ComputePrecision,
}

impl Default for WeightingConfig {
    fn default() -> Self {
        Self {
            degenerate_epsilon: 0.0,
            precision: ComputePrecision::Native,
        }
    }
}

impl WeightingConfig {
    /// Set [`WeightingConfig::degenerate_epsilon`].
    pub fn with_degenerate_epsilon(mut self, epsilon: f64) -> Self {
        self.degenerate_epsilon = epsilon;
        self
    }

    /// Set [`WeightingConfig::precision`].
    pub fn with_precision(mut self, precision: ComputePrecision) -> Self {
        self.precision = precision;
        self
    }
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Computes PCGrad weights from a Gramian.
///
/// The engine itself is immutable and stateless between calls; randomness is
/// supplied per call through a [`PermutationSource`].
///
/// ```
/// use pcgrad_core::{Gramian, PcGradWeighting, RngPermutations};
///
/// let g = Gramian::from_rows(&[[18.0_f64, -22.0], [-22.0, 38.0]]).unwrap();
/// let w = PcGradWeighting::new()
///     .compute_weights(&g, &mut RngPermutations::seeded(0))
///     .unwrap();
/// assert!((w[0] - (1.0 + 22.0 / 18.0)).abs() < 1e-12);
/// assert!((w[1] - (1.0 + 22.0 / 38.0)).abs() < 1e-12);
/// ```
#[derive(Clone, Debug, Default)]
pub struct PcGradWeighting {
    config: WeightingConfig,
}

impl PcGradWeighting {
    /// Engine with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine with an explicit configuration.
    pub fn with_config(config: WeightingConfig) -> Self {
        Self { config }
    }

    /// Current configuration.
    pub fn config(&self) -> &WeightingConfig {
        &self.config
    }

    /// Compute the weight vector for `gramian`.
    ///
    /// Draws exactly `gramian.dim()` permutations from `permutations`, one per
    /// outer index, in index order.
    pub fn compute_weights<T, P>(&self, gramian: &Gramian<T>, permutations: &mut P) -> Result<Vec<T>>
    where
        T: Real,
        P: PermutationSource + ?Sized,
    {
        self.dispatch(gramian, permutations, &mut Silent)
    }

    /// As [`PcGradWeighting::compute_weights`], also returning a [`WeightingTrace`].
    pub fn compute_weights_traced<T, P>(
        &self,
        gramian: &Gramian<T>,
        permutations: &mut P,
    ) -> Result<(Vec<T>, WeightingTrace)>
    where
        T: Real,
        P: PermutationSource + ?Sized,
    {
        let mut trace = WeightingTrace::default();
        let weights = self.dispatch(gramian, permutations, &mut trace)?;
        Ok((weights, trace))
    }

    fn dispatch<T, P, R>(&self, gramian: &Gramian<T>, permutations: &mut P, recorder: &mut R) -> Result<Vec<T>>
    where
        T: Real,
        P: PermutationSource + ?Sized,
        R: Recorder,
    {
        match self.config.precision {
            ComputePrecision::Native => self.run(gramian, permutations, recorder),
            ComputePrecision::Double => {
                let widened = gramian.widened();
                let weights = self.run(&widened, permutations, recorder)?;
                let narrowed: Vec<T> = weights.into_iter().map(T::from_f64).collect();
                check_finite(&narrowed)?;
                Ok(narrowed)
            }
        }
    }

    fn run<T, P, R>(&self, gramian: &Gramian<T>, permutations: &mut P, recorder: &mut R) -> Result<Vec<T>>
    where
        T: Real,
        P: PermutationSource + ?Sized,
        R: Recorder,
    {
        let n = gramian.dim();
        check_degenerate(gramian, n, self.config.degenerate_epsilon)?;

        let mut weights = vec![T::ZERO; n];
        let mut current = vec![T::ZERO; n];
        let mut permutation = vec![0usize; n];
        let mut seen = vec![false; n];
        let mut corrections = 0usize;

        for i in 0..n {
            draw_permutation(permutations, &mut permutation, &mut seen)?;
            recorder.begin(i, &permutation);
            corrections += project_outer(gramian, i, &permutation, &mut current, recorder);
            recorder.end(&current);
            accumulate(&mut weights, &current);
        }

        check_finite(&weights)?;
        log::debug!("pcgrad: weighted {} tasks with {} corrections", n, corrections);
        Ok(weights)
    }
}

// ─── shared loop pieces (also used by the fixed-capacity path) ───────────────

/// Row access over anything shaped like a Gramian.
pub(crate) trait GramRows<T> {
    fn gram_row(&self, j: usize) -> &[T];
}

impl<T: Real> GramRows<T> for Gramian<T> {
    #[inline]
    fn gram_row(&self, j: usize) -> &[T] {
        self.row(j)
    }
}

impl<T: Real, const N: usize> GramRows<T> for [[T; N]; N] {
    #[inline]
    fn gram_row(&self, j: usize) -> &[T] {
        &self[j]
    }
}

/// Fail fast on any squared norm at or below `epsilon`.
pub(crate) fn check_degenerate<T: Real, G: GramRows<T> + ?Sized>(
    gramian: &G,
    n: usize,
    epsilon: f64,
) -> Result<()> {
    for j in 0..n {
        let squared_norm = gramian.gram_row(j)[j].to_f64();
        if squared_norm <= epsilon {
            log::warn!("pcgrad: task gradient {} is degenerate ({:e})", j, squared_norm);
            return Err(PcGradError::DegenerateGradient { index: j, squared_norm });
        }
    }
    Ok(())
}

/// Fill `out` from `source` and reject anything that is not a permutation.
pub(crate) fn draw_permutation<P: PermutationSource + ?Sized>(
    source: &mut P,
    out: &mut [usize],
    seen: &mut [bool],
) -> Result<()> {
    source.fill_permutation(out)?;
    seen.fill(false);
    if !is_permutation(out, seen) {
        return Err(PcGradError::PermutationSource(
            "source returned an invalid permutation",
        ));
    }
    Ok(())
}

/// One outer iteration: leaves the coefficients of `g_i^PC` in `current`.
///
/// Returns the number of corrections applied.
pub(crate) fn project_outer<T, G, R>(
    gramian: &G,
    i: usize,
    permutation: &[usize],
    current: &mut [T],
    recorder: &mut R,
) -> usize
where
    T: Real,
    G: GramRows<T> + ?Sized,
    R: Recorder,
{
    current.fill(T::ZERO);
    current[i] = T::ONE;

    let mut corrections = 0;
    for &j in permutation {
        if j == i {
            continue;
        }
        let row_j = gramian.gram_row(j);
        let inner_product = dot(row_j, current);
        if inner_product < T::ZERO {
            let step = inner_product / row_j[j];
            current[j] -= step;
            corrections += 1;
            recorder.correction(j, inner_product.to_f64(), (-step).to_f64());
            log::trace!("pcgrad: g_{} conflicts with g_{} ({}), coefficient += {}", i, j, inner_product, -step);
        }
    }
    corrections
}

#[inline]
pub(crate) fn dot<T: Real>(a: &[T], b: &[T]) -> T {
    let mut acc = T::ZERO;
    for (&x, &y) in a.iter().zip(b.iter()) {
        acc += x * y;
    }
    acc
}

#[inline]
pub(crate) fn accumulate<T: Real>(weights: &mut [T], current: &[T]) {
    for (w, &c) in weights.iter_mut().zip(current.iter()) {
        *w += c;
    }
}

pub(crate) fn check_finite<T: Real>(weights: &[T]) -> Result<()> {
    match weights.iter().position(|w| !w.is_finite()) {
        Some(index) => Err(PcGradError::NonFinite { index }),
        None => Ok(()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permutation::{FixedPermutations, IdentityPermutations, RngPermutations};

    fn assert_close(actual: &[f64], expected: &[f64], tol: f64) {
        assert_eq!(actual.len(), expected.len());
        for (k, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            assert!(
                (a - e).abs() < tol,
                "weight {}: got {}, expected {} (±{})",
                k,
                a,
                e,
                tol
            );
        }
    }

    #[test]
    fn engine_exposes_its_config() {
        assert_eq!(PcGradWeighting::new().config(), &WeightingConfig::default());
        let config = WeightingConfig::default()
            .with_degenerate_epsilon(1e-6)
            .with_precision(ComputePrecision::Double);
        let engine = PcGradWeighting::with_config(config);
        assert_eq!(engine.config().degenerate_epsilon, 1e-6);
        assert_eq!(engine.config().precision, ComputePrecision::Double);
    }

    #[test]
    fn single_task_weight_is_one() {
        let g = Gramian::from_rows(&[[3.5_f64]]).unwrap();
        for seed in 0..5 {
            let w = PcGradWeighting::new()
                .compute_weights(&g, &mut RngPermutations::seeded(seed))
                .unwrap();
            assert_eq!(w, vec![1.0]);
        }
    }

    #[test]
    fn no_conflicts_gives_all_ones() {
        let g = Gramian::from_rows(&[[2.0_f64, 0.5, 0.0], [0.5, 1.0, 0.1], [0.0, 0.1, 4.0]]).unwrap();
        let w = PcGradWeighting::new()
            .compute_weights(&g, &mut IdentityPermutations)
            .unwrap();
        assert_eq!(w, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn two_tasks_closed_form() {
        let (a, b, c) = (18.0_f64, 38.0, -22.0);
        let g = Gramian::from_rows(&[[a, c], [c, b]]).unwrap();
        let w = PcGradWeighting::new()
            .compute_weights(&g, &mut RngPermutations::seeded(11))
            .unwrap();
        assert_close(&w, &[1.0 - c / a, 1.0 - c / b], 1e-12);
    }

    #[test]
    fn three_tasks_hand_computed_with_fixed_orders() {
        // g0 = (1, 0), g1 = (-1, 1), g2 = (0, -1)
        let g = Gramian::from_rows(&[
            [1.0_f64, -1.0, 0.0],
            [-1.0, 2.0, -1.0],
            [0.0, -1.0, 1.0],
        ])
        .unwrap();
        let mut orders = FixedPermutations::new(vec![
            vec![1, 2, 0],
            vec![0, 2, 1],
            vec![0, 1, 2],
        ])
        .unwrap();
        let (w, trace) = PcGradWeighting::new()
            .compute_weights_traced(&g, &mut orders)
            .unwrap();

        // i = 0: vs g1: p = -1 → c1 += 1/2 → c = (1, .5, 0)
        //        vs g2: p = 0·1 + .5·(-1) + 0 = -.5 → c2 += .5 → c = (1, .5, .5)
        // i = 1: vs g0: p = -1 → c0 += 1 → c = (1, 1, 0)
        //        vs g2: p = 0 - 1 + 0 = -1 → c2 += 1 → c = (1, 1, 1)
        // i = 2: vs g0: p = 0 → skip; vs g1: p = -1 → c1 += .5 → c = (0, .5, 1)
        assert_close(&w, &[2.0, 2.0, 2.5], 1e-12);
        assert_eq!(trace.total_corrections(), 5);
        assert_close(&trace.step(1).unwrap().coefficients, &[1.0, 1.0, 1.0], 1e-12);
    }

    #[test]
    fn order_changes_the_result_for_three_tasks() {
        let g = Gramian::from_rows(&[
            [1.0_f64, -1.0, 0.0],
            [-1.0, 2.0, -1.0],
            [0.0, -1.0, 1.0],
        ])
        .unwrap();
        let engine = PcGradWeighting::new();
        let forward = engine
            .compute_weights(&g, &mut FixedPermutations::repeat(vec![0, 1, 2]).unwrap())
            .unwrap();
        let backward = engine
            .compute_weights(&g, &mut FixedPermutations::repeat(vec![2, 1, 0]).unwrap())
            .unwrap();
        assert_ne!(forward, backward);
    }

    #[test]
    fn zero_diagonal_fails_before_any_division() {
        let g = Gramian::from_rows(&[[1.0_f64, 0.0], [0.0, 0.0]]).unwrap();
        for seed in 0..4 {
            let err = PcGradWeighting::new()
                .compute_weights(&g, &mut RngPermutations::seeded(seed))
                .unwrap_err();
            assert_eq!(
                err,
                PcGradError::DegenerateGradient {
                    index: 1,
                    squared_norm: 0.0
                }
            );
        }
    }

    #[test]
    fn single_zero_gradient_is_degenerate() {
        let g = Gramian::from_rows(&[[0.0_f32]]).unwrap();
        assert!(matches!(
            PcGradWeighting::new().compute_weights(&g, &mut IdentityPermutations),
            Err(PcGradError::DegenerateGradient { index: 0, .. })
        ));
    }

    #[test]
    fn epsilon_threshold_catches_tiny_norms() {
        let g = Gramian::from_rows(&[[1.0_f64, -1e-7], [-1e-7, 1e-10]]).unwrap();
        let engine = PcGradWeighting::with_config(WeightingConfig::default().with_degenerate_epsilon(1e-8));
        assert!(matches!(
            engine.compute_weights(&g, &mut IdentityPermutations),
            Err(PcGradError::DegenerateGradient { index: 1, .. })
        ));
    }

    #[test]
    fn negative_epsilon_lets_zero_rows_through() {
        let g = Gramian::from_rows(&[[4.0_f64, 0.0], [0.0, 0.0]]).unwrap();
        let engine = PcGradWeighting::with_config(WeightingConfig::default().with_degenerate_epsilon(-1.0));
        let w = engine.compute_weights(&g, &mut IdentityPermutations).unwrap();
        assert_eq!(w, vec![1.0, 1.0]);
    }

    #[test]
    fn draws_exactly_one_permutation_per_task() {
        let g = Gramian::from_rows(&[[1.0_f64, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]).unwrap();
        let mut orders = FixedPermutations::new(vec![
            vec![0, 1, 2],
            vec![1, 2, 0],
            vec![2, 0, 1],
            vec![2, 1, 0],
        ])
        .unwrap();
        PcGradWeighting::new().compute_weights(&g, &mut orders).unwrap();
        assert_eq!(orders.cursor(), 3);
    }

    #[test]
    fn invalid_permutation_from_source_is_rejected() {
        struct Broken;
        impl PermutationSource for Broken {
            fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
                out.fill(0);
                Ok(())
            }
        }
        let g = Gramian::from_rows(&[[1.0_f64, -0.5], [-0.5, 1.0]]).unwrap();
        assert!(matches!(
            PcGradWeighting::new().compute_weights(&g, &mut Broken),
            Err(PcGradError::PermutationSource(_))
        ));
    }

    #[test]
    fn traced_and_untraced_runs_agree() {
        let g = Gramian::from_rows(&[
            [2.0_f64, -1.2, 0.3, -0.4],
            [-1.2, 3.0, -0.9, 0.2],
            [0.3, -0.9, 1.5, -1.1],
            [-0.4, 0.2, -1.1, 2.2],
        ])
        .unwrap();
        let engine = PcGradWeighting::new();
        let plain = engine.compute_weights(&g, &mut RngPermutations::seeded(9)).unwrap();
        let (traced, trace) = engine
            .compute_weights_traced(&g, &mut RngPermutations::seeded(9))
            .unwrap();
        assert_eq!(plain, traced);
        assert_close(&trace.summed_coefficients(), &plain, 1e-12);
    }

    #[test]
    fn double_precision_matches_native_f64() {
        let rows = [[2.0_f32, -1.2, 0.3], [-1.2, 3.0, -0.9], [0.3, -0.9, 1.5]];
        let g32 = Gramian::from_rows(&rows).unwrap();
        let g64: Gramian<f64> = g32.to_precision().unwrap();

        let double = PcGradWeighting::with_config(WeightingConfig::default().with_precision(ComputePrecision::Double))
            .compute_weights(&g32, &mut RngPermutations::seeded(5))
            .unwrap();
        let native64 = PcGradWeighting::new()
            .compute_weights(&g64, &mut RngPermutations::seeded(5))
            .unwrap();

        let expected: Vec<f32> = native64.iter().map(|&w| w as f32).collect();
        assert_eq!(double, expected);
    }

    #[test]
    fn overflow_is_reported_as_non_finite() {
        // Violates Cauchy–Schwarz, but passes validation: a tiny norm on g1
        // against a huge conflict drives c1 past f32::MAX.
        let g = Gramian::from_rows(&[[3.0e38_f32, -3.0e38], [-3.0e38, 1.0e-38]]).unwrap();
        let err = PcGradWeighting::new()
            .compute_weights(&g, &mut IdentityPermutations)
            .unwrap_err();
        assert!(matches!(err, PcGradError::NonFinite { .. }));
    }
}

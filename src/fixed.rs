//! Fixed-capacity PCGrad over `[[T; N]; N]` with no heap allocation.
//!
//! Same algorithm, same validation, and same permutation-draw order as
//! [`crate::PcGradWeighting`], but every buffer lives on the stack. Intended
//! for embedded trainers where the task count is known at compile time.
//!
//! ```
//! use pcgrad_core::fixed::compute_weights_array;
//! use pcgrad_core::{IdentityPermutations, WeightingConfig};
//!
//! let g = [[18.0_f32, -22.0], [-22.0, 38.0]];
//! let w = compute_weights_array(&g, &WeightingConfig::default(), &mut IdentityPermutations).unwrap();
//! assert!((w[0] - 2.2222).abs() < 1e-3);
//! assert!((w[1] - 1.5789).abs() < 1e-3);
//! ```

use crate::error::{PcGradError, Result};
use crate::gramian::{validate, DEFAULT_SYMMETRY_TOLERANCE};
use crate::permutation::PermutationSource;
use crate::scalar::Real;
use crate::trace::Silent;
use crate::weighting::{
    accumulate, check_degenerate, check_finite, draw_permutation, project_outer, ComputePrecision,
    WeightingConfig,
};

/// PCGrad weights for a compile-time-sized Gramian.
///
/// The Gramian is validated exactly as [`crate::Gramian::new`] would validate it.
pub fn compute_weights_array<T, P, const N: usize>(
    gramian: &[[T; N]; N],
    config: &WeightingConfig,
    permutations: &mut P,
) -> Result<[T; N]>
where
    T: Real,
    P: PermutationSource + ?Sized,
{
    if N == 0 {
        return Err(PcGradError::Empty);
    }
    validate(N, gramian.as_flattened(), DEFAULT_SYMMETRY_TOLERANCE)?;

    match config.precision {
        ComputePrecision::Native => run(gramian, config.degenerate_epsilon, permutations),
        ComputePrecision::Double => {
            let mut widened = [[0.0_f64; N]; N];
            for (wide_row, row) in widened.iter_mut().zip(gramian.iter()) {
                for (w, &g) in wide_row.iter_mut().zip(row.iter()) {
                    *w = g.to_f64();
                }
            }
            let weights = run(&widened, config.degenerate_epsilon, permutations)?;
            let narrowed = weights.map(T::from_f64);
            check_finite(&narrowed)?;
            Ok(narrowed)
        }
    }
}

fn run<T, P, const N: usize>(gramian: &[[T; N]; N], epsilon: f64, permutations: &mut P) -> Result<[T; N]>
where
    T: Real,
    P: PermutationSource + ?Sized,
{
    check_degenerate(gramian, N, epsilon)?;

    let mut weights = [T::ZERO; N];
    let mut current = [T::ZERO; N];
    let mut permutation = [0usize; N];
    let mut seen = [false; N];

    for i in 0..N {
        draw_permutation(permutations, &mut permutation, &mut seen)?;
        project_outer(gramian, i, &permutation, &mut current, &mut Silent);
        accumulate(&mut weights, &current);
    }

    check_finite(&weights)?;
    Ok(weights)
}

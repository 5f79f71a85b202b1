//! Injectable sources of random task orderings.
//!
//! PCGrad visits the other task gradients in a fresh random order for every
//! outer iteration, and its output depends on that order once there are three
//! or more tasks. The order is therefore a dependency, not an implementation
//! detail: the engine asks a [`PermutationSource`] for each ordering.
//!
//! | Source | Use |
//! |--------|-----|
//! | [`RngPermutations`] | Production. Uniform Fisher–Yates over any `rand` RNG, ChaCha8 by default |
//! | [`FixedPermutations`] | Tests and replays. Cycles through caller-supplied orderings |
//! | [`IdentityPermutations`] | Always `0, 1, …, N-1` |
//! | [`SharedPermutations`] | One source shared between threads (`std` only) |
//!
//! # Sharing contract
//!
//! The engine borrows its source `&mut` for the whole call, so a single source
//! is never used by two invocations at once unless it is explicitly wrapped in
//! [`SharedPermutations`]. That wrapper holds its lock for exactly one
//! permutation draw: draws are atomic, but concurrent invocations interleave.
//! For reproducible concurrent runs give every thread its own stream with
//! [`RngPermutations::seeded_stream`] instead.

use alloc::vec::Vec;

use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{PcGradError, Result};

/// A source of permutations of `0..n`.
pub trait PermutationSource {
    /// Overwrite `out` with a permutation of `0..out.len()`.
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()>;
}

impl<P: PermutationSource + ?Sized> PermutationSource for &mut P {
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
        (**self).fill_permutation(out)
    }
}

// ─── RngPermutations ─────────────────────────────────────────────────────────

/// Uniformly random permutations drawn from a `rand` RNG.
#[derive(Clone, Debug)]
pub struct RngPermutations<R = ChaCha8Rng> {
    rng: R,
}

impl<R: RngCore> RngPermutations<R> {
    /// Draw permutations from `rng`.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Recover the RNG.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl RngPermutations<ChaCha8Rng> {
    /// Deterministic source: the same seed yields the same sequence of permutations.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }

    /// Deterministic source on an independent ChaCha stream.
    ///
    /// Sources with the same `seed` and different `stream` values do not share
    /// any output, which makes them suitable for one-per-thread use.
    pub fn seeded_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self::new(rng)
    }

    /// Non-reproducible source seeded from the operating system.
    #[cfg(feature = "std")]
    pub fn from_entropy() -> Self {
        Self::new(ChaCha8Rng::from_entropy())
    }
}

impl<R: RngCore> PermutationSource for RngPermutations<R> {
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = i;
        }
        out.shuffle(&mut self.rng);
        Ok(())
    }
}

// ─── FixedPermutations ───────────────────────────────────────────────────────

/// Replays a fixed list of permutations, cycling when exhausted.
///
/// With PCGrad the k-th draw of a call is the ordering used for outer index
/// `k`, so supplying exactly N permutations pins down one run completely.
#[derive(Clone, Debug)]
pub struct FixedPermutations {
    permutations: Vec<Vec<usize>>,
    cursor: usize,
}

impl FixedPermutations {
    /// Validate and store `permutations`.
    ///
    /// Every entry must be a permutation of `0..len` for its own length, and
    /// the list must not be empty.
    pub fn new(permutations: Vec<Vec<usize>>) -> Result<Self> {
        if permutations.is_empty() {
            return Err(PcGradError::PermutationSource("no permutations supplied"));
        }
        let mut seen = Vec::new();
        for p in &permutations {
            seen.clear();
            seen.resize(p.len(), false);
            if !is_permutation(p, &mut seen) {
                return Err(PcGradError::PermutationSource(
                    "supplied ordering is not a permutation",
                ));
            }
        }
        Ok(Self {
            permutations,
            cursor: 0,
        })
    }

    /// The same permutation for every draw.
    pub fn repeat(permutation: Vec<usize>) -> Result<Self> {
        Self::new(alloc::vec![permutation])
    }

    /// Number of draws served so far, modulo the list length.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl PermutationSource for FixedPermutations {
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
        let next = &self.permutations[self.cursor];
        if next.len() != out.len() {
            return Err(PcGradError::PermutationSource(
                "fixed permutation length does not match task count",
            ));
        }
        out.copy_from_slice(next);
        self.cursor = (self.cursor + 1) % self.permutations.len();
        Ok(())
    }
}

// ─── IdentityPermutations ────────────────────────────────────────────────────

/// Always yields `0, 1, …, N-1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityPermutations;

impl PermutationSource for IdentityPermutations {
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = i;
        }
        Ok(())
    }
}

// ─── SharedPermutations ──────────────────────────────────────────────────────

/// A permutation source shared between threads behind a mutex.
///
/// Cloning shares the underlying source. See the module docs for the
/// interleaving semantics.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct SharedPermutations<P> {
    inner: std::sync::Arc<std::sync::Mutex<P>>,
}

#[cfg(feature = "std")]
impl<P> SharedPermutations<P> {
    /// Share `source`.
    pub fn new(source: P) -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::Mutex::new(source)),
        }
    }

    /// Run `f` against the shared source while holding the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&P) -> R) -> Result<R> {
        let source = self
            .inner
            .lock()
            .map_err(|_| PcGradError::PermutationSource("shared permutation source poisoned"))?;
        Ok(f(&source))
    }
}

#[cfg(feature = "std")]
impl<P> Clone for SharedPermutations<P> {
    fn clone(&self) -> Self {
        Self {
            inner: std::sync::Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "std")]
impl<P: PermutationSource> PermutationSource for SharedPermutations<P> {
    fn fill_permutation(&mut self, out: &mut [usize]) -> Result<()> {
        let mut source = self
            .inner
            .lock()
            .map_err(|_| PcGradError::PermutationSource("shared permutation source poisoned"))?;
        source.fill_permutation(out)
    }
}

// ─── helpers ─────────────────────────────────────────────────────────────────

/// `true` if `candidate` is a permutation of `0..candidate.len()`.
///
/// `seen` must be all `false` and at least as long as `candidate`; it is left dirty.
pub(crate) fn is_permutation(candidate: &[usize], seen: &mut [bool]) -> bool {
    for &idx in candidate {
        if idx >= candidate.len() || seen[idx] {
            return false;
        }
        seen[idx] = true;
    }
    true
}

//! Concurrent use of the weighting engine.
//!
//! Two supported patterns: one independent ChaCha stream per thread
//! (reproducible), or one source shared through `SharedPermutations`
//! (each draw is atomic; calls interleave).

#![cfg(feature = "std")]

use std::sync::Arc;
use std::thread;

use pcgrad_core::{
    Gramian, Matrix, PcGradError, PcGradWeighting, PermutationSource, RngPermutations,
    SharedPermutations,
};

// ─── helpers ─────────────────────────────────────────────────────────────────

fn four_task_gramian() -> Gramian<f64> {
    Gramian::from_rows(&[
        [2.0, -1.2, 0.3, -0.4],
        [-1.2, 3.0, -0.9, 0.2],
        [0.3, -0.9, 1.5, -1.1],
        [-0.4, 0.2, -1.1, 2.2],
    ])
    .unwrap()
}

/// Counts draws so the test can see how many permutations were served.
struct Counting {
    inner: RngPermutations,
    draws: usize,
}

impl PermutationSource for Counting {
    fn fill_permutation(&mut self, out: &mut [usize]) -> pcgrad_core::Result<()> {
        self.draws += 1;
        self.inner.fill_permutation(out)
    }
}

/// Panics on first use, poisoning a shared lock.
struct Exploding;

impl PermutationSource for Exploding {
    fn fill_permutation(&mut self, _out: &mut [usize]) -> pcgrad_core::Result<()> {
        panic!("source failure");
    }
}

fn assert_send_sync<T: Send + Sync>() {}

// ─── tests ───────────────────────────────────────────────────────────────────

#[test]
fn core_types_are_thread_safe() {
    assert_send_sync::<PcGradWeighting>();
    assert_send_sync::<Gramian<f64>>();
    assert_send_sync::<Matrix<f32>>();
    assert_send_sync::<SharedPermutations<RngPermutations>>();
}

#[test]
fn independent_streams_are_reproducible_across_threads() {
    let g = Arc::new(four_task_gramian());

    let handles: Vec<_> = (0..4u64)
        .map(|stream| {
            let g = Arc::clone(&g);
            thread::spawn(move || {
                PcGradWeighting::new()
                    .compute_weights(&*g, &mut RngPermutations::seeded_stream(7, stream))
                    .unwrap()
            })
        })
        .collect();

    for (stream, handle) in handles.into_iter().enumerate() {
        let concurrent = handle.join().expect("worker panicked");
        let sequential = PcGradWeighting::new()
            .compute_weights(&*g, &mut RngPermutations::seeded_stream(7, stream as u64))
            .unwrap();
        assert_eq!(concurrent, sequential, "stream {} diverged", stream);
    }
}

#[test]
fn shared_source_serves_every_draw_exactly_once() {
    let g = Arc::new(four_task_gramian());
    let shared = SharedPermutations::new(Counting {
        inner: RngPermutations::seeded(1),
        draws: 0,
    });

    const THREADS: usize = 4;
    const CALLS: usize = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let g = Arc::clone(&g);
            let mut source = shared.clone();
            thread::spawn(move || {
                for _ in 0..CALLS {
                    let w = PcGradWeighting::new().compute_weights(&*g, &mut source).unwrap();
                    assert_eq!(w.len(), 4);
                    assert!(w.iter().all(|&x| x >= 1.0));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let draws = shared.inspect(|c| c.draws).unwrap();
    assert_eq!(draws, THREADS * CALLS * g.dim());
}

#[test]
fn poisoned_shared_source_surfaces_as_error() {
    let g = four_task_gramian();
    let shared = SharedPermutations::new(Exploding);

    let mut victim = shared.clone();
    let g_clone = g.clone();
    let crashed = thread::spawn(move || {
        let _ = PcGradWeighting::new().compute_weights(&g_clone, &mut victim);
    })
    .join();
    assert!(crashed.is_err());

    let mut survivor = shared;
    assert!(matches!(
        PcGradWeighting::new().compute_weights(&g, &mut survivor),
        Err(PcGradError::PermutationSource(_))
    ));
}

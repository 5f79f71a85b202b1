//! # pcgrad-core
//!
//! PCGrad gradient surgery for multi-task learning, computed entirely on the
//! Gramian of the task gradients.
//!
//! ---
//!
//! ## What PCGrad does
//!
//! Multi-task training produces one gradient per task. When two of them point
//! in conflicting directions (negative inner product), summing them lets one
//! task undo the other's progress. PCGrad removes that interference: each task
//! gradient is projected onto the normal plane of every other gradient it
//! conflicts with, visiting the others in a random order, and the projected
//! gradients are summed.
//!
//! This crate never materialises the projected vectors. Every projection adds
//! a multiple of an *original* gradient, so the whole procedure can run on
//! coefficients over the original rows using only pairwise inner products.
//! The engine reads an N×N Gramian and returns N weights; the update is
//! `weights @ J`.
//!
//! ## The pipeline
//!
//! ```text
//! Matrix J (M×D) → compute_gramian → Gramian (M×M) → PcGradWeighting → w (M) → combine → w @ J (D)
//!                                                          ↑
//!                                                  PermutationSource
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`matrix`] | [`Matrix`] | Row-major task-gradient matrix |
//! | [`gramian`] | [`Gramian`], [`compute_gramian`] | Validated pairwise inner products |
//! | [`weighting`] | [`PcGradWeighting`], [`WeightingConfig`] | The PCGrad weighting engine |
//! | [`permutation`] | [`PermutationSource`], [`RngPermutations`] | Injectable task orderings |
//! | [`aggregator`] | [`PcGrad`], [`Aggregator`], [`Weighting`], [`combine`] | End-to-end aggregation and the backward guard |
//! | [`fixed`] | [`fixed::compute_weights_array`] | Stack-only variant for const task counts |
//! | [`trace`] | [`WeightingTrace`] | Per-iteration record of a run |
//! | [`error`] | [`PcGradError`] | Error taxonomy |
//!
//! ## Example
//!
//! ```
//! use pcgrad_core::{Aggregator, Matrix, PcGrad};
//!
//! let j = Matrix::from_rows(&[[-4.0_f64, 1.0, 1.0], [6.0, 1.0, 1.0]]).unwrap();
//! let update = PcGrad::seeded(0).aggregate(&j).unwrap();
//! assert!((update[0] - 0.5848).abs() < 1e-3);
//! ```
//!
//! ## `no_std`
//!
//! With `default-features = false` the crate is `#![no_std]` and needs only
//! `alloc` (and [`fixed`] needs not even that at run time). The `std` feature
//! (default) adds entropy seeding and [`permutation::SharedPermutations`].
//! Enable `serde` for serialisable matrices, configs, and traces, and
//! `python-ffi` for the PyO3 module.

#![cfg_attr(not(any(feature = "std", feature = "python-ffi", test)), no_std)]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

extern crate alloc;

pub mod aggregator;
pub mod error;
pub mod fixed;
pub mod gramian;
pub mod matrix;
pub mod permutation;
pub mod scalar;
pub mod trace;
pub mod weighting;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use aggregator::{combine, Aggregator, PcGrad, Weighting};
pub use error::{PcGradError, Result};
pub use gramian::{compute_gramian, Gramian};
pub use matrix::Matrix;
pub use permutation::{FixedPermutations, IdentityPermutations, PermutationSource, RngPermutations};
pub use scalar::Real;
pub use trace::WeightingTrace;
pub use weighting::{ComputePrecision, PcGradWeighting, WeightingConfig};

#[cfg(feature = "std")]
pub use permutation::SharedPermutations;

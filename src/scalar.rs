//! Floating-point element types the engine can run on.
//!
//! [`Real`] is implemented for `f32` and `f64`. It carries exactly the
//! arithmetic the weighting loop needs plus lossless-enough conversions to and
//! from `f64`, which is how [`crate::ComputePrecision::Double`] moves a whole
//! run into double precision and back in one step each way.
//!
//! Everything here is `core`-only: no `abs`/`sqrt` intrinsics from `std`.

use core::fmt::{Debug, Display};
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Real scalar element of a gradient matrix or Gramian.
pub trait Real:
    Copy
    + PartialOrd
    + Debug
    + Display
    + Default
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Widen (or copy) to `f64`.
    fn to_f64(self) -> f64;

    /// Narrow (or copy) from `f64`.
    fn from_f64(value: f64) -> Self;

    /// `true` unless the value is NaN or ±∞.
    fn is_finite(self) -> bool;

    /// Absolute value without going through `std`.
    #[inline]
    fn magnitude(self) -> Self {
        if self < Self::ZERO {
            -self
        } else {
            self
        }
    }
}

impl Real for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    #[inline]
    fn is_finite(self) -> bool {
        f32::is_finite(self)
    }
}

impl Real for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    #[inline]
    fn is_finite(self) -> bool {
        f64::is_finite(self)
    }
}

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{One, Zero};

use crate::utils::errors::GateError;

pub mod ark;
pub mod batch_inverse;

pub use batch_inverse::{batch_invert, par_batch_invert};

pub trait FieldOps<Rhs = Self, Output = Self>:
    Add<Rhs, Output = Output>
    + Sub<Rhs, Output = Output>
    + Mul<Rhs, Output = Output>
{
}

/// The native field of the constraint system. Values are always kept in
/// canonical reduced form by the implementing type; `+`, `-` and `*` are total.
pub trait GateField:
    'static
    + Sized
    + Zero
    + One
    + Neg<Output = Self>
    + FieldOps<Self, Self>
    + for<'a> FieldOps<&'a Self, Self>
    + AddAssign<Self>
    + SubAssign<Self>
    + MulAssign<Self>
    + core::iter::Sum<Self>
    + for<'a> core::iter::Sum<&'a Self>
    + core::iter::Product<Self>
    + Eq
    + Copy
    + Sync
    + Send
    + Display
    + Debug
    + Default
    + CanonicalSerialize
    + CanonicalDeserialize
    + Hash
{
    fn random<R: rand_core::RngCore>(rng: &mut R) -> Self;
    fn from_u64(n: u64) -> Self;
    fn from_i64(val: i64) -> Self;
    fn square(&self) -> Self;
    fn inverse(&self) -> Option<Self>;
    /// Bit `i` of the canonical integer representative, little-endian.
    fn bit(&self, i: usize) -> bool;
    fn num_bits(&self) -> u32;

    #[inline(always)]
    fn is_boolean(&self) -> bool {
        self.is_zero() || self.is_one()
    }

    #[inline(always)]
    fn from_bool(b: bool) -> Self {
        if b {
            Self::one()
        } else {
            Self::zero()
        }
    }

    #[inline(always)]
    fn mul_u64(&self, n: u64) -> Self {
        *self * Self::from_u64(n)
    }
}

/// Field inversion; the only partial field operation.
#[inline]
pub fn invert<F: GateField>(x: &F) -> Result<F, GateError> {
    x.inverse().ok_or(GateError::DivisionByZero)
}

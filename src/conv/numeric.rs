//! The small capability set the generic pipeline is instantiated over.

use std::fmt::Debug;
use std::ops::{Add, AddAssign};

use crate::simd;

/// Raw dot-product accumulator. Widened to `i64` before requantization.
pub trait Accumulator:
    Copy + Default + Debug + PartialEq + Add<Output = Self> + AddAssign + Into<i64> + Send + Sync + 'static
{
}

impl Accumulator for i32 {}
impl Accumulator for i64 {}

/// A quantized activation element (input and output share the type).
pub trait Activation: Copy + Default + Debug + PartialEq + Send + Sync + 'static {
    /// Accumulator wide enough for a full receptive field of `Self * i8`.
    type Acc: Accumulator;

    const MIN: i32;
    const MAX: i32;
    /// Input channels are padded up to a multiple of this.
    const CHANNEL_ALIGN: usize;
    /// Most `i8 * Self` products one accumulator holds without overflow.
    const MAX_TAPS: usize;
    const NAME: &'static str;

    /// Narrow cast of a value already known to be in `[MIN, MAX]`.
    fn from_i32(v: i32) -> Self;
    /// Narrow cast saturating to `[MIN, MAX]`.
    fn saturate(v: i64) -> Self {
        Self::from_i32(v.clamp(Self::MIN as i64, Self::MAX as i64) as i32)
    }
    fn to_i32(self) -> i32;
    /// `sum(weights[i] * x[i])`; slices have equal length.
    fn dot(weights: &[i8], x: &[Self]) -> Self::Acc;
}

impl Activation for i8 {
    type Acc = i32;
    const MIN: i32 = i8::MIN as i32;
    const MAX: i32 = i8::MAX as i32;
    const CHANNEL_ALIGN: usize = 4;
    const MAX_TAPS: usize = (i32::MAX / (128 * 128)) as usize;
    const NAME: &'static str = "i8";

    #[inline]
    fn from_i32(v: i32) -> Self {
        v as i8
    }
    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }
    #[inline]
    fn dot(weights: &[i8], x: &[Self]) -> i32 {
        simd::dot_i8(weights, x)
    }
}

impl Activation for i16 {
    type Acc = i64;
    const MIN: i32 = i16::MIN as i32;
    const MAX: i32 = i16::MAX as i32;
    const CHANNEL_ALIGN: usize = 2;
    // 2^41 products of 2^22 fit an i64; no addressable filter gets there.
    const MAX_TAPS: usize = usize::MAX;
    const NAME: &'static str = "i16";

    #[inline]
    fn from_i32(v: i32) -> Self {
        v as i16
    }
    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }
    #[inline]
    fn dot(weights: &[i8], x: &[Self]) -> i64 {
        simd::dot_i8_i16(weights, x)
    }
}

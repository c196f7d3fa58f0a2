//! Fixed-point requantization.
//!
//! Multipliers are Q31 values in `[0, 1)` scaled by `2^31`; shifts are signed,
//! positive meaning a left shift, and lie in `[MIN_SHIFT, MAX_SHIFT]`.

use serde::{Deserialize, Serialize};

pub const MIN_SHIFT: i32 = -31;
pub const MAX_SHIFT: i32 = 31;

/// How the combined `multiplier * 2^shift` scale is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftConvention {
    /// One wide multiply and one rounding shift by `31 - shift`.
    #[default]
    SingleRounding,
    /// Left shift, rounding doubling high multiply, then rounding right shift.
    /// Rounds twice when `shift < 0`, so it can differ from
    /// [`ShiftConvention::SingleRounding`] by one in that range and is then
    /// not bit-exact with the single-rounding result.
    Split,
}

/// Arithmetic shift right by `n` rounding half away from zero.
#[inline]
pub fn rounding_shift_right(v: i128, n: u32) -> i128 {
    if n == 0 {
        return v;
    }
    let half = 1i128 << (n - 1);
    if v >= 0 {
        (v + half) >> n
    } else {
        -((-v + half) >> n)
    }
}

#[inline]
fn saturate_i64(v: i128) -> i64 {
    v.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// `round(acc * multiplier / 2^(31 - shift))` with a single rounding step.
#[inline]
pub fn scale_single_rounding(acc: i64, multiplier: i32, shift: i32) -> i64 {
    debug_assert!((MIN_SHIFT..=MAX_SHIFT).contains(&shift));
    let prod = acc as i128 * multiplier as i128;
    saturate_i64(rounding_shift_right(prod, (31 - shift) as u32))
}

/// Split-shift variant of [`scale_single_rounding`].
#[inline]
pub fn scale_split(acc: i64, multiplier: i32, shift: i32) -> i64 {
    debug_assert!((MIN_SHIFT..=MAX_SHIFT).contains(&shift));
    let left = shift.max(0) as u32;
    let right = (-shift).max(0) as u32;
    let shifted = (acc as i128) << left;
    let high = rounding_shift_right(shifted * multiplier as i128, 31);
    saturate_i64(rounding_shift_right(high, right))
}

#[inline]
pub fn scale(acc: i64, multiplier: i32, shift: i32, convention: ShiftConvention) -> i64 {
    match convention {
        ShiftConvention::SingleRounding => scale_single_rounding(acc, multiplier, shift),
        ShiftConvention::Split => scale_split(acc, multiplier, shift),
    }
}

/// Scale an accumulator, add the output zero point and clamp to `[min, max]`.
#[inline]
pub fn requantize(acc: i64, multiplier: i32, shift: i32, zero_point: i32, min: i32, max: i32) -> i32 {
    requantize_with(acc, multiplier, shift, zero_point, min, max, ShiftConvention::SingleRounding)
}

#[inline]
pub fn requantize_with(
    acc: i64,
    multiplier: i32,
    shift: i32,
    zero_point: i32,
    min: i32,
    max: i32,
    convention: ShiftConvention,
) -> i32 {
    let scaled = scale(acc, multiplier, shift, convention);
    scaled.saturating_add(zero_point as i64).clamp(min as i64, max as i64) as i32
}

/// Decompose a positive real scale into a Q31 multiplier and a shift.
///
/// Returns `(0, 0)` for non-positive scales and scales too small to represent.
pub fn quantize_multiplier(real: f64) -> (i32, i32) {
    if !(real > 0.0) || !real.is_finite() {
        return (0, 0);
    }
    let mut shift = real.log2().floor() as i32 + 1;
    let mut q = real / 2f64.powi(shift);
    while q >= 1.0 {
        q /= 2.0;
        shift += 1;
    }
    while q < 0.5 {
        q *= 2.0;
        shift -= 1;
    }
    let mut q_fixed = (q * (1u64 << 31) as f64).round() as i64;
    if q_fixed == 1i64 << 31 {
        q_fixed /= 2;
        shift += 1;
    }
    if shift < MIN_SHIFT {
        return (0, 0);
    }
    if shift > MAX_SHIFT {
        return (i32::MAX, MAX_SHIFT);
    }
    (q_fixed as i32, shift)
}

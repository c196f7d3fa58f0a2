//! Runtime SIMD capability detection and the integer dot products the
//! MatVec engine is built on.

use std::sync::OnceLock;

static AVX2: OnceLock<bool> = OnceLock::new();

/// Whether this CPU runs the AVX2 `i8` dot product. Detected once.
pub fn has_avx2() -> bool {
    *AVX2.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            is_x86_feature_detected!("avx2")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    })
}

/// Name of the `i8` dot-product path in use, for logs.
pub fn dot_path() -> &'static str {
    if has_avx2() {
        "avx2"
    } else {
        "scalar"
    }
}

/// `sum(w[i] * x[i])` over two `i8` slices of equal length. The caller keeps
/// `len` within `i8::MAX_TAPS`; every partial sum then fits an `i32`.
#[inline]
pub fn dot_i8(w: &[i8], x: &[i8]) -> i32 {
    debug_assert_eq!(w.len(), x.len());
    #[cfg(target_arch = "x86_64")]
    {
        if has_avx2() && w.len() >= 16 {
            // Safety: AVX2 availability checked above.
            return unsafe { dot_i8_avx2(w, x) };
        }
    }
    dot_i8_scalar(w, x)
}

#[inline]
pub fn dot_i8_scalar(w: &[i8], x: &[i8]) -> i32 {
    let mut acc: i32 = 0;
    for (&a, &b) in w.iter().zip(x) {
        acc += a as i32 * b as i32;
    }
    acc
}

/// Widening dot product for 16-bit activations against 8-bit weights.
#[inline]
pub fn dot_i8_i16(w: &[i8], x: &[i16]) -> i64 {
    debug_assert_eq!(w.len(), x.len());
    let mut acc: i64 = 0;
    for (&a, &b) in w.iter().zip(x) {
        acc += a as i64 * b as i64;
    }
    acc
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn dot_i8_avx2(w: &[i8], x: &[i8]) -> i32 {
    use std::arch::x86_64::*;

    let n = w.len().min(x.len());
    let mut acc = _mm256_setzero_si256();
    let mut i = 0;
    // 16 lanes per step: sign-extend to i16, multiply pairwise into i32.
    while i + 16 <= n {
        let wv = _mm256_cvtepi8_epi16(_mm_loadu_si128(w.as_ptr().add(i) as *const __m128i));
        let xv = _mm256_cvtepi8_epi16(_mm_loadu_si128(x.as_ptr().add(i) as *const __m128i));
        acc = _mm256_add_epi32(acc, _mm256_madd_epi16(wv, xv));
        i += 16;
    }
    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr() as *mut __m256i, acc);
    let mut sum: i32 = lanes.iter().sum();
    while i < n {
        sum += w[i] as i32 * x[i] as i32;
        i += 1;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_path_follows_detection() {
        assert_eq!(has_avx2(), has_avx2());
        assert_eq!(dot_path() == "avx2", has_avx2());
    }

    #[test]
    fn dot_matches_scalar_on_odd_lengths() {
        for n in [0usize, 1, 15, 16, 17, 33, 100] {
            let w: Vec<i8> = (0..n).map(|i| ((i * 37 % 255) as i32 - 127) as i8).collect();
            let x: Vec<i8> = (0..n).map(|i| ((i * 91 % 256) as i32 - 128) as i8).collect();
            assert_eq!(dot_i8(&w, &x), dot_i8_scalar(&w, &x), "n={}", n);
        }
    }

    #[test]
    fn dot_extremes() {
        let w = vec![-128i8; 64];
        let x = vec![-128i8; 64];
        assert_eq!(dot_i8(&w, &x), 64 * 16384);
        let xs = vec![i16::MIN; 4];
        assert_eq!(dot_i8_i16(&[-128; 4], &xs), 4 * 128 * 32768);
    }
}

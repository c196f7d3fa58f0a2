//! The dot-product engine the circular buffer feeds.

use crate::conv::numeric::Activation;
use crate::conv::ring::RingView;

/// Matrix x vectors primitive.
///
/// For every matrix row `r` and filter `v` (filter `v` starts at
/// `v * vec_stride` in `filters` and is `mat.cols()` long) write the raw
/// `sum(filter * row)` to `acc[r * vec_count + v]`. Zero-point correction,
/// bias and requantization are applied by the caller.
pub trait MatVec<T: Activation> {
    fn matvec(&self, mat: &RingView<'_, T>, filters: &[i8], vec_count: usize, vec_stride: usize, acc: &mut [T::Acc]);
}

/// Row-by-row engine on top of [`Activation::dot`] (AVX2 for `i8` when the
/// CPU has it).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMatVec;

impl<T: Activation> MatVec<T> for DefaultMatVec {
    fn matvec(&self, mat: &RingView<'_, T>, filters: &[i8], vec_count: usize, vec_stride: usize, acc: &mut [T::Acc]) {
        let cols = mat.cols();
        debug_assert!(acc.len() >= mat.rows() * vec_count);
        for r in 0..mat.rows() {
            let (head, tail) = mat.row(r);
            let out = &mut acc[r * vec_count..(r + 1) * vec_count];
            for (v, slot) in out.iter_mut().enumerate() {
                let f = &filters[v * vec_stride..v * vec_stride + cols];
                let (fh, ft) = f.split_at(head.len());
                let mut sum = T::dot(fh, head);
                if !tail.is_empty() {
                    sum += T::dot(ft, tail);
                }
                *slot = sum;
            }
        }
    }
}

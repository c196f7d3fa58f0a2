use crate::conv::descriptor::QuantParams;
use crate::conv::numeric::Activation;
use crate::conv::quant::{requantize_with, ShiftConvention};

/// Per-call output stage: bias, input zero-point correction and
/// per-channel requantization.
pub(crate) struct Requantizer<'a, T: Activation> {
    params: &'a QuantParams<'a, T>,
    /// `sum(weights)` per output channel, for the input zero-point term.
    filter_sums: &'a [i64],
    convention: ShiftConvention,
}

impl<'a, T: Activation> Requantizer<'a, T> {
    pub(crate) fn new(params: &'a QuantParams<'a, T>, filter_sums: &'a [i64], convention: ShiftConvention) -> Self {
        Self { params, filter_sums, convention }
    }

    /// Output for a receptive field that lies entirely in the padding.
    #[inline]
    pub(crate) fn bias_only(&self, channel: usize) -> T {
        self.finish(channel, 0)
    }

    /// Output for a raw `sum(w * x)` over the (zero-point filled) window.
    #[inline]
    pub(crate) fn from_raw(&self, channel: usize, raw: T::Acc) -> T {
        let raw: i64 = raw.into();
        self.finish(channel, raw - self.params.input_zero_point as i64 * self.filter_sums[channel])
    }

    #[inline]
    fn finish(&self, channel: usize, acc: i64) -> T {
        let p = self.params;
        let bias: i64 = p.bias[channel].into();
        let v = requantize_with(
            acc + bias,
            p.multipliers[channel],
            p.shifts[channel],
            p.output_zero_point,
            p.activation_min,
            p.activation_max,
            self.convention,
        );
        T::from_i32(v)
    }
}

/// Fill `sums[oc]` with the sum of filter `oc` (packed, `per_filter` long).
pub(crate) fn filter_sums(filters: &[i8], per_filter: usize, sums: &mut [i64]) {
    for (sum, f) in sums.iter_mut().zip(filters.chunks_exact(per_filter)) {
        *sum = f.iter().map(|&w| w as i64).sum();
    }
}

//! Filter preparation. Runs once per model, outside the convolution call.

use crate::conv::numeric::Activation;
use crate::error::{invalid, ConvError};

/// Input channels rounded up to the lane multiple of `T`.
pub fn padded_channels<T: Activation>(channels: usize) -> usize {
    channels.div_ceil(T::CHANNEL_ALIGN) * T::CHANNEL_ALIGN
}

/// Repack `[OC][KH][KW][C]` filters into `[OC][KH][KW][CP]` with zeroed
/// padding lanes, the layout the MatVec engine consumes.
pub fn pack_filters<T: Activation>(
    filters: &[i8],
    out_channels: usize,
    kernel_height: usize,
    kernel_width: usize,
    channels: usize,
) -> Result<Vec<i8>, ConvError> {
    let taps = out_channels * kernel_height * kernel_width;
    if filters.len() != taps * channels {
        return Err(invalid(format!("filters have {} elements, expected {}", filters.len(), taps * channels)));
    }
    let cp = padded_channels::<T>(channels);
    let mut packed = vec![0i8; taps * cp];
    if channels == 0 {
        return Ok(packed);
    }
    for (dst, src) in packed.chunks_exact_mut(cp).zip(filters.chunks_exact(channels)) {
        dst[..channels].copy_from_slice(src);
    }
    Ok(packed)
}

//! Direct O(out * kernel^2) convolution, the oracle for the fast path.

use crate::conv::descriptor::{ConvDescriptor, QuantParams};
use crate::conv::numeric::Activation;
use crate::conv::quant::{requantize_with, ShiftConvention};
use crate::error::{invalid, ConvError};

/// Convolve with explicit zero-point padding and unpacked `[OC][KH][KW][C]`
/// filters. Output layout and size follow `desc`.
pub fn conv2d_reference<T: Activation>(
    desc: &ConvDescriptor,
    input: &[T],
    filters: &[i8],
    quant: &QuantParams<'_, T>,
    convention: ShiftConvention,
    output: &mut [T],
) -> Result<(), ConvError> {
    // The reference also accepts strided dilation.
    let mut shape = *desc;
    shape.dilation_x = 1;
    shape.dilation_y = 1;
    shape.output_size = Some((desc.out_height(), desc.out_width()));
    shape.validate()?;
    quant.validate(desc.out_channels)?;
    let (kh, kw, c, oc) = (desc.kernel_height, desc.kernel_width, desc.input_channels, desc.out_channels);
    if input.len() != desc.input_len() {
        return Err(invalid(format!("input has {} elements, expected {}", input.len(), desc.input_len())));
    }
    if filters.len() != oc * kh * kw * c {
        return Err(invalid(format!("filters have {} elements, expected {}", filters.len(), oc * kh * kw * c)));
    }
    if output.len() != desc.output_len() {
        return Err(invalid(format!("output has {} elements, expected {}", output.len(), desc.output_len())));
    }

    let (h, w) = (desc.input_height as isize, desc.input_width as isize);
    let (oh, ow) = (desc.out_height(), desc.out_width());
    let (rs, cs, chs) = desc.output_strides();
    let izp = quant.input_zero_point as i64;

    for b in 0..desc.batch {
        let inp = &input[b * desc.input_item_len()..(b + 1) * desc.input_item_len()];
        let out = &mut output[b * desc.output_item_len()..(b + 1) * desc.output_item_len()];
        for oy in 0..oh {
            for ox in 0..ow {
                for o in 0..oc {
                    let mut acc: i64 = 0;
                    for ky in 0..kh {
                        let iy = (oy * desc.stride_y + ky * desc.dilation_y) as isize - desc.padding_y as isize;
                        for kx in 0..kw {
                            let ix = (ox * desc.stride_x + kx * desc.dilation_x) as isize - desc.padding_x as isize;
                            let inside = iy >= 0 && iy < h && ix >= 0 && ix < w;
                            for ci in 0..c {
                                let x = if inside {
                                    inp[((iy * w + ix) as usize) * c + ci].to_i32() as i64
                                } else {
                                    izp
                                };
                                let wt = filters[((o * kh + ky) * kw + kx) * c + ci] as i64;
                                acc += wt * (x - izp);
                            }
                        }
                    }
                    let bias: i64 = quant.bias[o].into();
                    let v = requantize_with(
                        acc + bias,
                        quant.multipliers[o],
                        quant.shifts[o],
                        quant.output_zero_point,
                        quant.activation_min,
                        quant.activation_max,
                        convention,
                    );
                    out[oy * rs + ox * cs + o * chs] = T::from_i32(v);
                }
            }
        }
    }
    Ok(())
}

mod common;

use common::Case;
use proptest::prelude::*;
use qconv::conv::padding::{left_pad_count, right_pad_count, right_pad_start, AxisSplit};
use qconv::conv::quant::requantize;
use qconv::{ConvConfig, ConvDescriptor};

proptest! {
    #[test]
    fn split_classifies_every_output(
        padding in 0usize..12,
        input in 0usize..10,
        kernel in 1usize..6,
        stride in 1usize..4,
        out in 1usize..20,
    ) {
        let s = AxisSplit::new(padding, input, kernel, stride, out);
        prop_assert_eq!(s.leading + s.body + s.trailing, out);
        prop_assert_eq!(s.leading, left_pad_count(padding, kernel, stride, out));
        prop_assert_eq!(s.trailing, right_pad_count(padding, input, kernel, stride, out));
        for j in 0..out {
            let start = (j * stride) as isize - padding as isize;
            let end = start + kernel as isize;
            if j < s.leading {
                prop_assert!(end <= 0, "output {} classified leading but window ends at {}", j, end);
            } else if s.trailing_range().contains(&j) {
                prop_assert!(start >= input as isize, "output {} classified trailing but starts at {}", j, start);
                prop_assert!(j >= right_pad_start(padding, input, stride));
            } else {
                prop_assert!(end > 0);
            }
        }
    }
}

#[test]
fn padding_below_kernel_has_no_leading_outputs() {
    for k in 1..6 {
        for p in 0..k {
            assert_eq!(left_pad_count(p, k, 1, 100), 0);
        }
    }
    assert_eq!(left_pad_count(4, 5, 1, 5), 0);
    assert_eq!(left_pad_count(6, 3, 3, 5), 2);
    assert_eq!(right_pad_start(6, 3, 3), 3);
}

#[test]
fn pad_only_outputs_are_requantized_bias() {
    let desc = ConvDescriptor::new([3, 4, 3], [3, 3], 5).with_padding(5, 7).with_stride(2, 2);
    let mut a = Case::<i8>::random(desc, 11);
    let first = a.run(ConvConfig::untiled());
    for v in a.input.iter_mut() {
        *v = v.wrapping_mul(3).wrapping_add(17);
    }
    let second = a.run(ConvConfig::untiled());

    let rows = AxisSplit::new(desc.padding_y, desc.input_height, desc.kernel_height, desc.stride_y, desc.out_height());
    let cols = AxisSplit::new(desc.padding_x, desc.input_width, desc.kernel_width, desc.stride_x, desc.out_width());
    assert!(rows.leading > 0 && cols.leading > 0 && rows.trailing > 0 && cols.trailing > 0);
    let (rs, cs, chs) = desc.output_strides();
    let mut checked = 0;
    for y in 0..desc.out_height() {
        for x in 0..desc.out_width() {
            let pad_only = !rows.body_range().contains(&y) || !cols.body_range().contains(&x);
            if !pad_only {
                continue;
            }
            for o in 0..desc.out_channels {
                let want = requantize(
                    a.bias[o] as i64,
                    a.multipliers[o],
                    a.shifts[o],
                    a.output_zero_point,
                    a.activation_min,
                    a.activation_max,
                ) as i8;
                let at = y * rs + x * cs + o * chs;
                assert_eq!(first[at], want, "({}, {}, {})", y, x, o);
                assert_eq!(second[at], want);
                checked += 1;
            }
        }
    }
    assert!(checked > 0);
}

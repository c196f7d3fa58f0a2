mod common;

use common::Case;
use proptest::prelude::*;
use qconv::conv::phases;
use qconv::conv::TilePlan;
use qconv::{Activation, ConvConfig, ConvDescriptor, OutputLayout, ShiftConvention};

fn shape() -> impl Strategy<Value = ConvDescriptor> {
    (
        (1usize..3, 1usize..12, 1usize..12, 1usize..9),
        (1usize..5, 1usize..5, 1usize..6),
        (1usize..4, 1usize..4, 0usize..5, 0usize..5),
        any::<bool>(),
    )
        .prop_map(|((n, h, w, c), (kh, kw, oc), (sx, sy, px, py), nchw)| {
            let layout = if nchw { OutputLayout::ChannelFirst } else { OutputLayout::ChannelLast };
            ConvDescriptor::new([h, w, c], [kh, kw], oc)
                .with_batch(n)
                .with_stride(sx, sy)
                .with_padding(px, py)
                .with_layout(layout)
        })
        .prop_filter("shape must be valid", |d| d.validate().is_ok())
}

fn check<T: Activation>(case: &mut Case<T>, budget_rows: usize) -> Result<(), TestCaseError> {
    let g = phases::<T>(&case.desc).next().unwrap();
    let budget = TilePlan::working_set_bytes::<T>(&g, budget_rows);
    for convention in [ShiftConvention::SingleRounding, ShiftConvention::Split] {
        let config = ConvConfig::untiled().with_cache_budget(budget).with_shift_convention(convention);
        prop_assert_eq!(case.run(config), case.reference(convention));
    }
    // Split rounds twice for negative shifts: never more than one step away
    // from the single-rounding output.
    let single = case.reference(ShiftConvention::SingleRounding);
    let split = case.run(ConvConfig::untiled().with_shift_convention(ShiftConvention::Split));
    for (i, (a, b)) in split.iter().zip(&single).enumerate() {
        let diff = (a.to_i32() - b.to_i32()).abs();
        prop_assert!(diff <= 1, "output {}: split {:?} single {:?}", i, a, b);
    }
    // A narrowed activation range clamps both paths identically.
    case.activation_min = T::MIN / 2;
    case.activation_max = T::MAX / 3;
    prop_assert_eq!(case.run(ConvConfig::untiled()), case.reference(ShiftConvention::SingleRounding));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn int8_matches_direct(desc in shape(), seed in any::<u64>(), rows in 1usize..6) {
        check(&mut Case::<i8>::random(desc, seed), rows)?;
    }

    #[test]
    fn int16_matches_direct(desc in shape(), seed in any::<u64>(), rows in 1usize..6) {
        check(&mut Case::<i16>::random(desc, seed), rows)?;
    }
}

#[test]
fn extreme_zero_points() {
    let desc = ConvDescriptor::new([7, 6, 5], [3, 2], 3).with_padding(2, 1).with_stride(2, 1);
    for (izp, ozp) in [(-128, 127), (127, -128), (0, 0)] {
        let mut case = Case::<i8>::random(desc, 3);
        case.input_zero_point = izp;
        case.output_zero_point = ozp;
        assert_eq!(case.run(ConvConfig::untiled()), case.reference(ShiftConvention::SingleRounding));
    }
}

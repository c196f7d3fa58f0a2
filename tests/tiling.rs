mod common;

use common::Case;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use qconv::conv::ring::RingView;
use qconv::conv::{phases, TilePlan};
use qconv::{Activation, Conv2d, ConvConfig, ConvDescriptor, DefaultMatVec, MatVec, OutputLayout, Scratch, ShiftConvention};
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct CountingMatVec {
    calls: AtomicUsize,
}

impl<T: Activation> MatVec<T> for CountingMatVec {
    fn matvec(&self, mat: &RingView<'_, T>, filters: &[i8], vec_count: usize, vec_stride: usize, acc: &mut [T::Acc]) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        DefaultMatVec.matvec(mat, filters, vec_count, vec_stride, acc);
    }
}

#[test]
fn pure_padding_tiles_skip_the_engine() {
    // 18 output rows: 7 above the input, 4 touching it, 7 below.
    let desc = ConvDescriptor::new([2, 8, 4], [3, 3], 4).with_padding(1, 9);
    assert_eq!((desc.out_height(), desc.out_width()), (18, 8));
    let g = phases::<i8>(&desc).next().unwrap();
    let budget = TilePlan::working_set_bytes::<i8>(&g, 4);
    let plan = TilePlan::plan::<i8>(&g, budget);
    assert_eq!(plan, TilePlan { tile_height: 4, num_tiles: 5 });

    let case = Case::<i8>::random(desc, 21);
    let conv = Conv2d::with_engine(ConvConfig::untiled().with_cache_budget(budget), CountingMatVec::default());
    let mut scratch = Scratch::new(conv.scratch_size::<i8>(&desc).unwrap());
    let mut out = vec![0i8; desc.output_len()];
    conv.run(&desc, &case.input, &case.packed, &case.quant(), &mut scratch, &mut out).unwrap();

    // Only tiles 4..8 and 8..12 read input: 2 tiles x 8 columns.
    assert_eq!(conv.engine().calls.load(Ordering::Relaxed), 16);
    assert_eq!(out, case.reference(ShiftConvention::SingleRounding));
}

#[test]
fn scratch_shrinks_with_the_budget() {
    let desc = ConvDescriptor::new([40, 16, 8], [3, 3], 8).with_padding(1, 1);
    let untiled = Conv2d::new(ConvConfig::untiled()).scratch_size::<i8>(&desc).unwrap();
    let g = phases::<i8>(&desc).next().unwrap();
    let tight = ConvConfig::untiled().with_cache_budget(TilePlan::working_set_bytes::<i8>(&g, 8));
    let tiled = Conv2d::new(tight).scratch_size::<i8>(&desc).unwrap();
    assert!(tiled.ring < untiled.ring);
    assert!(tiled.acc < untiled.acc);
    assert_eq!(tiled.acc, 8 * 8);
    assert_eq!(tiled.filter_sums, 8);
    assert_eq!(TilePlan::for_descriptor::<i8>(&desc, tight.cache_budget_bytes).unwrap().tile_height, 8);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn tiled_equals_untiled(
        h in 3usize..24,
        w in 3usize..10,
        c in 1usize..7,
        oc in 1usize..5,
        k in 1usize..4,
        stride in 1usize..3,
        pad in 0usize..4,
        tile in 1usize..9,
        seed in any::<u64>(),
        nchw in any::<bool>(),
    ) {
        let layout = if nchw { OutputLayout::ChannelFirst } else { OutputLayout::ChannelLast };
        let desc = ConvDescriptor::new([h, w, c], [k, k], oc)
            .with_stride(stride, stride)
            .with_padding(pad, pad)
            .with_layout(layout);
        let case = Case::<i8>::random(desc, seed);
        let g = phases::<i8>(&desc).next().unwrap();
        let budget = TilePlan::working_set_bytes::<i8>(&g, tile);
        let tiled = case.run(ConvConfig::untiled().with_cache_budget(budget));
        let untiled = case.run(ConvConfig::untiled());
        prop_assert_eq!(tiled, untiled);
    }
}

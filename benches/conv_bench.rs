use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qconv::conv::quant::quantize_multiplier;
use qconv::{pack_filters, Conv2d, ConvConfig, ConvDescriptor, QuantParams, Scratch};

fn lcg_i8(seed: &mut u64) -> i8 {
    *seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
    (*seed >> 56) as i8
}

fn bench_shape(c: &mut Criterion, name: &str, desc: ConvDescriptor) {
    let mut seed = 0x1234_5678_9abc_def0u64;
    let input: Vec<i8> = (0..desc.input_len()).map(|_| lcg_i8(&mut seed)).collect();
    let (oc, kh, kw, ch) = (desc.out_channels, desc.kernel_height, desc.kernel_width, desc.input_channels);
    let filters: Vec<i8> = (0..oc * kh * kw * ch).map(|_| lcg_i8(&mut seed)).collect();
    let packed = pack_filters::<i8>(&filters, oc, kh, kw, ch).unwrap();
    let bias = vec![100i32; oc];
    let (m, s) = quantize_multiplier(1.0 / 4096.0);
    let multipliers = vec![m; oc];
    let shifts = vec![s; oc];
    let mut quant = QuantParams::<i8>::new(&bias, &multipliers, &shifts);
    quant.input_zero_point = -3;

    let mut group = c.benchmark_group(name);
    for (label, config) in [("untiled", ConvConfig::untiled()), ("l1", ConvConfig::default())] {
        let conv = Conv2d::new(config);
        let mut scratch = Scratch::new(conv.scratch_size::<i8>(&desc).unwrap());
        let mut out = vec![0i8; desc.output_len()];
        group.bench_function(BenchmarkId::from_parameter(label), |b| {
            b.iter(|| {
                conv.run(&desc, black_box(&input), &packed, &quant, &mut scratch, &mut out).unwrap();
                black_box(out[0])
            })
        });
    }
    group.finish();
}

fn bench_conv(c: &mut Criterion) {
    bench_shape(c, "conv_56x56x32_k3", ConvDescriptor::new([56, 56, 32], [3, 3], 32).with_padding(1, 1));
    bench_shape(c, "conv_28x28x64_k3_s2", ConvDescriptor::new([28, 28, 64], [3, 3], 64).with_padding(1, 1).with_stride(2, 2));
    bench_shape(c, "conv_32x32x16_k3_d2", ConvDescriptor::new([32, 32, 16], [3, 3], 16).with_padding(2, 2).with_dilation(2, 2));
}

criterion_group!(benches, bench_conv);
criterion_main!(benches);

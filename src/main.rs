use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use qconv::conv::quant::quantize_multiplier;
use qconv::{conv2d_reference, pack_filters, Activation, Conv2d, ConvConfig, ConvDescriptor, OutputLayout, QuantParams, Scratch};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Precision {
    I8,
    I16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Layout {
    Nhwc,
    Nchw,
}

#[derive(Parser, Debug)]
#[command(name = "qconv", version, about = "Run and time a quantized 2D convolution on random data")]
struct Args {
    /// Batch size
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Input height
    #[arg(long, default_value_t = 56)]
    height: usize,

    /// Input width
    #[arg(long, default_value_t = 56)]
    width: usize,

    /// Input channels
    #[arg(long, default_value_t = 32)]
    channels: usize,

    /// Output channels
    #[arg(long, default_value_t = 32)]
    out_channels: usize,

    /// Kernel height and width
    #[arg(long, default_value_t = 3)]
    kernel: usize,

    #[arg(long, default_value_t = 1)]
    stride: usize,

    #[arg(long, default_value_t = 1)]
    padding: usize,

    #[arg(long, default_value_t = 1)]
    dilation: usize,

    #[arg(long, value_enum, default_value_t = Layout::Nhwc)]
    layout: Layout,

    #[arg(long, value_enum, default_value_t = Precision::I8)]
    precision: Precision,

    /// Tiling budget in KiB (overrides config and cache detection)
    #[arg(long)]
    cache_kb: Option<usize>,

    /// JSON config file (cache_budget_bytes, shift_convention)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Timed iterations
    #[arg(long, default_value_t = 10)]
    iters: usize,

    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Threads; batch items run in parallel when > 1
    #[arg(long, default_value_t = 1)]
    threads: usize,

    /// Check the output against the direct convolution
    #[arg(long, default_value_t = false)]
    verify: bool,
}

struct Problem<T: Activation> {
    input: Vec<T>,
    filters: Vec<i8>,
    packed: Vec<i8>,
    bias: Vec<T::Acc>,
    multipliers: Vec<i32>,
    shifts: Vec<i32>,
    input_zero_point: i32,
    output_zero_point: i32,
}

fn random_problem<T: Activation>(desc: &ConvDescriptor, rng: &mut SmallRng) -> Result<Problem<T>>
where
    T::Acc: From<i32>,
{
    let input = (0..desc.input_len()).map(|_| T::from_i32(rng.gen_range(T::MIN..=T::MAX))).collect();
    let (oc, kh, kw, c) = (desc.out_channels, desc.kernel_height, desc.kernel_width, desc.input_channels);
    let filters: Vec<i8> = (0..oc * kh * kw * c).map(|_| rng.gen_range(-127..=127)).collect();
    let packed = pack_filters::<T>(&filters, oc, kh, kw, c).context("packing filters")?;
    let bias = (0..oc).map(|_| T::Acc::from(rng.gen_range(-1000i32..=1000))).collect();
    let mut multipliers = Vec::with_capacity(oc);
    let mut shifts = Vec::with_capacity(oc);
    // Scale chosen so a full receptive field lands roughly in the output range.
    let fan_in = (kh * kw * c).max(1) as f64;
    let span = (T::MAX - T::MIN) as f64;
    for _ in 0..oc {
        let real = rng.gen_range(0.5..2.0) / (fan_in.sqrt() * span);
        let (m, s) = quantize_multiplier(real);
        multipliers.push(m);
        shifts.push(s);
    }
    Ok(Problem {
        input,
        filters,
        packed,
        bias,
        multipliers,
        shifts,
        input_zero_point: rng.gen_range(T::MIN / 4..=T::MAX / 4),
        output_zero_point: rng.gen_range(T::MIN / 4..=T::MAX / 4),
    })
}

fn run<T: Activation>(args: &Args, desc: ConvDescriptor, config: ConvConfig) -> Result<()>
where
    T::Acc: From<i32>,
{
    let mut rng = SmallRng::seed_from_u64(args.seed);
    let p = random_problem::<T>(&desc, &mut rng)?;
    let mut quant = QuantParams::<T>::new(&p.bias, &p.multipliers, &p.shifts);
    quant.input_zero_point = p.input_zero_point;
    quant.output_zero_point = p.output_zero_point;

    let conv = Conv2d::new(config);
    for (g, plan) in conv.plans::<T>(&desc)? {
        info!(
            "phase ({}, {}): out {}x{}, tile height {} x {} tiles",
            g.row.index,
            g.col.index,
            g.out_height(),
            g.out_width(),
            plan.tile_height,
            plan.num_tiles
        );
    }

    // One descriptor per batch item so items can run on separate threads.
    let item = desc.with_batch(1);
    let size = conv.scratch_size::<T>(&item)?;
    println!("scratch: ring={} acc={} filter_sums={} ({} bytes)", size.ring, size.acc, size.filter_sums, size.bytes::<T>());

    let mut output = vec![T::default(); desc.output_len()];
    let pool = rayon::ThreadPoolBuilder::new().num_threads(args.threads.max(1)).build().context("building thread pool")?;
    let run_once = |output: &mut [T]| -> Result<()> {
        if args.threads > 1 {
            pool.install(|| {
                p.input
                    .par_chunks(item.input_len())
                    .zip(output.par_chunks_mut(item.output_len()))
                    .try_for_each_init(
                        || Scratch::<T>::new(size),
                        |scratch, (inp, out)| conv.run(&item, inp, &p.packed, &quant, scratch, out),
                    )
            })?;
        } else {
            let mut scratch = Scratch::<T>::new(size);
            for (inp, out) in p.input.chunks(item.input_len()).zip(output.chunks_mut(item.output_len())) {
                conv.run(&item, inp, &p.packed, &quant, &mut scratch, out)?;
            }
        }
        Ok(())
    };

    run_once(&mut output)?;
    let t0 = Instant::now();
    for _ in 0..args.iters {
        run_once(&mut output)?;
    }
    let dt = t0.elapsed();
    let macs = desc.output_len() * desc.kernel_height * desc.kernel_width * desc.input_channels;
    let per_iter = dt.as_secs_f64() / args.iters.max(1) as f64;
    let gmacs = if per_iter > 0.0 { macs as f64 / per_iter / 1e9 } else { 0.0 };
    println!(
        "{} {}x{}x{}x{} k{} s{} p{} d{} -> {}x{}x{}: {:.3} ms/iter, {:.2} GMAC/s",
        T::NAME,
        desc.batch,
        desc.input_height,
        desc.input_width,
        desc.input_channels,
        desc.kernel_height,
        desc.stride_x,
        desc.padding_x,
        desc.dilation_x,
        desc.out_height(),
        desc.out_width(),
        desc.out_channels,
        per_iter * 1e3,
        gmacs
    );

    if args.verify {
        let mut expected = vec![T::default(); desc.output_len()];
        conv2d_reference(&desc, &p.input, &p.filters, &quant, config.shift_convention, &mut expected)?;
        let mismatches = output.iter().zip(&expected).filter(|(a, b)| a != b).count();
        if mismatches > 0 {
            bail!("{} of {} outputs differ from the direct convolution", mismatches, expected.len());
        }
        println!("verify: ok ({} outputs)", expected.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ConvConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => ConvConfig::default(),
    };
    if let Some(kb) = args.cache_kb {
        config = config.with_cache_budget(kb * 1024);
    }

    let layout = match args.layout {
        Layout::Nhwc => OutputLayout::ChannelLast,
        Layout::Nchw => OutputLayout::ChannelFirst,
    };
    let desc = ConvDescriptor::new([args.height, args.width, args.channels], [args.kernel, args.kernel], args.out_channels)
        .with_batch(args.batch)
        .with_stride(args.stride, args.stride)
        .with_padding(args.padding, args.padding)
        .with_dilation(args.dilation, args.dilation)
        .with_layout(layout);
    desc.validate().context("invalid convolution shape")?;
    info!(
        "cache budget {} bytes, {:?}, i8 dot product: {}",
        config.cache_budget_bytes,
        config.shift_convention,
        qconv::simd::dot_path()
    );

    match args.precision {
        Precision::I8 => run::<i8>(&args, desc, config),
        Precision::I16 => run::<i16>(&args, desc, config),
    }
}

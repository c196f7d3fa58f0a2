#![allow(dead_code)]

use qconv::conv::quant::quantize_multiplier;
use qconv::{conv2d_reference, pack_filters, Activation, Conv2d, ConvConfig, ConvDescriptor, QuantParams, Scratch, ShiftConvention};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Random tensors and per-channel parameters for one descriptor.
pub struct Case<T: Activation> {
    pub desc: ConvDescriptor,
    pub input: Vec<T>,
    /// `[OC][KH][KW][C]`
    pub filters: Vec<i8>,
    /// `[OC][KH][KW][CP]`
    pub packed: Vec<i8>,
    pub bias: Vec<T::Acc>,
    pub multipliers: Vec<i32>,
    pub shifts: Vec<i32>,
    pub input_zero_point: i32,
    pub output_zero_point: i32,
    pub activation_min: i32,
    pub activation_max: i32,
}

impl<T: Activation> Case<T>
where
    T::Acc: From<i32>,
{
    pub fn random(desc: ConvDescriptor, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let input = (0..desc.input_len()).map(|_| T::from_i32(rng.gen_range(T::MIN..=T::MAX))).collect();
        let (oc, kh, kw, c) = (desc.out_channels, desc.kernel_height, desc.kernel_width, desc.input_channels);
        let filters: Vec<i8> = (0..oc * kh * kw * c).map(|_| rng.gen_range(-127..=127)).collect();
        let packed = pack_filters::<T>(&filters, oc, kh, kw, c).unwrap();
        let bias = (0..oc).map(|_| T::Acc::from(rng.gen_range(-5000i32..=5000))).collect();
        let fan_in = (kh * kw * c) as f64;
        let span = (T::MAX - T::MIN) as f64;
        let mut multipliers = Vec::new();
        let mut shifts = Vec::new();
        for _ in 0..oc {
            let (m, s) = quantize_multiplier(rng.gen_range(0.25..4.0) / (fan_in.sqrt() * span));
            multipliers.push(m);
            shifts.push(s);
        }
        Self {
            desc,
            input,
            filters,
            packed,
            bias,
            multipliers,
            shifts,
            input_zero_point: rng.gen_range(T::MIN / 2..=T::MAX / 2),
            output_zero_point: rng.gen_range(T::MIN / 2..=T::MAX / 2),
            activation_min: T::MIN,
            activation_max: T::MAX,
        }
    }
}

impl<T: Activation> Case<T> {
    pub fn quant(&self) -> QuantParams<'_, T> {
        QuantParams {
            bias: &self.bias,
            multipliers: &self.multipliers,
            shifts: &self.shifts,
            input_zero_point: self.input_zero_point,
            output_zero_point: self.output_zero_point,
            activation_min: self.activation_min,
            activation_max: self.activation_max,
        }
    }

    pub fn run(&self, config: ConvConfig) -> Vec<T> {
        let conv = Conv2d::new(config);
        let mut scratch = Scratch::new(conv.scratch_size::<T>(&self.desc).unwrap());
        let mut out = vec![T::default(); self.desc.output_len()];
        conv.run(&self.desc, &self.input, &self.packed, &self.quant(), &mut scratch, &mut out).unwrap();
        out
    }

    pub fn reference(&self, convention: ShiftConvention) -> Vec<T> {
        let mut out = vec![T::default(); self.desc.output_len()];
        conv2d_reference(&self.desc, &self.input, &self.filters, &self.quant(), convention, &mut out).unwrap();
        out
    }
}


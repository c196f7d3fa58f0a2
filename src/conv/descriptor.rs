use serde::{Deserialize, Serialize};

use crate::conv::numeric::Activation;
use crate::conv::quant::{MAX_SHIFT, MIN_SHIFT};
use crate::error::{invalid, ConvError};

/// Output tensor layout; the input is always NHWC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// `(N, OH, OW, OC)`
    #[default]
    ChannelLast,
    /// `(N, OC, OH, OW)`
    ChannelFirst,
}

/// Geometry of one 2D convolution.
///
/// `padding_x`/`padding_y` are the left/top padding; the right/bottom padding
/// is whatever the output size implies. Without an explicit `output_size` the
/// output covers the input padded symmetrically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvDescriptor {
    pub batch: usize,
    pub input_height: usize,
    pub input_width: usize,
    pub input_channels: usize,
    pub kernel_height: usize,
    pub kernel_width: usize,
    pub out_channels: usize,
    pub stride_x: usize,
    pub stride_y: usize,
    pub padding_x: usize,
    pub padding_y: usize,
    pub dilation_x: usize,
    pub dilation_y: usize,
    pub layout: OutputLayout,
    /// Explicit `(height, width)` of the output.
    pub output_size: Option<(usize, usize)>,
}

fn natural_extent(input: usize, padding: usize, effective_kernel: usize, stride: usize) -> usize {
    if stride == 0 {
        return 0;
    }
    (input + 2 * padding).checked_sub(effective_kernel).map_or(0, |v| v / stride + 1)
}

impl ConvDescriptor {
    /// `input = [h, w, c]`, `kernel = [kh, kw]`; stride and dilation 1, no padding.
    pub fn new(input: [usize; 3], kernel: [usize; 2], out_channels: usize) -> Self {
        Self {
            batch: 1,
            input_height: input[0],
            input_width: input[1],
            input_channels: input[2],
            kernel_height: kernel[0],
            kernel_width: kernel[1],
            out_channels,
            stride_x: 1,
            stride_y: 1,
            padding_x: 0,
            padding_y: 0,
            dilation_x: 1,
            dilation_y: 1,
            layout: OutputLayout::ChannelLast,
            output_size: None,
        }
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_stride(mut self, x: usize, y: usize) -> Self {
        self.stride_x = x;
        self.stride_y = y;
        self
    }

    pub fn with_padding(mut self, x: usize, y: usize) -> Self {
        self.padding_x = x;
        self.padding_y = y;
        self
    }

    pub fn with_dilation(mut self, x: usize, y: usize) -> Self {
        self.dilation_x = x;
        self.dilation_y = y;
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_output_size(mut self, height: usize, width: usize) -> Self {
        self.output_size = Some((height, width));
        self
    }

    pub fn effective_kernel_height(&self) -> usize {
        self.kernel_height.saturating_sub(1) * self.dilation_y + 1
    }

    pub fn effective_kernel_width(&self) -> usize {
        self.kernel_width.saturating_sub(1) * self.dilation_x + 1
    }

    pub fn out_height(&self) -> usize {
        match self.output_size {
            Some((h, _)) => h,
            None => natural_extent(self.input_height, self.padding_y, self.effective_kernel_height(), self.stride_y),
        }
    }

    pub fn out_width(&self) -> usize {
        match self.output_size {
            Some((_, w)) => w,
            None => natural_extent(self.input_width, self.padding_x, self.effective_kernel_width(), self.stride_x),
        }
    }

    pub fn is_dilated(&self) -> bool {
        self.dilation_x > 1 || self.dilation_y > 1
    }

    pub fn padded_channels<T: Activation>(&self) -> usize {
        crate::conv::pack::padded_channels::<T>(self.input_channels)
    }

    /// Elements of one batch item of the input.
    pub fn input_item_len(&self) -> usize {
        self.input_height * self.input_width * self.input_channels
    }

    /// Elements of one batch item of the output.
    pub fn output_item_len(&self) -> usize {
        self.out_height() * self.out_width() * self.out_channels
    }

    pub fn input_len(&self) -> usize {
        self.batch * self.input_item_len()
    }

    pub fn output_len(&self) -> usize {
        self.batch * self.output_item_len()
    }

    /// Length of the packed `[OC][KH][KW][CP]` filter tensor.
    pub fn filter_len<T: Activation>(&self) -> usize {
        self.out_channels * self.kernel_height * self.kernel_width * self.padded_channels::<T>()
    }

    /// `(row, column, channel)` strides of one batch item of the output.
    pub fn output_strides(&self) -> (usize, usize, usize) {
        let (oh, ow, oc) = (self.out_height(), self.out_width(), self.out_channels);
        match self.layout {
            OutputLayout::ChannelLast => (ow * oc, oc, 1),
            OutputLayout::ChannelFirst => (ow, 1, oh * ow),
        }
    }

    /// Shape and geometry checks; no tensor data is inspected.
    pub fn validate(&self) -> Result<(), ConvError> {
        let positive = [
            ("batch", self.batch),
            ("input_height", self.input_height),
            ("input_width", self.input_width),
            ("input_channels", self.input_channels),
            ("kernel_height", self.kernel_height),
            ("kernel_width", self.kernel_width),
            ("out_channels", self.out_channels),
            ("stride_x", self.stride_x),
            ("stride_y", self.stride_y),
            ("dilation_x", self.dilation_x),
            ("dilation_y", self.dilation_y),
        ];
        for (name, v) in positive {
            if v == 0 {
                return Err(invalid(format!("{} must be > 0", name)));
            }
        }
        if self.is_dilated() && (self.stride_x != 1 || self.stride_y != 1) {
            return Err(ConvError::Unsupported(format!(
                "dilation ({}, {}) with stride ({}, {})",
                self.dilation_x, self.dilation_y, self.stride_x, self.stride_y
            )));
        }
        if self.effective_kernel_height() > self.input_height + 2 * self.padding_y {
            return Err(invalid(format!(
                "kernel height {} exceeds padded input height {}",
                self.effective_kernel_height(),
                self.input_height + 2 * self.padding_y
            )));
        }
        if self.effective_kernel_width() > self.input_width + 2 * self.padding_x {
            return Err(invalid(format!(
                "kernel width {} exceeds padded input width {}",
                self.effective_kernel_width(),
                self.input_width + 2 * self.padding_x
            )));
        }
        if self.out_height() == 0 || self.out_width() == 0 {
            return Err(invalid("output size must be > 0"));
        }
        Ok(())
    }

    /// [`ConvDescriptor::validate`] plus the accumulator bound of `T`: one
    /// output may sum at most `T::MAX_TAPS` products of `kh * kw * CP`.
    pub fn validate_for<T: Activation>(&self) -> Result<(), ConvError> {
        self.validate()?;
        let taps = self
            .kernel_height
            .saturating_mul(self.kernel_width)
            .saturating_mul(self.padded_channels::<T>());
        if taps > T::MAX_TAPS {
            return Err(invalid(format!(
                "{} taps per output overflow the {} accumulator (max {})",
                taps,
                T::NAME,
                T::MAX_TAPS
            )));
        }
        Ok(())
    }
}

/// Per-output-channel requantization parameters and zero points.
#[derive(Debug, Clone, Copy)]
pub struct QuantParams<'a, T: Activation> {
    pub bias: &'a [T::Acc],
    pub multipliers: &'a [i32],
    pub shifts: &'a [i32],
    pub input_zero_point: i32,
    pub output_zero_point: i32,
    pub activation_min: i32,
    pub activation_max: i32,
}

impl<'a, T: Activation> QuantParams<'a, T> {
    /// Full-range clamp, zero points 0.
    pub fn new(bias: &'a [T::Acc], multipliers: &'a [i32], shifts: &'a [i32]) -> Self {
        Self {
            bias,
            multipliers,
            shifts,
            input_zero_point: 0,
            output_zero_point: 0,
            activation_min: T::MIN,
            activation_max: T::MAX,
        }
    }

    pub fn validate(&self, out_channels: usize) -> Result<(), ConvError> {
        for (name, len) in [("bias", self.bias.len()), ("multipliers", self.multipliers.len()), ("shifts", self.shifts.len())] {
            if len != out_channels {
                return Err(invalid(format!("{} has {} entries, expected {}", name, len, out_channels)));
            }
        }
        if let Some((c, s)) = self.shifts.iter().enumerate().find(|(_, s)| !(MIN_SHIFT..=MAX_SHIFT).contains(*s)) {
            return Err(invalid(format!("shift {} for channel {} outside [{}, {}]", s, c, MIN_SHIFT, MAX_SHIFT)));
        }
        if let Some((c, m)) = self.multipliers.iter().enumerate().find(|(_, m)| **m < 0) {
            return Err(invalid(format!("negative multiplier {} for channel {}", m, c)));
        }
        let range = T::MIN..=T::MAX;
        for (name, zp) in [("input_zero_point", self.input_zero_point), ("output_zero_point", self.output_zero_point)] {
            if !range.contains(&zp) {
                return Err(invalid(format!("{} {} outside {} range", name, zp, T::NAME)));
            }
        }
        if !range.contains(&self.activation_min) || !range.contains(&self.activation_max) || self.activation_min > self.activation_max {
            return Err(invalid(format!(
                "activation range [{}, {}] invalid for {}",
                self.activation_min,
                self.activation_max,
                T::NAME
            )));
        }
        Ok(())
    }
}

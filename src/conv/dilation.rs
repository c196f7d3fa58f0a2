//! Dilation phase splitter.
//!
//! With stride 1, output column `j` only touches padded input columns
//! `j + kx * d`, all congruent to `j` modulo `d`. Phase `pw = j mod d` is
//! therefore an ordinary stride-1, non-dilated convolution over every `d`-th
//! padded column, and its outputs are every `d`-th output column starting at
//! `pw`. The same holds for rows, giving `dy * dx` independent phases.
//! A non-dilated descriptor is a single phase carrying its own strides.

use crate::conv::descriptor::ConvDescriptor;
use crate::conv::numeric::Activation;
use crate::conv::padding::AxisSplit;

/// One axis of one phase. All counts are in phase (sub-sampled) units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisPhase {
    pub index: usize,
    /// Dilation along the axis; the step between phase elements.
    pub step: usize,
    /// Padding positions before the first real input of the phase.
    pub leading_pad: usize,
    /// Input index of the phase's first real element.
    pub first_input: usize,
    pub input_len: usize,
    /// Padding positions needed after the last real input.
    pub trailing_pad: usize,
    /// Outputs `index, index + step, ...` produced by this phase.
    pub out_points: usize,
}

impl AxisPhase {
    /// `padding`/`input`/`out` are in full-tensor units; `kernel` is the
    /// non-dilated kernel size and `stride` the phase stride (1 if dilated).
    pub fn new(index: usize, dilation: usize, padding: usize, input: usize, kernel: usize, stride: usize, out: usize) -> Self {
        debug_assert!(index < dilation);
        let leading_pad = if padding > index { (padding - index).div_ceil(dilation) } else { 0 };
        let first_input = (index as isize - padding as isize).rem_euclid(dilation as isize) as usize;
        let input_len = if input > first_input { (input - first_input).div_ceil(dilation) } else { 0 };
        let out_points = if out > index { (out - index).div_ceil(dilation) } else { 0 };
        let extent = if out_points == 0 { 0 } else { (out_points - 1) * stride + kernel };
        let trailing_pad = extent.saturating_sub(leading_pad + input_len);
        Self { index, step: dilation, leading_pad, first_input, input_len, trailing_pad, out_points }
    }
}

/// Everything the tiling controller needs to run one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseGeometry {
    pub row: AxisPhase,
    pub col: AxisPhase,
    pub channels: usize,
    pub channels_padded: usize,
    pub out_channels: usize,
    pub kernel_height: usize,
    pub kernel_width: usize,
    pub stride_y: usize,
    pub stride_x: usize,
}

impl PhaseGeometry {
    pub fn in_height(&self) -> usize {
        self.row.input_len
    }

    pub fn in_width(&self) -> usize {
        self.col.input_len
    }

    pub fn pad_top(&self) -> usize {
        self.row.leading_pad
    }

    pub fn pad_left(&self) -> usize {
        self.col.leading_pad
    }

    pub fn out_height(&self) -> usize {
        self.row.out_points
    }

    pub fn out_width(&self) -> usize {
        self.col.out_points
    }

    pub fn is_empty(&self) -> bool {
        self.out_height() == 0 || self.out_width() == 0
    }

    /// Length of one packed filter, `kh * kw * CP`.
    pub fn filter_len(&self) -> usize {
        self.kernel_height * self.kernel_width * self.channels_padded
    }

    pub fn column_split(&self) -> AxisSplit {
        AxisSplit::new(self.pad_left(), self.in_width(), self.kernel_width, self.stride_x, self.out_width())
    }
}

/// Phases of `desc` in row-major `(ph, pw)` order, including empty ones.
pub fn phases<T: Activation>(desc: &ConvDescriptor) -> impl Iterator<Item = PhaseGeometry> + '_ {
    let (dy, dx) = (desc.dilation_y, desc.dilation_x);
    let (oh, ow) = (desc.out_height(), desc.out_width());
    let channels_padded = desc.padded_channels::<T>();
    (0..dy).flat_map(move |ph| {
        let row = AxisPhase::new(ph, dy, desc.padding_y, desc.input_height, desc.kernel_height, desc.stride_y, oh);
        (0..dx).map(move |pw| PhaseGeometry {
            row,
            col: AxisPhase::new(pw, dx, desc.padding_x, desc.input_width, desc.kernel_width, desc.stride_x, ow),
            channels: desc.input_channels,
            channels_padded,
            out_channels: desc.out_channels,
            kernel_height: desc.kernel_height,
            kernel_width: desc.kernel_width,
            stride_y: desc.stride_y,
            stride_x: desc.stride_x,
        })
    })
}

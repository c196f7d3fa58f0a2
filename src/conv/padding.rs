//! Pad-only output regions.
//!
//! An output position whose receptive field lies entirely in the synthetic
//! padding equals the requantized bias, independent of the input. Counts are
//! per axis, for a non-dilated kernel (dilation is removed by the phase
//! splitter before these are applied).

use std::ops::Range;

use crate::conv::numeric::Activation;
use crate::conv::requantizer::Requantizer;
use crate::conv::view::OutputView;

/// Leading outputs whose window `[j*s - p, j*s - p + k)` ends before input 0.
#[inline]
pub fn left_pad_count(padding: usize, kernel: usize, stride: usize, out: usize) -> usize {
    if padding < kernel {
        return 0;
    }
    ((padding - kernel) / stride + 1).min(out)
}

/// First output whose window starts at or after input `input`.
#[inline]
pub fn right_pad_start(padding: usize, input: usize, stride: usize) -> usize {
    (padding + input + stride - 1) / stride
}

/// Trailing pad-only outputs; never overlaps the leading ones.
#[inline]
pub fn right_pad_count(padding: usize, input: usize, kernel: usize, stride: usize, out: usize) -> usize {
    let leading = left_pad_count(padding, kernel, stride, out);
    out - right_pad_start(padding, input, stride).max(leading).min(out)
}

/// Partition of one output axis into pad-only and convolved outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSplit {
    pub leading: usize,
    pub body: usize,
    pub trailing: usize,
}

impl AxisSplit {
    pub fn new(padding: usize, input: usize, kernel: usize, stride: usize, out: usize) -> Self {
        let leading = left_pad_count(padding, kernel, stride, out);
        let trailing = right_pad_count(padding, input, kernel, stride, out);
        Self { leading, body: out - leading - trailing, trailing }
    }

    pub fn body_range(&self) -> Range<usize> {
        self.leading..self.leading + self.body
    }

    pub fn trailing_range(&self) -> Range<usize> {
        let start = self.leading + self.body;
        start..start + self.trailing
    }
}

/// Write the bias-only value to every channel of `rows x cols`.
pub(crate) fn fill_bias<T: Activation>(req: &Requantizer<'_, T>, out: &mut OutputView<'_, T>, rows: Range<usize>, cols: Range<usize>) {
    if rows.is_empty() || cols.is_empty() {
        return;
    }
    for oc in 0..out.channels {
        let v = req.bias_only(oc);
        for r in rows.clone() {
            for c in cols.clone() {
                out.set(r, c, oc, v);
            }
        }
    }
}

/// Fill the leading pad-only columns over all rows; returns their count.
pub(crate) fn left_pad_columns<T: Activation>(split: &AxisSplit, req: &Requantizer<'_, T>, out: &mut OutputView<'_, T>) -> usize {
    let rows = 0..out.height;
    fill_bias(req, out, rows, 0..split.leading);
    split.leading
}

/// Fill the trailing pad-only columns over all rows; returns their count.
pub(crate) fn right_pad_columns<T: Activation>(split: &AxisSplit, req: &Requantizer<'_, T>, out: &mut OutputView<'_, T>) -> usize {
    let rows = 0..out.height;
    fill_bias(req, out, rows, split.trailing_range());
    split.trailing
}

/// Fill output rows whose inputs are all padding, over `cols`.
pub(crate) fn pad_rows<T: Activation>(req: &Requantizer<'_, T>, out: &mut OutputView<'_, T>, rows: Range<usize>, cols: Range<usize>) {
    fill_bias(req, out, rows, cols);
}

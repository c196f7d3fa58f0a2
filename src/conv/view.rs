//! Strided views over the input and output tensors of one batch item.
//!
//! Dilation phases read every `d`-th input row/column and write every `d`-th
//! output row/column; both are expressed by multiplying the strides.

/// Read-only `(height, width, channels)` view; channels are contiguous.
#[derive(Debug, Clone, Copy)]
pub struct InputView<'a, T> {
    data: &'a [T],
    offset: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    row_stride: usize,
    col_stride: usize,
}

impl<'a, T> InputView<'a, T> {
    /// View over a dense HWC slice.
    pub fn hwc(data: &'a [T], height: usize, width: usize, channels: usize) -> Self {
        debug_assert!(data.len() >= height * width * channels);
        Self { data, offset: 0, height, width, channels, row_stride: width * channels, col_stride: channels }
    }

    /// Every `step_y`-th row from `first_row` and every `step_x`-th column from
    /// `first_col`, `rows x cols` of them.
    pub fn subsample(&self, first_row: usize, first_col: usize, rows: usize, cols: usize, step_y: usize, step_x: usize) -> Self {
        let offset = if rows == 0 || cols == 0 {
            self.offset
        } else {
            debug_assert!(first_row + (rows - 1) * step_y < self.height);
            debug_assert!(first_col + (cols - 1) * step_x < self.width);
            self.offset + first_row * self.row_stride + first_col * self.col_stride
        };
        Self {
            data: self.data,
            offset,
            height: rows,
            width: cols,
            channels: self.channels,
            row_stride: self.row_stride * step_y,
            col_stride: self.col_stride * step_x,
        }
    }

    /// Channels of pixel `(y, x)`, or `None` when it lies in the padding.
    #[inline]
    pub fn pixel(&self, y: isize, x: isize) -> Option<&'a [T]> {
        if y < 0 || x < 0 || y as usize >= self.height || x as usize >= self.width {
            return None;
        }
        let start = self.offset + y as usize * self.row_stride + x as usize * self.col_stride;
        Some(&self.data[start..start + self.channels])
    }
}

/// Mutable `(height, width, channels)` view with arbitrary strides.
#[derive(Debug)]
pub struct OutputView<'a, T> {
    data: &'a mut [T],
    offset: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    row_stride: usize,
    col_stride: usize,
    chan_stride: usize,
}

impl<'a, T: Copy> OutputView<'a, T> {
    /// `strides` is `(row, column, channel)`.
    pub fn new(data: &'a mut [T], height: usize, width: usize, channels: usize, strides: (usize, usize, usize)) -> Self {
        let (row_stride, col_stride, chan_stride) = strides;
        Self { data, offset: 0, height, width, channels, row_stride, col_stride, chan_stride }
    }

    /// Rows `first_row, first_row + step_y, ...` and likewise for columns.
    pub fn interleaved(
        &mut self,
        first_row: usize,
        first_col: usize,
        rows: usize,
        cols: usize,
        step_y: usize,
        step_x: usize,
    ) -> OutputView<'_, T> {
        OutputView {
            offset: self.offset + first_row * self.row_stride + first_col * self.col_stride,
            data: &mut *self.data,
            height: rows,
            width: cols,
            channels: self.channels,
            row_stride: self.row_stride * step_y,
            col_stride: self.col_stride * step_x,
            chan_stride: self.chan_stride,
        }
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, channel: usize, v: T) {
        debug_assert!(row < self.height && col < self.width && channel < self.channels);
        let idx = self.offset + row * self.row_stride + col * self.col_stride + channel * self.chan_stride;
        self.data[idx] = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subsample_reads_strided_pixels() {
        // 4x4x1 with value = y * 4 + x
        let data: Vec<i8> = (0..16).collect();
        let v = InputView::hwc(&data, 4, 4, 1);
        let s = v.subsample(1, 0, 2, 2, 2, 3);
        assert_eq!(s.pixel(0, 0), Some(&[4i8][..]));
        assert_eq!(s.pixel(0, 1), Some(&[7i8][..]));
        assert_eq!(s.pixel(1, 1), Some(&[15i8][..]));
        assert_eq!(s.pixel(2, 0), None);
        assert_eq!(s.pixel(-1, 0), None);
    }

    #[test]
    fn interleaved_writes_land_on_phase_positions() {
        let mut out = vec![0i8; 12]; // 3x4x1
        let mut v = OutputView::new(&mut out, 3, 4, 1, (4, 1, 1));
        {
            let mut p = v.interleaved(1, 1, 1, 2, 2, 2);
            p.set(0, 0, 0, 5);
            p.set(0, 1, 0, 6);
        }
        assert_eq!(out, vec![0, 0, 0, 0, 0, 5, 0, 6, 0, 0, 0, 0]);
    }
}

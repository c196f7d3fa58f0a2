//! Circular input buffer.
//!
//! The ring holds `rows` input rows, each `kernel_width * CP` elements: the
//! `kernel_width` input columns under the current window, channel-padded.
//! Stepping the window `s` columns to the right moves the ring origin by
//! `s * CP`. The newest `s` columns of each row then map onto the slots that
//! held the oldest `s` columns of the next row (of row 0, after the wrap), so
//! only `min(s, kw)` columns per row are reloaded. Output row `i` of a tile reads the `kh`
//! consecutive ring rows starting at `i * sy`, which are contiguous modulo the
//! capacity; the MatVec engine sees that as a matrix with row offset
//! `sy * kw * CP`.

use crate::conv::numeric::Activation;
use crate::conv::view::InputView;

/// Placement of the first window of a tile, in input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Input row held by ring row 0; negative inside the top padding.
    pub first_row: isize,
    pub rows: usize,
    /// Input column of window column 0; negative inside the left padding.
    pub first_col: isize,
    pub kernel_width: usize,
}

pub struct CircularBuffer<'s, T> {
    buf: &'s mut [T],
    channels_padded: usize,
    window: Window,
    /// Physical index of ring row 0, window column 0.
    cursor: usize,
    len: usize,
    pad: T,
}

impl<'s, T: Activation> CircularBuffer<'s, T> {
    /// Elements needed for `rows` rows of `kernel_width` padded columns.
    pub fn capacity_for(rows: usize, kernel_width: usize, channels_padded: usize) -> usize {
        rows * kernel_width * channels_padded
    }

    /// Load the first window. Pixels outside the input, and channel padding
    /// lanes, are filled with `pad` (the input zero point).
    pub fn init(scratch: &'s mut [T], input: &InputView<'_, T>, window: Window, channels_padded: usize, pad: T) -> Self {
        debug_assert!(input.channels <= channels_padded);
        let cap = Self::capacity_for(window.rows, window.kernel_width, channels_padded);
        let mut ring = Self { buf: &mut scratch[..cap], channels_padded, window, cursor: 0, len: 0, pad };
        for row in 0..window.rows {
            for col in 0..window.kernel_width {
                ring.load(input, row, col);
            }
        }
        ring.len = cap;
        ring
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn write_cursor(&self) -> usize {
        self.cursor
    }

    /// Valid elements; equals the capacity once initialized.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Physical index of lane 0 of `(row, col)`. A cell never straddles the
    /// wrap point: the cursor and capacity are multiples of `CP`.
    #[inline]
    pub fn slot(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.window.rows && col < self.window.kernel_width);
        let cap = self.buf.len();
        let at = (self.cursor + (row * self.window.kernel_width + col) * self.channels_padded) % cap;
        debug_assert!(at + self.channels_padded <= cap);
        at
    }

    /// Lane `lane` of window cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize, lane: usize) -> T {
        debug_assert!(lane < self.channels_padded);
        self.buf[self.slot(row, col) + lane]
    }

    fn load(&mut self, input: &InputView<'_, T>, row: usize, col: usize) {
        let at = self.slot(row, col);
        let y = self.window.first_row + row as isize;
        let x = self.window.first_col + col as isize;
        let dst = &mut self.buf[at..at + self.channels_padded];
        match input.pixel(y, x) {
            Some(px) => {
                dst[..px.len()].copy_from_slice(px);
                dst[px.len()..].fill(self.pad);
            }
            None => dst.fill(self.pad),
        }
    }

    /// Slide the window `x_step` columns right. Calls must follow the output
    /// columns in increasing order: the oldest columns are overwritten.
    pub fn advance(&mut self, input: &InputView<'_, T>, x_step: usize) {
        let cap = self.buf.len();
        let kw = self.window.kernel_width;
        self.cursor = (self.cursor + x_step * self.channels_padded) % cap;
        self.window.first_col += x_step as isize;
        let reused = kw - x_step.min(kw);
        for row in 0..self.window.rows {
            for col in reused..kw {
                self.load(input, row, col);
            }
        }
    }

    /// Matrix view: `rows` rows of `kernel_height * kw * CP` elements, row `i`
    /// starting `i * y_stride` ring rows after the origin.
    pub fn view(&self, rows: usize, kernel_height: usize, y_stride: usize) -> RingView<'_, T> {
        let row_len = self.window.kernel_width * self.channels_padded;
        let cols = kernel_height * row_len;
        let row_stride = y_stride * row_len;
        debug_assert!(rows == 0 || (rows - 1) * row_stride + cols <= self.buf.len());
        RingView { buf: self.buf, start: self.cursor, rows, cols, row_stride }
    }
}

/// Read-only matrix over wrapped ring memory.
#[derive(Debug, Clone, Copy)]
pub struct RingView<'a, T> {
    buf: &'a [T],
    start: usize,
    rows: usize,
    cols: usize,
    row_stride: usize,
}

impl<'a, T> RingView<'a, T> {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Row `i` as two contiguous pieces; the second is empty unless the row
    /// wraps past the end of the ring.
    #[inline]
    pub fn row(&self, i: usize) -> (&'a [T], &'a [T]) {
        debug_assert!(i < self.rows);
        let cap = self.buf.len();
        let begin = (self.start + i * self.row_stride) % cap;
        let end = begin + self.cols;
        if end <= cap {
            (&self.buf[begin..end], &[])
        } else {
            (&self.buf[begin..], &self.buf[..end - cap])
        }
    }
}

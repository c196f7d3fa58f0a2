//! Tiling controller.
//!
//! Output rows of a phase are processed in tiles whose working set fits the
//! cache budget. Each tile owns a fresh circular buffer; the only thing carried
//! from one tile to the next is its starting output row.

use std::mem::size_of;
use std::ops::Range;

use log::trace;

use crate::conv::descriptor::ConvDescriptor;
use crate::conv::dilation::{phases, PhaseGeometry};
use crate::conv::matvec::MatVec;
use crate::conv::numeric::Activation;
use crate::conv::padding::{left_pad_columns, pad_rows, right_pad_columns};
use crate::conv::requantizer::Requantizer;
use crate::conv::ring::{CircularBuffer, Window};
use crate::conv::scratch::ScratchSize;
use crate::conv::view::{InputView, OutputView};
use crate::error::ConvError;

/// Rows removed from the tile height per planning step.
pub const TILE_HEIGHT_DECREMENT: usize = 4;
/// Tile heights below the full output height are multiples of this.
pub const TILE_HEIGHT_ALIGN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilePlan {
    pub tile_height: usize,
    pub num_tiles: usize,
}

impl TilePlan {
    /// One tile covering all `out_height` rows.
    pub fn untiled(out_height: usize) -> Self {
        Self { tile_height: out_height, num_tiles: usize::from(out_height > 0) }
    }

    /// Estimated bytes touched while computing one tile of `tile_height` rows.
    pub fn working_set_bytes<T: Activation>(g: &PhaseGeometry, tile_height: usize) -> usize {
        let elem = size_of::<T>();
        let output = tile_height * g.out_width() * g.out_channels * elem;
        let kernel = g.kernel_height * g.kernel_width * g.channels;
        let input = Self::ring_rows(g, tile_height) * g.in_width() * g.channels * elem;
        output + kernel + input + Self::fixed_scratch_bytes::<T>(g, tile_height)
    }

    /// Ring and accumulator bytes for a tile.
    pub fn fixed_scratch_bytes<T: Activation>(g: &PhaseGeometry, tile_height: usize) -> usize {
        Self::scratch_for::<T>(g, tile_height).bytes::<T>()
    }

    /// Input rows a tile of `tile_height` output rows spans.
    pub fn ring_rows(g: &PhaseGeometry, tile_height: usize) -> usize {
        if tile_height == 0 {
            return 0;
        }
        (tile_height - 1) * g.stride_y + g.kernel_height
    }

    fn scratch_for<T: Activation>(g: &PhaseGeometry, tile_height: usize) -> ScratchSize {
        ScratchSize {
            ring: CircularBuffer::<T>::capacity_for(Self::ring_rows(g, tile_height), g.kernel_width, g.channels_padded),
            acc: tile_height * g.out_channels,
            filter_sums: 0,
        }
    }

    /// Largest tile height (shrinking by [`TILE_HEIGHT_DECREMENT`], aligned
    /// down to [`TILE_HEIGHT_ALIGN`]) whose working set fits the budget.
    /// Falls back to the full height when nothing fits.
    pub fn plan<T: Activation>(g: &PhaseGeometry, cache_budget_bytes: usize) -> Self {
        let out_h = g.out_height();
        if g.is_empty() {
            return Self { tile_height: 0, num_tiles: 0 };
        }
        let mut th = out_h;
        while th > 0 && Self::working_set_bytes::<T>(g, th) > cache_budget_bytes {
            th = if th > TILE_HEIGHT_DECREMENT {
                (th - TILE_HEIGHT_DECREMENT) / TILE_HEIGHT_ALIGN * TILE_HEIGHT_ALIGN
            } else {
                0
            };
        }
        if th == 0 {
            th = out_h;
        }
        Self { tile_height: th, num_tiles: out_h.div_ceil(th) }
    }

    /// Plan for the first (for non-dilated descriptors, only) phase.
    pub fn for_descriptor<T: Activation>(desc: &ConvDescriptor, cache_budget_bytes: usize) -> Result<Self, ConvError> {
        desc.validate_for::<T>()?;
        Ok(phases::<T>(desc).next().map_or(Self::untiled(0), |g| Self::plan::<T>(&g, cache_budget_bytes)))
    }

    /// Scratch needed to run this plan on `g`.
    pub fn scratch<T: Activation>(&self, g: &PhaseGeometry) -> ScratchSize {
        Self::scratch_for::<T>(g, self.tile_height)
    }

    /// Output row ranges, top to bottom.
    pub fn tiles(&self, out_height: usize) -> impl Iterator<Item = Range<usize>> {
        let th = self.tile_height;
        (0..self.num_tiles).map(move |t| t * th..((t + 1) * th).min(out_height))
    }
}

/// Runs phases through the pad-region evaluator, circular buffer and engine.
pub(crate) struct PhaseRunner<'a, T: Activation, E> {
    pub(crate) engine: &'a E,
    /// Packed `[OC][KH][KW][CP]` filters.
    pub(crate) filters: &'a [i8],
    pub(crate) req: &'a Requantizer<'a, T>,
    /// Value standing in for padding: the input zero point.
    pub(crate) pad: T,
}

impl<'a, T: Activation, E: MatVec<T>> PhaseRunner<'a, T, E> {
    pub(crate) fn run(
        &self,
        g: &PhaseGeometry,
        plan: &TilePlan,
        input: &InputView<'_, T>,
        ring_scratch: &mut [T],
        acc_scratch: &mut [T::Acc],
        out: &mut OutputView<'_, T>,
    ) {
        let split = g.column_split();
        left_pad_columns(&split, self.req, out);
        right_pad_columns(&split, self.req, out);
        let body = split.body_range();
        if body.is_empty() {
            return;
        }

        let (kh, kw, sy, sx) = (g.kernel_height, g.kernel_width, g.stride_y, g.stride_x);
        let oc = g.out_channels;
        let first_col = (body.start * sx) as isize - g.pad_left() as isize;

        for rows in plan.tiles(g.out_height()) {
            let itr_ih = (rows.start * sy) as isize - g.pad_top() as isize;
            let rows_needed = TilePlan::ring_rows(g, rows.len());
            let lo = itr_ih.max(0);
            let hi = (itr_ih + rows_needed as isize).min(g.in_height() as isize);
            if hi <= lo {
                trace!("tile rows {:?}: padding only", rows);
                pad_rows(self.req, out, rows, body.clone());
                continue;
            }
            let y_padding_cur = (-itr_ih).max(0);
            trace!("tile rows {:?}: input rows {}..{} top pad {}", rows, lo, hi, y_padding_cur);

            let window = Window { first_row: itr_ih, rows: rows_needed, first_col, kernel_width: kw };
            let mut ring = CircularBuffer::init(&mut *ring_scratch, input, window, g.channels_padded, self.pad);
            let acc = &mut acc_scratch[..rows.len() * oc];
            for col in body.clone() {
                if col > body.start {
                    ring.advance(input, sx);
                }
                let view = ring.view(rows.len(), kh, sy);
                self.engine.matvec(&view, self.filters, oc, g.filter_len(), acc);
                for (i, row) in rows.clone().enumerate() {
                    for ch in 0..oc {
                        out.set(row, col, ch, self.req.from_raw(ch, acc[i * oc + ch]));
                    }
                }
            }
        }
    }
}

//! Quantized 2D convolution.
//!
//! [`Conv2d::run`] validates everything once, then for every batch item and
//! every dilation phase: fills pad-only columns, plans tiles, and for each
//! tile either fills pad-only rows or streams the input through a
//! [`ring::CircularBuffer`] into the [`MatVec`] engine.

pub mod descriptor;
pub mod dilation;
pub mod matvec;
pub mod numeric;
pub mod pack;
pub mod padding;
pub mod quant;
pub mod reference;
pub mod ring;
pub mod scratch;
pub mod tiling;
pub mod view;

mod requantizer;

use log::debug;

pub use descriptor::{ConvDescriptor, OutputLayout, QuantParams};
pub use dilation::{phases, AxisPhase, PhaseGeometry};
pub use matvec::{DefaultMatVec, MatVec};
pub use numeric::{Accumulator, Activation};
pub use scratch::{Scratch, ScratchSize};
pub use tiling::TilePlan;

use crate::config::ConvConfig;
use crate::error::{invalid, ConvError};
use requantizer::Requantizer;
use tiling::PhaseRunner;
use view::{InputView, OutputView};

/// A configured convolution kernel: tiling budget, shift convention and the
/// dot-product engine. Holds no per-call state.
#[derive(Debug, Clone)]
pub struct Conv2d<E = DefaultMatVec> {
    config: ConvConfig,
    engine: E,
}

impl Conv2d<DefaultMatVec> {
    pub fn new(config: ConvConfig) -> Self {
        Self { config, engine: DefaultMatVec }
    }
}

impl Default for Conv2d<DefaultMatVec> {
    fn default() -> Self {
        Self::new(ConvConfig::default())
    }
}

impl<E> Conv2d<E> {
    pub fn with_engine(config: ConvConfig, engine: E) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &ConvConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Tile plan of every non-empty phase, in execution order.
    pub fn plans<T: Activation>(&self, desc: &ConvDescriptor) -> Result<Vec<(PhaseGeometry, TilePlan)>, ConvError> {
        desc.validate_for::<T>()?;
        Ok(phases::<T>(desc)
            .filter(|g| !g.is_empty())
            .map(|g| (g, TilePlan::plan::<T>(&g, self.config.cache_budget_bytes)))
            .collect())
    }

    /// Scratch a [`Conv2d::run`] on `desc` needs.
    pub fn scratch_size<T: Activation>(&self, desc: &ConvDescriptor) -> Result<ScratchSize, ConvError> {
        desc.validate_for::<T>()?;
        let mut size = ScratchSize { filter_sums: desc.out_channels, ..ScratchSize::default() };
        for g in phases::<T>(desc).filter(|g| !g.is_empty()) {
            let plan = TilePlan::plan::<T>(&g, self.config.cache_budget_bytes);
            size = size.max(plan.scratch::<T>(&g));
        }
        Ok(size)
    }

    /// Convolve `input` (NHWC) with packed `filters` into `output`.
    ///
    /// On error nothing has been written to `output`.
    pub fn run<T: Activation>(
        &self,
        desc: &ConvDescriptor,
        input: &[T],
        filters: &[i8],
        quant: &QuantParams<'_, T>,
        scratch: &mut Scratch<T>,
        output: &mut [T],
    ) -> Result<(), ConvError>
    where
        E: MatVec<T>,
    {
        desc.validate_for::<T>()?;
        quant.validate(desc.out_channels)?;
        if input.len() != desc.input_len() {
            return Err(invalid(format!("input has {} elements, expected {}", input.len(), desc.input_len())));
        }
        if filters.len() != desc.filter_len::<T>() {
            return Err(invalid(format!(
                "packed filters have {} elements, expected {}",
                filters.len(),
                desc.filter_len::<T>()
            )));
        }
        if output.len() != desc.output_len() {
            return Err(invalid(format!("output has {} elements, expected {}", output.len(), desc.output_len())));
        }
        scratch.check(&self.scratch_size::<T>(desc)?)?;

        let oc = desc.out_channels;
        let Scratch { ring, acc, filter_sums } = scratch;
        let per_filter = desc.kernel_height * desc.kernel_width * desc.padded_channels::<T>();
        requantizer::filter_sums(filters, per_filter, &mut filter_sums[..oc]);
        let req = Requantizer::new(quant, &filter_sums[..oc], self.config.shift_convention);
        let runner = PhaseRunner { engine: &self.engine, filters, req: &req, pad: T::from_i32(quant.input_zero_point) };

        let (oh, ow) = (desc.out_height(), desc.out_width());
        let strides = desc.output_strides();
        let items = input.chunks_exact(desc.input_item_len()).zip(output.chunks_exact_mut(desc.output_item_len()));
        for (b, (inp, outp)) in items.enumerate() {
            let input_view = InputView::hwc(inp, desc.input_height, desc.input_width, desc.input_channels);
            let mut out_view = OutputView::new(outp, oh, ow, oc, strides);
            for g in phases::<T>(desc) {
                if g.is_empty() {
                    continue;
                }
                let plan = TilePlan::plan::<T>(&g, self.config.cache_budget_bytes);
                if b == 0 {
                    debug!(
                        "{} conv phase ({}, {}): in {}x{} pad ({}, {}) out {}x{} cols {:?} tiles {}x{}",
                        T::NAME,
                        g.row.index,
                        g.col.index,
                        g.in_height(),
                        g.in_width(),
                        g.pad_top(),
                        g.pad_left(),
                        g.out_height(),
                        g.out_width(),
                        g.column_split(),
                        plan.num_tiles,
                        plan.tile_height
                    );
                }
                let sub_in = input_view.subsample(g.row.first_input, g.col.first_input, g.in_height(), g.in_width(), g.row.step, g.col.step);
                let mut sub_out = out_view.interleaved(g.row.index, g.col.index, g.out_height(), g.out_width(), g.row.step, g.col.step);
                runner.run(&g, &plan, &sub_in, &mut ring[..], &mut acc[..], &mut sub_out);
            }
        }
        Ok(())
    }
}

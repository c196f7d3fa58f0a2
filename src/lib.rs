// Quantized 2D convolution: circular input buffer, cache-aware tiling,
// dilation phase splitting.
pub mod config;
pub mod conv;
pub mod error;
pub mod platform;
pub mod simd;

// Re-exports for the common call path
pub use config::ConvConfig;
pub use conv::pack::pack_filters;
pub use conv::quant::ShiftConvention;
pub use conv::reference::conv2d_reference;
pub use conv::{
    Activation, Conv2d, ConvDescriptor, DefaultMatVec, MatVec, OutputLayout, QuantParams, Scratch, ScratchSize,
    TilePlan,
};
pub use error::{ConfigError, ConvError};

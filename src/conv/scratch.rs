use std::mem::size_of;

use crate::conv::numeric::Activation;
use crate::error::ConvError;

/// Element counts of the scratch regions one call needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScratchSize {
    /// Circular buffer elements (largest over all dilation phases).
    pub ring: usize,
    /// Raw accumulators, `tile_height * out_channels`.
    pub acc: usize,
    /// One filter sum per output channel.
    pub filter_sums: usize,
}

impl ScratchSize {
    pub fn bytes<T: Activation>(&self) -> usize {
        self.ring * size_of::<T>() + self.acc * size_of::<T::Acc>() + self.filter_sums * size_of::<i64>()
    }

    /// Element-wise maximum.
    pub fn max(self, other: ScratchSize) -> ScratchSize {
        ScratchSize {
            ring: self.ring.max(other.ring),
            acc: self.acc.max(other.acc),
            filter_sums: self.filter_sums.max(other.filter_sums),
        }
    }
}

/// Caller-owned working memory for one convolution call at a time.
///
/// Allocate once with the size from `Conv2d::scratch_size` and reuse it;
/// the convolution itself never allocates.
#[derive(Debug, Clone)]
pub struct Scratch<T: Activation> {
    pub(crate) ring: Vec<T>,
    pub(crate) acc: Vec<T::Acc>,
    pub(crate) filter_sums: Vec<i64>,
}

impl<T: Activation> Scratch<T> {
    pub fn new(size: ScratchSize) -> Self {
        Self {
            ring: vec![T::default(); size.ring],
            acc: vec![T::Acc::default(); size.acc],
            filter_sums: vec![0; size.filter_sums],
        }
    }

    pub fn size(&self) -> ScratchSize {
        ScratchSize { ring: self.ring.len(), acc: self.acc.len(), filter_sums: self.filter_sums.len() }
    }

    pub(crate) fn check(&self, need: &ScratchSize) -> Result<(), ConvError> {
        let have = self.size();
        for (what, needed, got) in [
            ("ring", need.ring, have.ring),
            ("accumulators", need.acc, have.acc),
            ("filter sums", need.filter_sums, have.filter_sums),
        ] {
            if got < needed {
                return Err(ConvError::ScratchTooSmall { what, needed, got });
            }
        }
        Ok(())
    }
}

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conv::quant::ShiftConvention;
use crate::error::ConfigError;
use crate::platform;

/// Tuning knobs for [`crate::Conv2d`]. Missing JSON fields take defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvConfig {
    /// Working-set budget per tile; defaults to the detected L1 data cache.
    pub cache_budget_bytes: usize,
    pub shift_convention: ShiftConvention,
}

impl Default for ConvConfig {
    fn default() -> Self {
        Self { cache_budget_bytes: platform::data_cache_bytes(), shift_convention: ShiftConvention::default() }
    }
}

impl ConvConfig {
    pub fn with_cache_budget(mut self, bytes: usize) -> Self {
        self.cache_budget_bytes = bytes;
        self
    }

    pub fn with_shift_convention(mut self, convention: ShiftConvention) -> Self {
        self.shift_convention = convention;
        self
    }

    /// Never tiles: every phase runs as a single tile.
    pub fn untiled() -> Self {
        Self::default().with_cache_budget(usize::MAX)
    }

    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the convolution entry points.
///
/// Every variant is detected up front, before any output element is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported configuration: {0}")]
    Unsupported(String),
    #[error("scratch {what} too small: need {needed} elements, got {got}")]
    ScratchTooSmall { what: &'static str, needed: usize, got: usize },
}

impl ConvError {
    /// Negative status code for hosts that only understand integer returns.
    pub fn code(&self) -> i32 {
        match self {
            ConvError::InvalidArgument(_) | ConvError::ScratchTooSmall { .. } => -1,
            ConvError::Unsupported(_) => -2,
        }
    }
}

pub(crate) fn invalid(reason: impl Into<String>) -> ConvError {
    ConvError::InvalidArgument(reason.into())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

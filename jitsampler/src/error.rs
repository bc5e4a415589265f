//! Error types for jitsampler
//!
//! Unsupported texture/sampler/operation combinations are not errors: they are
//! stored as permanent empty slots. Contract violations inside the matrix panic.
//! What remains here are failures that cross the public API boundary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Shader parse failed: {0}")]
    ShaderParse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Disk cache I/O error: {0}")]
    DiskCache(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SamplerError>;

impl SamplerError {
    /// True for errors caused by the caller misusing the API (stale or
    /// double-freed handles), as opposed to environmental failures.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SamplerError::InvalidHandle(_))
    }
}

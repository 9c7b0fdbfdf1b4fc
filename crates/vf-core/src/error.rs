//! Error types for VerbForge

use thiserror::Error;

/// Core error type. Degenerate audio data never surfaces here — it is
/// recovered in the pipeline; only setup calls are fallible.
#[derive(Error, Debug)]
pub enum VfError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid block size: {0}")]
    InvalidBlockSize(usize),
}

/// Result type alias
pub type VfResult<T> = Result<T, VfError>;

//! vf-dsp: DSP core for the VerbForge convolution reverb
//!
//! Offline IR pipeline plus the real-time convolver it feeds.
//!
//! ## Modules
//! - `ir` - Reverb types, parameter snapshots, impulse response buffers
//! - `synth` - Seeded synthetic IR generation and the emergency fallback
//! - `post` - Post-processing chain (truncate, damp, balance, decorrelate, normalize)
//! - `validate` - Peak/RMS/density statistics and the VALID/DEGRADED gate
//! - `pipeline` - Full regeneration pipeline with fallback recovery
//! - `convolution` - Uniform partitioned convolution (one-block latency)

pub mod ir;
pub mod synth;
pub mod post;
pub mod validate;
pub mod pipeline;
pub mod convolution;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

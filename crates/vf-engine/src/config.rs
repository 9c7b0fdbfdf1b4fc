//! Engine configuration

use serde::{Deserialize, Serialize};

/// Static configuration captured before `prepare`. All run-time behavior
/// (mix, size, ...) goes through normalized parameters instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Hard IR length cap in seconds (further clamped to the absolute
    /// sample-count maximum)
    pub max_ir_seconds: f64,
    /// Wet crossfade applied on live IR replacement, milliseconds
    pub crossfade_ms: f64,
    /// Dry/wet mix smoothing ramp, milliseconds
    pub mix_smoothing_ms: f64,
    /// Emit one diagnostics record every N blocks
    pub diagnostics_interval_blocks: u64,
    /// Synthesizer seed — fixed so identical parameters reproduce
    /// identical IRs across sessions
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_ir_seconds: 10.0,
            crossfade_ms: 3.0,
            mix_smoothing_ms: 10.0,
            diagnostics_interval_blocks: 64,
            seed: 0x5EED_0001,
        }
    }
}

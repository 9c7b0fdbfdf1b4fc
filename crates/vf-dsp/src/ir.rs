//! Reverb types, parameter snapshots, and impulse response buffers

use serde::{Deserialize, Serialize};
use vf_core::{NormalizedValue, Sample};

/// Absolute maximum IR length (10 seconds @ 192kHz)
pub const MAX_IR_LENGTH: usize = 1_920_000;

/// Shortest selectable tail in seconds
pub const MIN_IR_SECONDS: f64 = 0.2;

/// Longest selectable tail in seconds
pub const MAX_IR_SECONDS: f64 = 10.0;

/// Hard IR length cap for a given sample rate
#[inline]
pub fn max_ir_length(sample_rate: f64) -> usize {
    ((MAX_IR_SECONDS * sample_rate) as usize).min(MAX_IR_LENGTH)
}

/// Reverb character preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReverbType {
    #[default]
    Plate,
    Room,
    Texture,
}

/// Per-type synthesis coefficients — multiplicative scaling over the
/// shared synthesis algorithm, not separate algorithms per type.
#[derive(Debug, Clone, Copy)]
pub struct TypeCoefficients {
    /// Number of discrete early reflections
    pub early_count: usize,
    /// Per-reflection amplitude decay factor
    pub early_decay: f64,
    /// Placement window for the early cluster (seconds)
    pub early_window: f64,
    /// Diffusion buildup time for the late tail (seconds)
    pub density_ramp: f64,
    /// Tail brightness: 0 = plain noise, 1 = first-difference (bright) noise
    pub tilt: f64,
    /// L/R placement offset scaling for early reflections
    pub stereo_spread: f64,
}

impl ReverbType {
    pub fn coefficients(self) -> TypeCoefficients {
        match self {
            // Plate: sparse early field, dense bright tail
            ReverbType::Plate => TypeCoefficients {
                early_count: 12,
                early_decay: 0.82,
                early_window: 0.06,
                density_ramp: 0.02,
                tilt: 0.6,
                stereo_spread: 0.4,
            },
            // Room: pronounced early cluster, darker tail
            ReverbType::Room => TypeCoefficients {
                early_count: 16,
                early_decay: 0.88,
                early_window: 0.1,
                density_ramp: 0.05,
                tilt: 0.2,
                stereo_spread: 0.3,
            },
            // Texture: washy, slow buildup, neutral color
            ReverbType::Texture => TypeCoefficients {
                early_count: 8,
                early_decay: 0.75,
                early_window: 0.08,
                density_ramp: 0.08,
                tilt: 0.4,
                stereo_spread: 0.5,
            },
        }
    }

    pub fn all() -> [ReverbType; 3] {
        [ReverbType::Plate, ReverbType::Room, ReverbType::Texture]
    }

    /// Map a normalized parameter value onto a variant (for host automation)
    pub fn from_normalized(value: f64) -> Self {
        let v = value.clamp(0.0, 1.0);
        let idx = (v * 3.0) as usize;
        Self::all()[idx.min(2)]
    }
}

/// Immutable capture of the reverb parameters driving one regeneration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub reverb_type: ReverbType,
    pub size: NormalizedValue,
    pub damping: NormalizedValue,
    pub mix: NormalizedValue,
    pub early_late_balance: NormalizedValue,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            reverb_type: ReverbType::default(),
            size: NormalizedValue::HALF,
            damping: NormalizedValue::HALF,
            mix: NormalizedValue::HALF,
            early_late_balance: NormalizedValue::HALF,
        }
    }
}

impl ParameterSnapshot {
    /// IR length in samples: size maps exponentially over 0.2-10 s,
    /// clamped to `max_len` (the prepared hard cap).
    pub fn target_length(&self, sample_rate: f64, max_len: usize) -> usize {
        let seconds = self.size.map_log(MIN_IR_SECONDS, MAX_IR_SECONDS);
        ((seconds * sample_rate).round() as usize).clamp(1, max_len.max(1))
    }

    /// True when the change requires running the regeneration pipeline
    /// (anything that alters the stored IR; `mix` alone does not).
    pub fn structurally_differs(&self, other: &Self) -> bool {
        self.reverb_type != other.reverb_type
            || self.size != other.size
            || self.damping != other.damping
            || self.early_late_balance != other.early_late_balance
    }

    /// True when the change invalidates the raw synthesized buffer.
    /// Damping and balance are post stages; they reuse the cached raw IR.
    pub fn requires_resynthesis(&self, other: &Self) -> bool {
        self.reverb_type != other.reverb_type || self.size != other.size
    }
}

/// Stereo impulse response with the snapshot that generated it
#[derive(Debug, Clone)]
pub struct ImpulseResponse {
    pub left: Vec<Sample>,
    pub right: Vec<Sample>,
    pub sample_rate: f64,
    pub snapshot: ParameterSnapshot,
}

impl ImpulseResponse {
    /// Create stereo IR from channel data. Panics if lengths differ.
    pub fn new(
        left: Vec<Sample>,
        right: Vec<Sample>,
        sample_rate: f64,
        snapshot: ParameterSnapshot,
    ) -> Self {
        assert_eq!(left.len(), right.len());
        Self {
            left,
            right,
            sample_rate,
            snapshot,
        }
    }

    /// Length in samples (per channel)
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.len() as f64 / self.sample_rate
    }

    /// Absolute peak across both channels
    pub fn peak(&self) -> Sample {
        self.left
            .iter()
            .chain(self.right.iter())
            .map(|s| s.abs())
            .fold(0.0, f64::max)
    }
}

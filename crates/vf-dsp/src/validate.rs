//! IR validation gate
//!
//! Computes peak, RMS, and nonzero density over a post-processed buffer
//! and issues the VALID/DEGRADED verdict. The density condition is the
//! one that catches a destructively filtered buffer: a single surviving
//! sample near index zero can still pass any peak-only check.

use serde::{Deserialize, Serialize};

use crate::ir::ImpulseResponse;

/// Minimum acceptable peak amplitude
pub const MIN_VALID_PEAK: f64 = 1e-3;

/// Minimum fraction of samples above the magnitude epsilon
pub const MIN_DENSITY: f64 = 0.5;

/// Magnitude threshold for the density count
pub const DENSITY_EPSILON: f64 = 1e-6;

/// Validation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Valid,
    Degraded,
}

/// Statistics computed once per regeneration, never mutated
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValidationReport {
    pub peak_amplitude: f64,
    pub rms_level: f64,
    pub non_zero_ratio: f64,
    pub verdict: Verdict,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.verdict == Verdict::Valid
    }
}

/// Compute the report over both channels of an IR.
pub fn validate(ir: &ImpulseResponse) -> ValidationReport {
    let samples = ir.left.iter().chain(ir.right.iter());
    let total = ir.left.len() + ir.right.len();

    let mut peak: f64 = 0.0;
    let mut sum_sq = 0.0;
    let mut non_zero = 0usize;
    for &s in samples {
        let abs = s.abs();
        peak = peak.max(abs);
        sum_sq += s * s;
        if abs > DENSITY_EPSILON {
            non_zero += 1;
        }
    }

    let rms_level = if total > 0 {
        (sum_sq / total as f64).sqrt()
    } else {
        0.0
    };
    let non_zero_ratio = if total > 0 {
        non_zero as f64 / total as f64
    } else {
        0.0
    };

    let verdict = if peak > MIN_VALID_PEAK && non_zero_ratio > MIN_DENSITY {
        Verdict::Valid
    } else {
        Verdict::Degraded
    };

    ValidationReport {
        peak_amplitude: peak,
        rms_level,
        non_zero_ratio,
        verdict,
    }
}

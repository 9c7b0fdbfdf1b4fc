//! Parameter types for audio processors

use serde::{Deserialize, Serialize};

/// Parameter ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamId(pub u32);

/// Parameter value (normalized 0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedValue(f64);

impl NormalizedValue {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);
    pub const HALF: Self = Self(0.5);

    #[inline]
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Map logarithmically (for frequency, time, etc.)
    #[inline]
    pub fn map_log(self, min: f64, max: f64) -> f64 {
        let log_min = min.ln();
        let log_max = max.ln();
        (log_min + self.0 * (log_max - log_min)).exp()
    }
}

impl Default for NormalizedValue {
    fn default() -> Self {
        Self::HALF
    }
}

/// Parameter change event for lock-free communication
#[derive(Debug, Clone, Copy)]
pub struct ParamChange {
    pub id: ParamId,
    pub value: f64,
}

/// Smoothed parameter with exponential ramp.
///
/// Avoids zipper noise when a live parameter (e.g. dry/wet mix) changes
/// while audio is running. `next()` is called once per sample on the
/// audio thread; `set_target()` from wherever the change originates.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f64,
    target: f64,
    /// Per-sample coefficient: `current += coeff * (target - current)`
    coeff: f64,
}

impl SmoothedParam {
    /// `ramp_ms` is one time constant (~63% of the step).
    pub fn new(initial: f64, ramp_ms: f64, sample_rate: f64) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: Self::coeff_for(ramp_ms, sample_rate),
        }
    }

    fn coeff_for(ramp_ms: f64, sample_rate: f64) -> f64 {
        let samples = (ramp_ms / 1000.0) * sample_rate;
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0_f64 / samples).exp()
        }
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.target
    }

    /// Snap to a value immediately (e.g. on reset).
    pub fn reset(&mut self, value: f64) {
        self.current = value;
        self.target = value;
    }

    pub fn is_smoothing(&self) -> bool {
        (self.current - self.target).abs() > 1e-8
    }

    pub fn set_ramp(&mut self, ramp_ms: f64, sample_rate: f64) {
        self.coeff = Self::coeff_for(ramp_ms, sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_value_clamps() {
        assert_eq!(NormalizedValue::new(1.5).get(), 1.0);
        assert_eq!(NormalizedValue::new(-0.5).get(), 0.0);
    }

    #[test]
    fn map_log_endpoints() {
        let lo = NormalizedValue::ZERO.map_log(0.2, 10.0);
        let hi = NormalizedValue::ONE.map_log(0.2, 10.0);
        assert!((lo - 0.2).abs() < 1e-12);
        assert!((hi - 10.0).abs() < 1e-12);
    }

    #[test]
    fn smoother_ramps_toward_target() {
        let mut p = SmoothedParam::new(0.0, 10.0, 48000.0);
        p.set_target(1.0);
        for _ in 0..48000 {
            p.next();
        }
        assert!((p.next() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn smoother_snaps_on_reset() {
        let mut p = SmoothedParam::new(0.0, 10.0, 48000.0);
        p.reset(1.0);
        assert_eq!(p.next(), 1.0);
        assert!(!p.is_smoothing());
    }
}

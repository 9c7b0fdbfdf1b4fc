//! Synthetic IR generation
//!
//! Pure functions: parameters + seed in, stereo buffer out. The noise
//! source is seeded explicitly per call (ChaCha8), so identical inputs
//! produce bit-identical buffers — the regression suite depends on this.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vf_core::Sample;

use crate::ir::{ImpulseResponse, ParameterSnapshot, max_ir_length};

/// Envelope reaches -60 dB (RT60) at the end of the buffer: ln(1000)
const DECAY_LN_1000: f64 = 6.907755278982137;

/// Minimum tail density at the very start of the diffusion ramp
const RAMP_FLOOR: f64 = 0.15;

/// Fallback burst length in seconds
pub const FALLBACK_SECONDS: f64 = 0.2;

/// Fixed seed for the fallback burst — it must not depend on the
/// (possibly pathological) request that triggered it
const FALLBACK_SEED: u64 = 0x5EED_FA11;

/// Peak ceiling for the fallback (matches the post chain's target)
const FALLBACK_PEAK: f64 = 0.8;

/// Synthesize the raw stereo IR: early-reflection cluster plus an
/// exponentially decaying noise tail with a diffusion buildup ramp.
pub fn synthesize(snapshot: &ParameterSnapshot, sample_rate: f64, seed: u64) -> ImpulseResponse {
    let len = snapshot.target_length(sample_rate, max_ir_length(sample_rate));
    let co = snapshot.reverb_type.coefficients();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut left: Vec<Sample> = vec![0.0; len];
    let mut right: Vec<Sample> = vec![0.0; len];

    // Early reflection cluster: discrete impulses at seed-reproducible
    // offsets, amplitude decaying with reflection index, small constant
    // L/R placement bias per reflection.
    let window = ((co.early_window * sample_rate) as usize).clamp(1, len);
    for i in 0..co.early_count {
        let offset = rng.random_range(0..window);
        let pan = (rng.random::<f64>() - 0.5) * co.stereo_spread;
        let amp = co.early_decay.powi(i as i32);
        left[offset] += amp * (1.0 - pan).min(1.0);
        right[offset] += amp * (1.0 + pan).min(1.0);
    }

    // Late tail: bounded noise under the -60 dB exponential envelope.
    // Emission probability ramps up over the first `density_ramp`
    // seconds, emulating diffusion buildup. Both RNG draws happen every
    // sample so the stream stays aligned regardless of gating.
    let ramp_len = (co.density_ramp * sample_rate) as usize;
    let mut prev = 0.0;
    for n in 0..len {
        let gate: f64 = rng.random();
        let white: f64 = rng.random_range(-1.0..1.0);

        let density = if ramp_len > 0 && n < ramp_len {
            RAMP_FLOOR + (1.0 - RAMP_FLOOR) * (n as f64 / ramp_len as f64)
        } else {
            1.0
        };
        if gate >= density {
            prev = white;
            continue;
        }

        // Brightness tilt as a 2-tap FIR blend (first difference), never
        // a recursive filter
        let colored = (1.0 - co.tilt) * white + co.tilt * (white - prev);
        prev = white;

        let env = (-DECAY_LN_1000 * n as f64 / len as f64).exp();
        let s = colored * env;
        left[n] += s;
        right[n] += s;
    }

    ImpulseResponse::new(left, right, sample_rate, *snapshot)
}

/// Emergency fallback: a short, deterministic, exponentially decaying
/// noise burst normalized to the standard peak ceiling. Passes the
/// validator by construction — every sample of the burst is nonzero and
/// the peak sits exactly at the ceiling.
pub fn fallback(snapshot: &ParameterSnapshot, sample_rate: f64) -> ImpulseResponse {
    let len = ((FALLBACK_SECONDS * sample_rate) as usize).max(1);
    let mut rng = ChaCha8Rng::seed_from_u64(FALLBACK_SEED);

    let mut mono: Vec<Sample> = vec![0.0; len];
    let mut peak: f64 = 0.0;
    for (n, s) in mono.iter_mut().enumerate() {
        let env = (-DECAY_LN_1000 * n as f64 / len as f64).exp();
        // Keep magnitudes away from zero so the density check holds
        let noise: f64 = rng.random_range(0.25..1.0);
        let sign = if rng.random::<bool>() { 1.0 } else { -1.0 };
        *s = sign * noise * env;
        peak = peak.max(s.abs());
    }

    let scale = FALLBACK_PEAK / peak;
    for s in &mut mono {
        *s *= scale;
    }

    ImpulseResponse::new(mono.clone(), mono, sample_rate, *snapshot)
}

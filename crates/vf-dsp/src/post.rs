//! IR post-processing chain
//!
//! Ordered stages over the synthesized buffer: size truncation, damping,
//! early/late balance, stereo decorrelation, normalization.
//!
//! The damping stage is a centered (zero-phase) moving average with
//! energy compensation. A causal one-pole started from zero state is not
//! acceptable here: its transient response suppresses the low-index
//! samples — the early reflections and the leading edge of the tail —
//! and collapses the IR to a handful of surviving samples. The centered
//! moving average has unity DC gain and zero group delay at every
//! frequency, so the leading portion of the buffer passes through intact.

use std::f64::consts::FRAC_PI_2;

use vf_core::Sample;

use crate::ir::{ImpulseResponse, max_ir_length};

/// Peak ceiling after normalization — the only level adjustment in the
/// system; the convolution engine applies none of its own.
pub const NORMALIZATION_PEAK: f64 = 0.8;

/// Linear fade-out length at the truncation point
pub const TRUNCATION_FADE: usize = 512;

/// Early-reflection segment boundary in seconds
const EARLY_SEGMENT_SECONDS: f64 = 0.08;

/// Crossfade span at the early/late gain boundary in seconds
const BALANCE_CROSSFADE_SECONDS: f64 = 0.004;

/// Decorrelation delays in samples, coprime so the two channels never
/// comb at the same frequencies
const DECORRELATION_DELAY_L: usize = 7;
const DECORRELATION_DELAY_R: usize = 11;

/// Delayed-copy share of the decorrelation mix
const DECORRELATION_WET: f64 = 0.1;

/// Largest half-width of the damping window (width = 2*15 + 1 = 31)
const MAX_DAMPING_HALF_WIDTH: f64 = 15.0;

/// Run the full chain in stage order.
pub fn process(ir: &mut ImpulseResponse) {
    let target = ir
        .snapshot
        .target_length(ir.sample_rate, max_ir_length(ir.sample_rate));
    truncate_to_target(ir, target);
    damp(ir);
    balance(ir);
    decorrelate(ir);
    normalize(ir, NORMALIZATION_PEAK);
}

/// Stage 1: crop/extend to `target` samples with a linear fade-out over
/// the final samples so the cut point cannot leave a discontinuity.
pub fn truncate_to_target(ir: &mut ImpulseResponse, target: usize) {
    let target = target.max(1);
    ir.left.resize(target, 0.0);
    ir.right.resize(target, 0.0);

    let fade = TRUNCATION_FADE.min(target);
    let start = target - fade;
    for i in 0..fade {
        let gain = 1.0 - (i + 1) as f64 / fade as f64;
        ir.left[start + i] *= gain;
        ir.right[start + i] *= gain;
    }
}

/// Map the damping parameter to an odd window width (1-31 samples).
/// Odd widths keep the average exactly centered on the input sample.
pub fn damping_window(damping: f64) -> usize {
    let half = (damping.clamp(0.0, 1.0) * MAX_DAMPING_HALF_WIDTH).round() as usize;
    2 * half + 1
}

/// Stage 2: zero-phase moving-average low-pass, energy-compensated so
/// the stage changes total energy only through float rounding.
pub fn damp(ir: &mut ImpulseResponse) {
    let width = damping_window(ir.snapshot.damping.get());
    if width <= 1 {
        return;
    }
    let half = width / 2;
    moving_average_compensated(&mut ir.left, half);
    moving_average_compensated(&mut ir.right, half);
}

/// Centered moving average over `2*half + 1` samples (zero-padded at the
/// edges), rescaled to preserve the channel's total energy.
fn moving_average_compensated(buf: &mut [Sample], half: usize) {
    if buf.is_empty() || half == 0 {
        return;
    }
    let width = 2 * half + 1;
    let energy_pre: f64 = buf.iter().map(|s| s * s).sum();

    // Prefix sums make the window O(1) per sample
    let mut prefix = Vec::with_capacity(buf.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &s in buf.iter() {
        acc += s;
        prefix.push(acc);
    }

    let len = buf.len();
    for (i, out) in buf.iter_mut().enumerate() {
        let lo = i.saturating_sub(half);
        let hi = (i + half + 1).min(len);
        *out = (prefix[hi] - prefix[lo]) / width as f64;
    }

    let energy_post: f64 = buf.iter().map(|s| s * s).sum();
    if energy_post > 0.0 {
        let gain = (energy_pre / energy_post).sqrt();
        for s in buf.iter_mut() {
            *s *= gain;
        }
    }
}

/// Stage 3: independent equal-power gains on the early segment (first
/// ~80 ms) and the late tail, with a short linear crossfade at the
/// boundary so the gain step cannot introduce a discontinuity.
pub fn balance(ir: &mut ImpulseResponse) {
    let b = ir.snapshot.early_late_balance.get();
    let angle = b * FRAC_PI_2;
    let early_gain = angle.cos() * std::f64::consts::SQRT_2;
    let late_gain = angle.sin() * std::f64::consts::SQRT_2;

    let len = ir.len();
    let boundary = ((EARLY_SEGMENT_SECONDS * ir.sample_rate) as usize).min(len);
    let xfade = ((BALANCE_CROSSFADE_SECONDS * ir.sample_rate) as usize).min(boundary);
    let xfade_start = boundary - xfade;

    for i in 0..len {
        let gain = if i < xfade_start {
            early_gain
        } else if i < boundary {
            let t = (i - xfade_start + 1) as f64 / (xfade + 1) as f64;
            early_gain + (late_gain - early_gain) * t
        } else {
            late_gain
        };
        ir.left[i] *= gain;
        ir.right[i] *= gain;
    }
}

/// Stage 4: time-offset stereo decorrelation. Each channel mixes in a
/// small-delayed copy of itself at 90/10; the coprime delays (7 and 11)
/// give the channels distinct comb patterns while the mono sum stays
/// coherent. Width-by-amplitude-modulation (a slow sinusoidal gain) is
/// not an option: it carves periodic level holes into the tail.
pub fn decorrelate(ir: &mut ImpulseResponse) {
    delay_mix(&mut ir.left, DECORRELATION_DELAY_L, DECORRELATION_WET);
    delay_mix(&mut ir.right, DECORRELATION_DELAY_R, DECORRELATION_WET);
}

/// In-place `x[n] = (1-wet)*x[n] + wet*x[n-delay]`. Iterates backwards
/// so the delayed tap always reads pre-mix values.
fn delay_mix(buf: &mut [Sample], delay: usize, wet: f64) {
    let dry = 1.0 - wet;
    for n in (delay..buf.len()).rev() {
        buf[n] = dry * buf[n] + wet * buf[n - delay];
    }
    for n in 0..delay.min(buf.len()) {
        buf[n] *= dry;
    }
}

/// Stage 5: scale so the absolute peak equals `ceiling`.
pub fn normalize(ir: &mut ImpulseResponse, ceiling: f64) {
    let peak = ir.peak();
    if peak > 0.0 {
        let scale = ceiling / peak;
        for s in ir.left.iter_mut().chain(ir.right.iter_mut()) {
            *s *= scale;
        }
    }
}

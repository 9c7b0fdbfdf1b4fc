//! IR pipeline property tests
//!
//! Covers the regeneration pipeline end to end: validity across the
//! parameter grid, determinism, the damping energy contract, the
//! destructive-filter regression guard, and stereo coherence.

use approx::assert_relative_eq;
use vf_core::NormalizedValue;
use vf_dsp::ir::{ImpulseResponse, ParameterSnapshot, ReverbType, max_ir_length};
use vf_dsp::pipeline::{self, ReverbFault};
use vf_dsp::validate::{self, MIN_DENSITY, Verdict};
use vf_dsp::{post, synth};

const SAMPLE_RATE: f64 = 48000.0;
const SEED: u64 = 0x5EED_0001;

fn snapshot(reverb_type: ReverbType, size: f64, damping: f64) -> ParameterSnapshot {
    ParameterSnapshot {
        reverb_type,
        size: NormalizedValue::new(size),
        damping: NormalizedValue::new(damping),
        ..ParameterSnapshot::default()
    }
}

fn energy(buf: &[f64]) -> f64 {
    buf.iter().map(|s| s * s).sum()
}

/// The classic destructive stand-in: a one-pole from zero state whose
/// cutoff collapsed toward DC, with real-time-style flush-to-zero.
fn destructive_chain(ir: &mut ImpulseResponse) {
    for buf in [&mut ir.left, &mut ir.right] {
        let mut state = 0.0;
        for s in buf.iter_mut() {
            state += 1e-10 * (*s - state);
            *s = if state.abs() > 1e-6 { state } else { 0.0 };
        }
    }
}

#[test]
fn pipeline_never_hands_over_degenerate_data() {
    // For every grid point: either the primary validates, or the
    // fallback is engaged and the handed-over IR still meets the
    // density floor.
    for reverb_type in ReverbType::all() {
        for size in [0.0, 0.25, 0.5, 0.75, 1.0] {
            for damping in [0.0, 0.5, 1.0] {
                let snap = snapshot(reverb_type, size, damping);
                let outcome = pipeline::regenerate(&snap, SAMPLE_RATE, SEED);
                assert!(
                    outcome.report.is_valid(),
                    "{reverb_type:?} size {size} damping {damping} produced an invalid active IR"
                );
                assert!(outcome.report.non_zero_ratio > MIN_DENSITY);
            }
        }
    }
}

#[test]
fn identical_snapshot_and_seed_give_bit_identical_output() {
    let snap = snapshot(ReverbType::Texture, 0.6, 0.3);
    let a = pipeline::regenerate(&snap, SAMPLE_RATE, 99);
    let b = pipeline::regenerate(&snap, SAMPLE_RATE, 99);
    assert_eq!(a.ir.left, b.ir.left);
    assert_eq!(a.ir.right, b.ir.right);
}

#[test]
fn scenario_a_plate_half_size_full_damping() {
    let snap = snapshot(ReverbType::Plate, 0.5, 1.0);
    let expected_len = snap.target_length(SAMPLE_RATE, max_ir_length(SAMPLE_RATE));
    // size 0.5 maps to ~1.41 s, ~68k samples at 48 kHz
    assert!((60_000..80_000).contains(&expected_len));

    let outcome = pipeline::regenerate(&snap, SAMPLE_RATE, SEED);
    assert!(!outcome.fallback_engaged);
    assert_eq!(outcome.report.verdict, Verdict::Valid);
    assert!(outcome.report.non_zero_ratio > 0.5);
    assert_eq!(outcome.ir.len(), expected_len);
}

#[test]
fn scenario_b_destructive_damping_engages_fallback() {
    let snap = snapshot(ReverbType::Plate, 0.5, 1.0);
    let outcome = pipeline::regenerate_with(&snap, SAMPLE_RATE, SEED, destructive_chain);

    assert_eq!(outcome.primary_report.verdict, Verdict::Degraded);
    assert!(outcome.fallback_engaged);
    assert_eq!(outcome.fault, Some(ReverbFault::PostProcessingDestructive));

    // The IR handed over is the fallback and still healthy
    let report = validate::validate(&outcome.ir);
    assert!(report.is_valid());
    assert!(report.peak_amplitude > 0.05);
}

#[test]
fn damping_changes_energy_by_no_more_than_ten_percent() {
    for damping in [0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
        let snap = snapshot(ReverbType::Room, 0.4, damping);
        let mut ir = synth::synthesize(&snap, SAMPLE_RATE, SEED);
        let pre = energy(&ir.left) + energy(&ir.right);
        post::damp(&mut ir);
        let post_energy = energy(&ir.left) + energy(&ir.right);
        assert!(
            (post_energy - pre).abs() / pre < 0.1,
            "damping {damping} changed energy by {:.1}%",
            100.0 * (post_energy - pre).abs() / pre
        );
    }
}

#[test]
fn damping_preserves_front_loaded_energy() {
    // Regression guard: when the leading 5% of samples carry most of
    // the energy, the damping stage must not strip them — the exact
    // failure a causal recursive filter from zero state produces.
    let len = 20_000;
    let head = len / 20;
    let mut samples = vec![0.0; len];
    for (i, s) in samples.iter_mut().take(head).enumerate() {
        *s = if i % 2 == 0 { 0.8 } else { -0.5 };
    }
    for (i, s) in samples.iter_mut().enumerate().skip(head) {
        *s = 0.01 * if i % 3 == 0 { 1.0 } else { -1.0 };
    }

    let mut ir = ImpulseResponse::new(
        samples.clone(),
        samples,
        SAMPLE_RATE,
        snapshot(ReverbType::Room, 0.5, 1.0),
    );

    let pre_head = energy(&ir.left[..head]);
    let pre_total = energy(&ir.left);
    assert!(pre_head / pre_total > 0.5, "precondition: front-loaded input");

    post::damp(&mut ir);

    let post_head = energy(&ir.left[..head]);
    assert!(
        post_head > 0.4 * pre_head,
        "leading energy collapsed: {post_head:.4} vs {pre_head:.4}"
    );
}

#[test]
fn decorrelated_output_keeps_mono_sum_coherent() {
    for reverb_type in ReverbType::all() {
        let outcome = pipeline::regenerate(&snapshot(reverb_type, 0.5, 0.2), SAMPLE_RATE, SEED);
        let ir = &outcome.ir;

        let mid: Vec<f64> = ir
            .left
            .iter()
            .zip(ir.right.iter())
            .map(|(l, r)| (l + r) * 0.5)
            .collect();

        let mid_e = energy(&mid);
        let left_e = energy(&ir.left);
        let right_e = energy(&ir.right);
        assert!((mid_e - left_e).abs() / left_e < 0.2);
        assert!((mid_e - right_e).abs() / right_e < 0.2);
    }
}

#[test]
fn post_chain_normalizes_to_the_fixed_ceiling() {
    let outcome = pipeline::regenerate(&snapshot(ReverbType::Plate, 0.2, 0.0), SAMPLE_RATE, SEED);
    assert_relative_eq!(outcome.ir.peak(), post::NORMALIZATION_PEAK, max_relative = 1e-9);
}

#[test]
fn truncation_leaves_no_step_at_the_cut() {
    let snap = snapshot(ReverbType::Room, 0.3, 0.0);
    let outcome = pipeline::regenerate(&snap, SAMPLE_RATE, SEED);
    let ir = &outcome.ir;
    let len = ir.len();

    // The final stretch fades out; the very last samples must be tiny
    let tail_peak = ir.left[len - 16..]
        .iter()
        .map(|s| s.abs())
        .fold(0.0, f64::max);
    assert!(tail_peak < 0.05);
}

#[test]
fn raw_synthesis_is_already_healthy() {
    // The destructive-chain fault classification relies on the raw
    // buffer validating before post-processing; a passthrough chain
    // must therefore come out clean.
    let snap = snapshot(ReverbType::Plate, 0.5, 0.5);
    fn passthrough(_: &mut ImpulseResponse) {}
    let outcome = pipeline::regenerate_with(&snap, SAMPLE_RATE, SEED, passthrough);
    assert!(!outcome.fallback_engaged);
    assert_eq!(outcome.fault, None);
}

//! Regeneration pipeline
//!
//! Synthesize → post-process → validate → (fallback on DEGRADED). Pure:
//! no state survives between calls, so the pipeline can run on the audio
//! callback for bounded sizes or on a background task, with the result
//! handed over through the engine's atomic exchange either way.

use log::{error, warn};
use serde::Serialize;

use crate::ir::{ImpulseResponse, ParameterSnapshot};
use crate::synth;
use crate::validate::{self, ValidationReport};
use crate::{post, validate::Verdict};

/// Degeneration classes, for diagnostics and logs. None of these
/// propagate as errors: every one is recovered locally via the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReverbFault {
    /// The raw synthesized buffer already failed validation
    SynthesisDegenerate,
    /// Synthesis was fine; a post stage collapsed the energy
    PostProcessingDestructive,
    /// Degraded verdict without a distinguishable cause
    ValidationFailed,
}

/// A post chain, injectable so a destructive stage can be simulated in
/// tests and extended chains can be swapped in by the engine.
pub type PostChain = fn(&mut ImpulseResponse);

/// Result of one regeneration cycle
#[derive(Debug, Clone)]
pub struct RegenOutcome {
    /// The IR to swap in — the post-processed primary, or the fallback
    pub ir: ImpulseResponse,
    /// Report for `ir` (what the convolution engine will carry)
    pub report: ValidationReport,
    /// Report for the primary (pre-fallback) candidate
    pub primary_report: ValidationReport,
    pub fallback_engaged: bool,
    pub fault: Option<ReverbFault>,
}

/// Run the full pipeline with the standard post chain.
pub fn regenerate(snapshot: &ParameterSnapshot, sample_rate: f64, seed: u64) -> RegenOutcome {
    regenerate_with(snapshot, sample_rate, seed, post::process)
}

/// Run the full pipeline with a caller-supplied post chain.
pub fn regenerate_with(
    snapshot: &ParameterSnapshot,
    sample_rate: f64,
    seed: u64,
    post_chain: PostChain,
) -> RegenOutcome {
    let raw = synth::synthesize(snapshot, sample_rate, seed);
    finish(raw, post_chain)
}

/// Post-process, validate, and recover a raw synthesized IR. Split out
/// so the engine can feed a cached raw buffer through a changed post
/// chain without resynthesis.
pub fn finish(raw: ImpulseResponse, post_chain: PostChain) -> RegenOutcome {
    let raw_report = validate::validate(&raw);

    let mut ir = raw;
    post_chain(&mut ir);
    let primary_report = validate::validate(&ir);

    if primary_report.is_valid() {
        return RegenOutcome {
            ir,
            report: primary_report,
            primary_report,
            fallback_engaged: false,
            fault: None,
        };
    }

    recover(ir, &raw_report, &primary_report)
}

/// Recovery path for a DEGRADED primary: classify the fault, log it, and
/// substitute the emergency fallback.
pub fn recover(
    primary_ir: ImpulseResponse,
    raw_report: &ValidationReport,
    primary_report: &ValidationReport,
) -> RegenOutcome {
    let fault = classify(raw_report, primary_report);
    warn!(
        "IR validation failed ({:?}: peak {:.6}, rms {:.6}, density {:.3}); engaging fallback",
        fault, primary_report.peak_amplitude, primary_report.rms_level, primary_report.non_zero_ratio
    );

    let fallback = synth::fallback(&primary_ir.snapshot, primary_ir.sample_rate);
    let report = validate::validate(&fallback);
    if !report.is_valid() {
        // Unreachable by construction; if it ever fires the fallback
        // generator itself is broken
        error!("fallback IR failed validation (density {:.3})", report.non_zero_ratio);
    }

    RegenOutcome {
        ir: fallback,
        report,
        primary_report: *primary_report,
        fallback_engaged: true,
        fault: Some(fault),
    }
}

fn classify(raw: &ValidationReport, post: &ValidationReport) -> ReverbFault {
    match (raw.verdict, post.verdict) {
        (Verdict::Degraded, _) => ReverbFault::SynthesisDegenerate,
        (Verdict::Valid, Verdict::Degraded) => ReverbFault::PostProcessingDestructive,
        _ => ReverbFault::ValidationFailed,
    }
}

//! Regeneration state machine
//!
//! Structural parameter changes (type/size/damping, plus balance as a
//! post-chain re-render) traverse:
//!
//! `Idle → Synthesizing → PostProcessing → Validating →
//! {Ready | FallbackReady} → Swapped → Idle`
//!
//! Each request is numbered; the handoff slot always carries the newest
//! product, so a superseded in-flight result is simply never engaged.
//! Type/size changes resynthesize; damping/balance changes reuse the
//! cached raw buffer and re-run only the post chain.

use std::sync::Arc;

use vf_dsp::convolution::PartitionedIr;
use vf_dsp::ir::{ImpulseResponse, ParameterSnapshot};
use vf_dsp::pipeline::{self, PostChain, RegenOutcome};
use vf_dsp::synth;
use vf_dsp::validate::{self, ValidationReport, Verdict};

use crate::handoff::IrHandoff;

/// Where the machine currently is. In the synchronous path the inner
/// phases are transited within one `regenerate` call; they become
/// externally observable when a host drives the pipeline from a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenPhase {
    Idle,
    Synthesizing,
    PostProcessing,
    Validating,
    Ready,
    FallbackReady,
    Swapped,
}

/// What the latest regeneration produced, for diagnostics and the swap.
#[derive(Debug, Clone, Copy)]
pub struct RegenSummary {
    pub generation: u64,
    /// Statistics of the IR actually published (fallback stats when it
    /// was engaged)
    pub report: ValidationReport,
    /// The regeneration's own verdict — Degraded here means the primary
    /// failed and the published IR is the fallback
    pub verdict: Verdict,
    pub fallback_engaged: bool,
}

struct RawCache {
    ir: ImpulseResponse,
}

/// Drives the pipeline and publishes products into the handoff.
pub struct Regenerator {
    sample_rate: f64,
    partition_size: usize,
    max_partitions: usize,
    seed: u64,
    post_chain: PostChain,
    generation: u64,
    phase: RegenPhase,
    raw_cache: Option<RawCache>,
    last: Option<RegenSummary>,
}

impl Regenerator {
    pub fn new(sample_rate: f64, partition_size: usize, max_partitions: usize, seed: u64) -> Self {
        Self {
            sample_rate,
            partition_size,
            max_partitions,
            seed,
            post_chain: vf_dsp::post::process,
            generation: 0,
            phase: RegenPhase::Idle,
            raw_cache: None,
            last: None,
        }
    }

    /// Replace the post chain (extended chains, destructive-stage
    /// simulation in tests).
    pub fn set_post_chain(&mut self, chain: PostChain) {
        self.post_chain = chain;
        self.raw_cache = None;
    }

    pub fn phase(&self) -> RegenPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_summary(&self) -> Option<RegenSummary> {
        self.last
    }

    /// Run one regeneration cycle and publish the product. Returns the
    /// generation number assigned to this request.
    pub fn regenerate(&mut self, snapshot: &ParameterSnapshot, handoff: &IrHandoff) -> u64 {
        self.generation += 1;
        let generation = self.generation;

        let raw = match &self.raw_cache {
            Some(cached) if !snapshot.requires_resynthesis(&cached.ir.snapshot) => {
                // Damping/balance-only change: post stages re-run over
                // the cached raw buffer, no resynthesis
                let mut raw = cached.ir.clone();
                raw.snapshot = *snapshot;
                raw
            }
            _ => {
                self.phase = RegenPhase::Synthesizing;
                let raw = synth::synthesize(snapshot, self.sample_rate, self.seed);
                self.raw_cache = Some(RawCache { ir: raw.clone() });
                raw
            }
        };

        let raw_report = validate::validate(&raw);

        self.phase = RegenPhase::PostProcessing;
        let mut ir = raw;
        (self.post_chain)(&mut ir);

        self.phase = RegenPhase::Validating;
        let primary_report = validate::validate(&ir);

        let outcome = if primary_report.is_valid() {
            RegenOutcome {
                ir,
                report: primary_report,
                primary_report,
                fallback_engaged: false,
                fault: None,
            }
        } else {
            pipeline::recover(ir, &raw_report, &primary_report)
        };

        self.phase = if outcome.fallback_engaged {
            RegenPhase::FallbackReady
        } else {
            RegenPhase::Ready
        };
        self.last = Some(RegenSummary {
            generation,
            report: outcome.report,
            verdict: outcome.primary_report.verdict,
            fallback_engaged: outcome.fallback_engaged,
        });

        let partitioned = PartitionedIr::build(
            &outcome.ir,
            self.partition_size,
            self.max_partitions,
            generation,
        );
        handoff.publish(Arc::new(partitioned));

        generation
    }

    /// Audio side engaged the published product at a block boundary.
    pub fn mark_swapped(&mut self) {
        self.phase = RegenPhase::Swapped;
    }

    /// Swap crossfade completed; the machine returns to rest.
    pub fn mark_idle(&mut self) {
        if self.phase == RegenPhase::Swapped {
            self.phase = RegenPhase::Idle;
        }
    }
}

//! Host-facing convolution reverb unit
//!
//! Holds the active IR and processes fixed-size audio blocks in place.
//! Input is accumulated per sample into partition-sized blocks, so the
//! host may call `process` with any buffer length; added latency is one
//! block regardless of IR length. Live IR replacement happens only at
//! block boundaries, with a short equal-power wet crossfade between the
//! outgoing and incoming banks. The block path takes no locks and
//! performs no allocation.

use std::f64::consts::FRAC_PI_2;

use log::debug;

use vf_core::{
    AudioBuffer, NormalizedValue, ParamChange, ParamId, Sample, SmoothedParam, StereoBuffer,
    VfError, VfResult,
};
use vf_dsp::Processor;
use vf_dsp::convolution::{InputFdl, StereoConvolverBank};
use vf_dsp::ir::{ParameterSnapshot, ReverbType, max_ir_length};
use vf_dsp::pipeline::PostChain;

use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticsRecord, DiagnosticsSink, LevelMeter};
use crate::handoff::{IrHandoff, ParamQueue, RetireQueue};
use crate::regen::{RegenPhase, RegenSummary, Regenerator};

/// Parameter IDs exposed to the host (values normalized to [0,1])
pub mod params {
    use vf_core::ParamId;

    pub const TYPE: ParamId = ParamId(0);
    pub const SIZE: ParamId = ParamId(1);
    pub const DAMPING: ParamId = ParamId(2);
    pub const MIX: ParamId = ParamId(3);
    pub const BALANCE: ParamId = ParamId(4);
}

/// Level meter window in samples
const METER_WINDOW: usize = 4096;

/// Capacity of the control → audio parameter queue
const PARAM_QUEUE_CAPACITY: usize = 256;

/// Capacity of the audio → control IR reclamation queue
const RETIRE_QUEUE_CAPACITY: usize = 16;

/// The real-time convolution reverb unit.
pub struct ConvolutionReverbUnit {
    config: EngineConfig,
    snapshot: ParameterSnapshot,
    handoff: IrHandoff,
    param_queue: ParamQueue,
    retire: RetireQueue,
    regen: Option<Regenerator>,
    dsp: Option<EngineDsp>,
    sink: Option<DiagnosticsSink>,
    sample_rate: f64,
    block_size: usize,
}

/// Audio-side state, allocated in full at prepare time.
struct EngineDsp {
    block_size: usize,
    fdl_l: InputFdl,
    fdl_r: InputFdl,
    banks: [StereoConvolverBank; 2],
    active: usize,
    seen_generation: u64,
    active_summary: Option<RegenSummary>,

    // Swap crossfade
    fading: bool,
    fade_pos: usize,
    fade_len: usize,

    // Per-sample block accumulation
    in_l: Vec<Sample>,
    in_r: Vec<Sample>,
    wet_l: Vec<Sample>,
    wet_r: Vec<Sample>,
    wet_a_l: Vec<Sample>,
    wet_a_r: Vec<Sample>,
    wet_b_l: Vec<Sample>,
    wet_b_r: Vec<Sample>,
    pos: usize,

    mix: SmoothedParam,
    meter_in: LevelMeter,
    meter_out: LevelMeter,
    blocks: u64,
    last_record: Option<DiagnosticsRecord>,
}

impl ConvolutionReverbUnit {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            snapshot: ParameterSnapshot::default(),
            handoff: IrHandoff::new(),
            param_queue: ParamQueue::new(PARAM_QUEUE_CAPACITY),
            retire: RetireQueue::new(RETIRE_QUEUE_CAPACITY),
            regen: None,
            dsp: None,
            sink: None,
            sample_rate: 0.0,
            block_size: 0,
        }
    }

    /// One-time setup: allocates capacity for the hard-cap IR length and
    /// runs the initial regeneration so the unit is audible from the
    /// first block.
    pub fn prepare(&mut self, sample_rate: f64, block_size: usize) -> VfResult<()> {
        if !sample_rate.is_finite() || sample_rate < 8000.0 {
            return Err(VfError::InvalidSampleRate(sample_rate as u32));
        }
        if block_size == 0 {
            return Err(VfError::InvalidBlockSize(block_size));
        }

        let cap_len = ((self.config.max_ir_seconds * sample_rate) as usize)
            .clamp(1, max_ir_length(sample_rate));
        let max_partitions = cap_len.div_ceil(block_size).max(1);
        let fade_len = (((self.config.crossfade_ms / 1000.0) * sample_rate).ceil() as usize).max(1);

        // A re-prepare invalidates anything still in flight: published
        // IRs were partitioned for the old block size
        self.handoff = IrHandoff::new();
        self.param_queue = ParamQueue::new(PARAM_QUEUE_CAPACITY);
        self.retire = RetireQueue::new(RETIRE_QUEUE_CAPACITY);

        self.dsp = Some(EngineDsp {
            block_size,
            fdl_l: InputFdl::new(block_size, max_partitions),
            fdl_r: InputFdl::new(block_size, max_partitions),
            banks: [
                StereoConvolverBank::new(block_size),
                StereoConvolverBank::new(block_size),
            ],
            active: 0,
            seen_generation: 0,
            active_summary: None,
            fading: false,
            fade_pos: 0,
            fade_len,
            in_l: vec![0.0; block_size],
            in_r: vec![0.0; block_size],
            wet_l: vec![0.0; block_size],
            wet_r: vec![0.0; block_size],
            wet_a_l: vec![0.0; block_size],
            wet_a_r: vec![0.0; block_size],
            wet_b_l: vec![0.0; block_size],
            wet_b_r: vec![0.0; block_size],
            pos: 0,
            mix: SmoothedParam::new(
                self.snapshot.mix.get(),
                self.config.mix_smoothing_ms,
                sample_rate,
            ),
            meter_in: LevelMeter::new(METER_WINDOW),
            meter_out: LevelMeter::new(METER_WINDOW),
            blocks: 0,
            last_record: None,
        });

        let mut regen = Regenerator::new(sample_rate, block_size, max_partitions, self.config.seed);
        regen.regenerate(&self.snapshot, &self.handoff);
        self.regen = Some(regen);

        self.sample_rate = sample_rate;
        self.block_size = block_size;
        Ok(())
    }

    /// Normalized parameter updates; out-of-range values are clamped,
    /// never rejected. Structural changes run the regeneration pipeline;
    /// mix changes only re-target the smoother on the audio path.
    pub fn update_parameters(&mut self, changes: &[(ParamId, f64)]) {
        let old = self.snapshot;

        for &(id, value) in changes {
            let v = value.clamp(0.0, 1.0);
            match id {
                params::TYPE => self.snapshot.reverb_type = ReverbType::from_normalized(v),
                params::SIZE => self.snapshot.size = NormalizedValue::new(v),
                params::DAMPING => self.snapshot.damping = NormalizedValue::new(v),
                params::BALANCE => self.snapshot.early_late_balance = NormalizedValue::new(v),
                params::MIX => {
                    self.snapshot.mix = NormalizedValue::new(v);
                    self.param_queue.push(ParamChange { id, value: v });
                }
                _ => debug!("ignoring unknown parameter {:?}", id),
            }
        }

        // Reclaim whatever the audio side retired since last time
        self.retire.drain();

        if let Some(regen) = self.regen.as_mut() {
            if self.snapshot.structurally_differs(&old) {
                regen.regenerate(&self.snapshot, &self.handoff);
            }
        }
    }

    /// Per-block call: the buffer is replaced in place with the
    /// dry/wet-mixed output. Lock-free and allocation-free.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let Some(dsp) = self.dsp.as_mut() else {
            return;
        };
        let Some(regen) = self.regen.as_mut() else {
            return;
        };

        while let Some(change) = self.param_queue.pop() {
            if change.id == params::MIX {
                dsp.mix.set_target(change.value);
            }
        }

        let len = buffer.len();
        let (left, right) = buffer.channels_mut();
        for i in 0..len {
            let dry_l = left[i];
            let dry_r = right[i];
            dsp.meter_in.push((dry_l + dry_r) * 0.5);

            dsp.in_l[dsp.pos] = dry_l;
            dsp.in_r[dsp.pos] = dry_r;
            let wet_l = dsp.wet_l[dsp.pos];
            let wet_r = dsp.wet_r[dsp.pos];

            dsp.pos += 1;
            if dsp.pos == dsp.block_size {
                Self::run_block(
                    dsp,
                    regen,
                    &self.handoff,
                    &mut self.retire,
                    &mut self.sink,
                    self.config.diagnostics_interval_blocks,
                );
                dsp.pos = 0;
            }

            let mix = dsp.mix.next();
            let out_l = dry_l * (1.0 - mix) + wet_l * mix;
            let out_r = dry_r * (1.0 - mix) + wet_r * mix;
            left[i] = out_l;
            right[i] = out_r;
            dsp.meter_out.push((out_l + out_r) * 0.5);
        }
    }

    /// One partition step: engage a pending IR at the boundary, render
    /// wet output from the bank(s), advance the crossfade.
    fn run_block(
        dsp: &mut EngineDsp,
        regen: &mut Regenerator,
        handoff: &IrHandoff,
        retire: &mut RetireQueue,
        sink: &mut Option<DiagnosticsSink>,
        diag_interval: u64,
    ) {
        if !dsp.fading {
            if let Some(ir) = handoff.poll(dsp.seen_generation) {
                dsp.seen_generation = ir.generation();
                let spare = 1 - dsp.active;
                if let Some(old) = dsp.banks[spare].set_ir(ir) {
                    retire.retire(old);
                }
                dsp.banks[spare].reset();

                match regen.last_summary() {
                    Some(summary) if summary.generation == dsp.seen_generation => {
                        dsp.active_summary = Some(summary);
                    }
                    _ => {}
                }
                regen.mark_swapped();

                if dsp.banks[dsp.active].has_ir() {
                    dsp.fading = true;
                    dsp.fade_pos = 0;
                } else {
                    // Nothing to fade from: engage instantly
                    dsp.active = spare;
                    regen.mark_idle();
                }
            }
        }

        dsp.fdl_l.push_block(&dsp.in_l);
        dsp.fdl_r.push_block(&dsp.in_r);

        dsp.banks[dsp.active].process_block(
            &dsp.fdl_l,
            &dsp.fdl_r,
            &mut dsp.wet_a_l,
            &mut dsp.wet_a_r,
        );

        if dsp.fading {
            let spare = 1 - dsp.active;
            dsp.banks[spare].process_block(
                &dsp.fdl_l,
                &dsp.fdl_r,
                &mut dsp.wet_b_l,
                &mut dsp.wet_b_r,
            );

            for i in 0..dsp.block_size {
                let t = ((dsp.fade_pos + i + 1) as f64 / dsp.fade_len as f64).min(1.0);
                let g_new = (t * FRAC_PI_2).sin();
                let g_old = (t * FRAC_PI_2).cos();
                dsp.wet_l[i] = dsp.wet_a_l[i] * g_old + dsp.wet_b_l[i] * g_new;
                dsp.wet_r[i] = dsp.wet_a_r[i] * g_old + dsp.wet_b_r[i] * g_new;
            }

            dsp.fade_pos += dsp.block_size;
            if dsp.fade_pos >= dsp.fade_len {
                let retired = dsp.active;
                dsp.active = spare;
                dsp.fading = false;
                if let Some(old) = dsp.banks[retired].take_ir() {
                    retire.retire(old);
                }
                dsp.banks[retired].reset();
                regen.mark_idle();
            }
        } else {
            dsp.wet_l.copy_from_slice(&dsp.wet_a_l);
            dsp.wet_r.copy_from_slice(&dsp.wet_a_r);
        }

        dsp.blocks += 1;
        if diag_interval > 0 && dsp.blocks % diag_interval == 0 {
            let Some(summary) = dsp.active_summary else {
                return;
            };
            let record = DiagnosticsRecord {
                ir_peak: summary.report.peak_amplitude,
                ir_rms: summary.report.rms_level,
                ir_non_zero_ratio: summary.report.non_zero_ratio,
                input_level: dsp.meter_in.rms(),
                output_level: dsp.meter_out.rms(),
                verdict: summary.verdict,
                fallback_engaged: summary.fallback_engaged,
                generation: summary.generation,
            };
            debug!(
                "reverb diag: gen {} verdict {:?} in {:.4} out {:.4}",
                record.generation, record.verdict, record.input_level, record.output_level
            );
            if let Some(sink) = sink.as_mut() {
                sink(&record);
            }
            dsp.last_record = Some(record);
        }
    }

    /// Install a replacement post chain (extended chains; destructive
    /// stage simulation in tests). Takes effect on the next structural
    /// regeneration.
    pub fn set_post_chain(&mut self, chain: PostChain) {
        if let Some(regen) = self.regen.as_mut() {
            regen.set_post_chain(chain);
        }
    }

    pub fn set_diagnostics_sink(&mut self, sink: DiagnosticsSink) {
        self.sink = Some(sink);
    }

    /// Most recent periodic record, if any interval has elapsed.
    pub fn last_diagnostics(&self) -> Option<DiagnosticsRecord> {
        self.dsp.as_ref().and_then(|dsp| dsp.last_record)
    }

    /// Summary of the regeneration whose IR is currently engaged.
    pub fn active_summary(&self) -> Option<RegenSummary> {
        self.dsp.as_ref().and_then(|dsp| dsp.active_summary)
    }

    pub fn regen_phase(&self) -> RegenPhase {
        self.regen
            .as_ref()
            .map_or(RegenPhase::Idle, |regen| regen.phase())
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.snapshot
    }

    pub fn is_prepared(&self) -> bool {
        self.dsp.is_some()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Added latency in samples: one processing block.
    pub fn latency(&self) -> usize {
        self.block_size
    }

    /// Clear all audio state (input history, overlaps, meters) while
    /// keeping the active IR.
    pub fn reset(&mut self) {
        if let Some(dsp) = self.dsp.as_mut() {
            dsp.fdl_l.reset();
            dsp.fdl_r.reset();
            for bank in &mut dsp.banks {
                bank.reset();
            }
            dsp.in_l.fill(0.0);
            dsp.in_r.fill(0.0);
            dsp.wet_l.fill(0.0);
            dsp.wet_r.fill(0.0);
            dsp.pos = 0;
            let mix = dsp.mix.target();
            dsp.mix.reset(mix);
            dsp.meter_in.reset();
            dsp.meter_out.reset();
        }
    }
}

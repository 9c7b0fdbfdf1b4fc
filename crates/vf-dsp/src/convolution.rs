//! Uniform partitioned convolution
//!
//! A frequency-domain delay line (FDL) holds the spectra of recent input
//! blocks; each convolver bank multiply-accumulates its IR partitions
//! against it and overlap-adds the result. Per-block cost is bounded by
//! the partition count and added latency equals one partition regardless
//! of IR length.
//!
//! The FDL is shared between banks: it carries input only, so a bank
//! swapped in mid-stream convolves the full input history immediately —
//! the new tail is complete from the first block, and the swap crossfade
//! only has to cover the change of IR, not a cold start.
//!
//! All state is allocated up front for the prepared capacity; the block
//! path performs no allocation.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use vf_core::Sample;

use crate::Processor;
use crate::ir::ImpulseResponse;

/// Frequency-domain partitions of one stereo IR at a fixed partition
/// size. Built off the audio thread, immutable afterwards, shared by
/// `Arc` so swapping is a pointer exchange.
pub struct PartitionedIr {
    partition_size: usize,
    ir_len: usize,
    generation: u64,
    left: Vec<Vec<Complex<f64>>>,
    right: Vec<Vec<Complex<f64>>>,
}

impl PartitionedIr {
    /// Partition a stereo IR and precompute per-partition spectra. An IR
    /// longer than `partition_size * max_partitions` is silently clamped
    /// to the prepared capacity.
    pub fn build(
        ir: &ImpulseResponse,
        partition_size: usize,
        max_partitions: usize,
        generation: u64,
    ) -> Self {
        let fft_size = partition_size * 2;
        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_scratch_len()];
        let mut padded = vec![0.0; fft_size];

        let cap = partition_size * max_partitions;
        let ir_len = ir.len().min(cap).max(1);
        let num_partitions = ir_len.div_ceil(partition_size).max(1);

        let mut partition_channel = |samples: &[Sample]| {
            let mut partitions = Vec::with_capacity(num_partitions);
            for p in 0..num_partitions {
                let start = p * partition_size;
                let end = (start + partition_size).min(ir_len);

                padded.fill(0.0);
                padded[..end - start].copy_from_slice(&samples[start..end]);

                let mut spectrum = vec![Complex::new(0.0, 0.0); fft_size / 2 + 1];
                fft.process_with_scratch(&mut padded, &mut spectrum, &mut scratch)
                    .ok();
                partitions.push(spectrum);
            }
            partitions
        };

        let left = partition_channel(&ir.left);
        let right = partition_channel(&ir.right);

        Self {
            partition_size,
            ir_len,
            generation,
            left,
            right,
        }
    }

    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    pub fn num_partitions(&self) -> usize {
        self.left.len()
    }

    /// IR length in samples after any capacity clamp
    pub fn len(&self) -> usize {
        self.ir_len
    }

    pub fn is_empty(&self) -> bool {
        self.ir_len == 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn left_partitions(&self) -> &[Vec<Complex<f64>>] {
        &self.left
    }

    pub fn right_partitions(&self) -> &[Vec<Complex<f64>>] {
        &self.right
    }
}

/// Per-channel input history: forward FFT of each input block into a
/// circular frequency-domain delay line.
pub struct InputFdl {
    partition_size: usize,
    max_partitions: usize,
    fft_forward: Arc<dyn RealToComplex<f64>>,
    scratch: Vec<Complex<f64>>,
    time_scratch: Vec<f64>,
    slots: Vec<Vec<Complex<f64>>>,
    newest: usize,
}

impl InputFdl {
    pub fn new(partition_size: usize, max_partitions: usize) -> Self {
        let fft_size = partition_size * 2;
        let mut planner = RealFftPlanner::<f64>::new();
        let fft_forward = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft_forward.get_scratch_len()];
        let bins = fft_size / 2 + 1;

        Self {
            partition_size,
            max_partitions,
            fft_forward,
            scratch,
            time_scratch: vec![0.0; fft_size],
            slots: (0..max_partitions)
                .map(|_| vec![Complex::new(0.0, 0.0); bins])
                .collect(),
            newest: 0,
        }
    }

    /// FFT one input block (exactly `partition_size` samples) into the
    /// next slot. Alloc-free.
    pub fn push_block(&mut self, input: &[Sample]) {
        debug_assert_eq!(input.len(), self.partition_size);

        self.newest = (self.newest + 1) % self.max_partitions;
        self.time_scratch[..self.partition_size].copy_from_slice(input);
        self.time_scratch[self.partition_size..].fill(0.0);
        self.fft_forward
            .process_with_scratch(
                &mut self.time_scratch,
                &mut self.slots[self.newest],
                &mut self.scratch,
            )
            .ok();
    }

    /// Spectrum of the block pushed `age` blocks ago (0 = most recent)
    #[inline]
    pub fn spectrum(&self, age: usize) -> &[Complex<f64>] {
        let idx = (self.newest + self.max_partitions - (age % self.max_partitions))
            % self.max_partitions;
        &self.slots[idx]
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.fill(Complex::new(0.0, 0.0));
        }
        self.newest = 0;
    }
}

/// MAC + inverse FFT + overlap-add core for one channel.
pub struct PartitionedConvolver {
    partition_size: usize,
    fft_size: usize,
    fft_inverse: Arc<dyn ComplexToReal<f64>>,
    scratch: Vec<Complex<f64>>,
    accum: Vec<Complex<f64>>,
    time_scratch: Vec<f64>,
    overlap: Vec<Sample>,
}

impl PartitionedConvolver {
    pub fn new(partition_size: usize) -> Self {
        let fft_size = partition_size * 2;
        let mut planner = RealFftPlanner::<f64>::new();
        let fft_inverse = planner.plan_fft_inverse(fft_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft_inverse.get_scratch_len()];

        Self {
            partition_size,
            fft_size,
            fft_inverse,
            scratch,
            accum: vec![Complex::new(0.0, 0.0); fft_size / 2 + 1],
            time_scratch: vec![0.0; fft_size],
            overlap: vec![0.0; partition_size],
        }
    }

    /// Convolve the shared input history against `partitions` and write
    /// one output block. Alloc-free.
    pub fn process_block(
        &mut self,
        input: &InputFdl,
        partitions: &[Vec<Complex<f64>>],
        output: &mut [Sample],
    ) {
        debug_assert_eq!(output.len(), self.partition_size);

        self.accum.fill(Complex::new(0.0, 0.0));
        for (age, partition) in partitions.iter().enumerate() {
            let x = input.spectrum(age);
            for ((a, &xi), &hi) in self.accum.iter_mut().zip(x.iter()).zip(partition.iter()) {
                *a += xi * hi;
            }
        }

        self.fft_inverse
            .process_with_scratch(&mut self.accum, &mut self.time_scratch, &mut self.scratch)
            .ok();

        let scale = 1.0 / self.fft_size as f64;
        for i in 0..self.partition_size {
            output[i] = self.time_scratch[i] * scale + self.overlap[i];
            self.overlap[i] = self.time_scratch[i + self.partition_size] * scale;
        }
    }

    pub fn reset(&mut self) {
        self.overlap.fill(0.0);
    }
}

/// One stereo convolver bank holding the IR it currently renders.
pub struct StereoConvolverBank {
    left: PartitionedConvolver,
    right: PartitionedConvolver,
    ir: Option<Arc<PartitionedIr>>,
}

impl StereoConvolverBank {
    pub fn new(partition_size: usize) -> Self {
        Self {
            left: PartitionedConvolver::new(partition_size),
            right: PartitionedConvolver::new(partition_size),
            ir: None,
        }
    }

    /// Install an IR, returning the previous one so the caller can
    /// retire it off the audio thread.
    pub fn set_ir(&mut self, ir: Arc<PartitionedIr>) -> Option<Arc<PartitionedIr>> {
        debug_assert_eq!(ir.partition_size(), self.left.partition_size);
        self.ir.replace(ir)
    }

    /// Remove the IR (bank goes silent), returning it for retirement.
    pub fn take_ir(&mut self) -> Option<Arc<PartitionedIr>> {
        self.ir.take()
    }

    pub fn has_ir(&self) -> bool {
        self.ir.is_some()
    }

    /// Render one wet block from the shared input history. A bank with
    /// no IR emits silence.
    pub fn process_block(
        &mut self,
        input_l: &InputFdl,
        input_r: &InputFdl,
        out_l: &mut [Sample],
        out_r: &mut [Sample],
    ) {
        match &self.ir {
            Some(ir) => {
                self.left.process_block(input_l, ir.left_partitions(), out_l);
                self.right.process_block(input_r, ir.right_partitions(), out_r);
            }
            None => {
                out_l.fill(0.0);
                out_r.fill(0.0);
            }
        }
    }
}

impl Processor for StereoConvolverBank {
    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }

    fn latency(&self) -> usize {
        self.left.partition_size
    }
}

//! Partitioned convolver correctness against a direct reference

use std::sync::Arc;

use vf_dsp::convolution::{InputFdl, PartitionedIr, StereoConvolverBank};
use vf_dsp::ir::{ImpulseResponse, ParameterSnapshot};

/// Direct O(n*m) convolution, the ground truth for small sizes
fn convolve_direct(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    for (n, o) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (k, &h) in kernel.iter().enumerate() {
            if n >= k {
                acc += signal[n - k] * h;
            }
        }
        *o = acc;
    }
    out
}

fn noise(len: usize, mut state: u64) -> Vec<f64> {
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        })
        .collect()
}

#[test]
fn partitioned_matches_direct_convolution() {
    let block = 64;
    let ir_len = 700; // deliberately not a partition multiple
    let kernel = noise(ir_len, 7);
    let signal = noise(block * 16, 3);

    let ir = ImpulseResponse::new(
        kernel.clone(),
        kernel.clone(),
        48000.0,
        ParameterSnapshot::default(),
    );
    let max_partitions = ir_len.div_ceil(block);
    let part = Arc::new(PartitionedIr::build(&ir, block, max_partitions, 1));

    let mut bank = StereoConvolverBank::new(block);
    bank.set_ir(part);
    let mut fdl_l = InputFdl::new(block, max_partitions);
    let mut fdl_r = InputFdl::new(block, max_partitions);

    let mut out = Vec::with_capacity(signal.len());
    let mut out_l = vec![0.0; block];
    let mut out_r = vec![0.0; block];
    for chunk in signal.chunks(block) {
        fdl_l.push_block(chunk);
        fdl_r.push_block(chunk);
        bank.process_block(&fdl_l, &fdl_r, &mut out_l, &mut out_r);
        out.extend_from_slice(&out_l);
    }

    let reference = convolve_direct(&signal, &kernel);
    for (i, (got, want)) in out.iter().zip(reference.iter()).enumerate() {
        assert!(
            (got - want).abs() < 1e-9,
            "sample {i}: {got} vs {want}"
        );
    }
}

#[test]
fn stereo_channels_convolve_independently() {
    let block = 32;
    let left_kernel: Vec<f64> = (0..96).map(|i| 0.95_f64.powi(i)).collect();
    let right_kernel: Vec<f64> = (0..96).map(|i| -(0.9_f64.powi(i))).collect();

    let ir = ImpulseResponse::new(
        left_kernel.clone(),
        right_kernel.clone(),
        48000.0,
        ParameterSnapshot::default(),
    );
    let part = Arc::new(PartitionedIr::build(&ir, block, 4, 1));

    let mut bank = StereoConvolverBank::new(block);
    bank.set_ir(part);
    let mut fdl_l = InputFdl::new(block, 4);
    let mut fdl_r = InputFdl::new(block, 4);

    let mut impulse = vec![0.0; block];
    impulse[0] = 1.0;
    let silence = vec![0.0; block];

    let mut got_l = Vec::new();
    let mut got_r = Vec::new();
    let mut out_l = vec![0.0; block];
    let mut out_r = vec![0.0; block];
    for b in 0..4 {
        let input = if b == 0 { &impulse } else { &silence };
        fdl_l.push_block(input);
        fdl_r.push_block(input);
        bank.process_block(&fdl_l, &fdl_r, &mut out_l, &mut out_r);
        got_l.extend_from_slice(&out_l);
        got_r.extend_from_slice(&out_r);
    }

    for (i, &want) in left_kernel.iter().enumerate() {
        assert!((got_l[i] - want).abs() < 1e-10);
    }
    for (i, &want) in right_kernel.iter().enumerate() {
        assert!((got_r[i] - want).abs() < 1e-10);
    }
}

//! Benchmarks for the partitioned convolver and the regeneration pipeline

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use vf_dsp::convolution::{InputFdl, PartitionedIr, StereoConvolverBank};
use vf_dsp::ir::ParameterSnapshot;
use vf_dsp::pipeline;

fn bench_partitioned_block(c: &mut Criterion) {
    let block = 256;
    let outcome = pipeline::regenerate(&ParameterSnapshot::default(), 48000.0, 1);
    let max_partitions = outcome.ir.len().div_ceil(block);
    let ir = Arc::new(PartitionedIr::build(&outcome.ir, block, max_partitions, 1));

    let mut bank = StereoConvolverBank::new(block);
    bank.set_ir(ir);
    let mut fdl_l = InputFdl::new(block, max_partitions);
    let mut fdl_r = InputFdl::new(block, max_partitions);

    let input = vec![0.25; block];
    let mut out_l = vec![0.0; block];
    let mut out_r = vec![0.0; block];

    c.bench_function("convolve_block_256_default_ir", |b| {
        b.iter(|| {
            fdl_l.push_block(black_box(&input));
            fdl_r.push_block(black_box(&input));
            bank.process_block(&fdl_l, &fdl_r, &mut out_l, &mut out_r);
            black_box(out_l[0])
        })
    });
}

fn bench_regeneration(c: &mut Criterion) {
    let snapshot = ParameterSnapshot::default();
    c.bench_function("regenerate_default_snapshot", |b| {
        b.iter(|| black_box(pipeline::regenerate(black_box(&snapshot), 48000.0, 1).ir.len()))
    });
}

criterion_group!(benches, bench_partitioned_block, bench_regeneration);
criterion_main!(benches);

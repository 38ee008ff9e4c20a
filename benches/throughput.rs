use std::io::Cursor;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use lz4par::{FrameContext, Mode, ReaderSource, StreamDescriptor};
use rand::prelude::*;

fn frame_throughput(c: &mut Criterion) {
    // 16 MiB, half compressible text-ish filler and half random noise.
    let mut data = vec![0u8; 16 * 1024 * 1024];
    for (i, byte) in data[..8 * 1024 * 1024].iter_mut().enumerate() {
        *byte = ((i / 13) % 64) as u8 + b' ';
    }
    thread_rng().fill(&mut data[8 * 1024 * 1024..]);

    let mut sd = StreamDescriptor::default();
    sd.block_size_id(6);

    let mut group = c.benchmark_group("compress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for (name, mode) in [("sequential", Mode::Sequential), ("parallel", Mode::Parallel)] {
        group.bench_function(name, |b| {
            let mut ctx = FrameContext::new();
            ctx.mode(mode);
            b.iter(|| {
                let mut frame = Vec::new();
                ctx.compress(ReaderSource::new(Cursor::new(&data[..])), &mut frame, &sd)
                    .unwrap();
                frame
            })
        });
    }
    group.finish();

    let mut frame = Vec::new();
    FrameContext::new()
        .compress(ReaderSource::new(Cursor::new(&data[..])), &mut frame, &sd)
        .unwrap();

    let mut group = c.benchmark_group("decompress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for (name, mode) in [("sequential", Mode::Sequential), ("parallel", Mode::Parallel)] {
        group.bench_function(name, |b| {
            let mut ctx = FrameContext::new();
            ctx.mode(mode);
            b.iter(|| {
                let mut restored = Vec::new();
                ctx.decompress(ReaderSource::new(Cursor::new(&frame[..])), &mut restored)
                    .unwrap();
                restored
            })
        });
    }
    group.finish();
}

criterion_group!(benches, frame_throughput);
criterion_main!(benches);

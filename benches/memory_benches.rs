use std::sync::Arc;

use criterion::{black_box, criterion_group, BenchmarkId, Criterion, Throughput};
use riffers::{
    copy_between_accessors, CancellationToken, MemoryReadAccessor, MemoryWriteAccessor,
    MultiSegmentReadAccessorFactory, ReadAccessor,
};

use crate::common::generate_payload;

pub fn bench_multi_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("Multi-Segment Reads");
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let cancel = &CancellationToken::new();

    for &n_segments in &[2usize, 64, 4096] {
        let segment_len = 1_048_576 / n_segments;
        let mut factory = MultiSegmentReadAccessorFactory::new();
        for i in 0..n_segments {
            let payload = generate_payload(segment_len, i as u64);
            factory.add(Arc::new(MemoryReadAccessor::new(payload)), segment_len as u64);
        }
        let accessor = &factory.create();
        let total = accessor.len();
        group.throughput(Throughput::Bytes(total));

        group.bench_function(BenchmarkId::new("read_all", n_segments), |b| {
            b.to_async(&rt)
                .iter(|| async move { accessor.read(0, black_box(total), cancel).await.unwrap() })
        });

        // small reads straddling segment boundaries
        group.bench_function(BenchmarkId::new("read_boundaries", n_segments), |b| {
            b.to_async(&rt).iter(|| async move {
                let mut address = segment_len as u64 - 8;
                while address + 16 <= total {
                    black_box(accessor.read(address, 16, cancel).await.unwrap());
                    address += segment_len as u64;
                }
            })
        });

        group.bench_function(BenchmarkId::new("copy_to_memory", n_segments), |b| {
            b.to_async(&rt).iter(|| async move {
                let dst = MemoryWriteAccessor::new();
                copy_between_accessors(accessor, &dst, total, 4096, cancel)
                    .await
                    .unwrap();
                dst.end().unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(memory_benches, bench_multi_segment);

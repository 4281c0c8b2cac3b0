//! Buffer pool throughput benchmarks: sequential page fetches under an
//! undersized pool (forces eviction) versus a pool large enough to hold
//! the whole working set.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use interchangedb::buffer::BufferPoolManager;
use interchangedb::storage::DiskManager;
use tempfile::tempdir;

fn populate(bpm: &BufferPoolManager, n: usize) -> Vec<interchangedb::PageId> {
    (0..n)
        .map(|i| {
            let mut guard = bpm.new_page().unwrap();
            guard.as_mut_slice()[0] = (i % 256) as u8;
            guard.page_id()
        })
        .collect()
}

fn bench_sequential_fetch(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_pool_fetch");
    for pool_size in [8usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(pool_size), &pool_size, |b, &pool_size| {
            let dir = tempdir().unwrap();
            let dm = DiskManager::create(dir.path().join("bench.db")).unwrap();
            let bpm = Arc::new(BufferPoolManager::new(pool_size, dm));
            let page_ids = populate(&bpm, 512);

            b.iter(|| {
                for &pid in &page_ids {
                    let guard = bpm.fetch_page_read(pid).unwrap();
                    std::hint::black_box(guard.as_slice()[0]);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sequential_fetch);
criterion_main!(benches);

//! Benchmarks for blockheap.
//!
//! Run with:
//!     cargo bench

use std::sync::Arc;
use std::thread;

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};

use blockheap::Allocator;

fn bench_store_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_free");

    for size in [16, 256, 4 * 1024] {
        let payload: Vec<u8> = (0..size).map(|i| (i * 7 + 13) as u8).collect();
        let heap = Allocator::with_capacity(1024 * 1024).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(format!("{size}b"), &payload, |b, payload| {
            b.iter(|| {
                let handle = heap.store(black_box(payload)).unwrap();
                black_box(heap.free(handle))
            });
        });
    }

    group.finish();
}

fn bench_fragmented(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented");

    // Every other block freed, so first-fit skips a run of small holes
    let heap = Allocator::with_capacity(1024 * 1024).unwrap();
    let handles: Vec<_> = (0..1024).map(|_| heap.store(&[0; 64]).unwrap()).collect();
    for (i, handle) in handles.into_iter().enumerate() {
        if i % 2 == 0 {
            heap.free(handle);
        }
    }

    group.bench_function("skip_small_holes", |b| {
        b.iter(|| {
            let handle = heap.store(black_box(&[1u8; 128])).unwrap();
            black_box(heap.free(handle))
        });
    });

    group.bench_function("fill_small_hole", |b| {
        b.iter(|| {
            let handle = heap.store(black_box(&[1u8; 32])).unwrap();
            black_box(heap.free(handle))
        });
    });

    group.finish();
}

fn bench_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("access");
    let heap = Allocator::with_capacity(64 * 1024).unwrap();
    let handle = heap.store(&[0xAB; 1024]).unwrap();

    group.throughput(Throughput::Bytes(1024));
    group.bench_function("retrieve_1kb", |b| {
        b.iter(|| black_box(heap.retrieve(black_box(&handle)).unwrap().len()));
    });

    group.bench_function("update_in_place_1kb", |b| {
        b.iter(|| heap.update_in_place(black_box(&handle), &[0xCD; 1024], 0).unwrap());
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended");
    group.sample_size(20);

    for threads in [2, 4] {
        group.bench_function(format!("{threads}_threads"), |b| {
            let heap = Arc::new(Allocator::with_capacity(1024 * 1024).unwrap());
            b.iter(|| {
                let workers: Vec<_> = (0..threads)
                    .map(|_| {
                        let heap = Arc::clone(&heap);
                        thread::spawn(move || {
                            for _ in 0..1000 {
                                let handle = heap.store(&[0; 64]).unwrap();
                                heap.free(handle);
                            }
                        })
                    })
                    .collect();
                for worker in workers {
                    worker.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_store_free,
    bench_fragmented,
    bench_access,
    bench_contended
);
criterion_main!(benches);

//! Criterion-based queue benchmark
//!
//! Run: cargo bench --bench queue_bench

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use surge::{BlockingQueue, QueueMode, RingCore, SyncType};

const QUEUE_CAPACITY: u32 = 64 * 1024;
const EVENTS_PER_ITER: u64 = 100_000;

/// Uncontended hot path: alternating try-ops on an otherwise idle queue.
fn bench_try_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("try_ops");
    group.throughput(Throughput::Elements(1));

    for mode in [QueueMode::Spsc, QueueMode::Mpmc] {
        let ring = RingCore::new(QUEUE_CAPACITY, mode).unwrap();
        group.bench_function(BenchmarkId::new("enqueue_dequeue", format!("{mode:?}")), |b| {
            b.iter(|| {
                ring.try_enqueue(black_box(42)).unwrap();
                black_box(ring.try_dequeue().unwrap());
            });
        });
    }
    group.finish();
}

/// One producer thread against one consumer thread per wait strategy.
fn bench_blocking_pair(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_pair");
    group.throughput(Throughput::Elements(EVENTS_PER_ITER));
    group.sample_size(10);

    for sync in [
        SyncType::EventCount,
        SyncType::Mutex,
        SyncType::Yield,
        SyncType::Semaphore,
        SyncType::Atomic32,
    ] {
        group.bench_function(BenchmarkId::new("spsc", format!("{sync:?}")), |b| {
            b.iter(|| run_pair(QueueMode::Spsc, sync, EVENTS_PER_ITER));
        });
    }
    group.finish();
}

/// Producer/consumer fleets on the MPMC ring with the event-count strategy.
fn bench_mpmc_fleet(c: &mut Criterion) {
    let mut group = c.benchmark_group("mpmc_fleet");
    group.throughput(Throughput::Elements(EVENTS_PER_ITER));
    group.sample_size(10);

    for threads in [2usize, 4] {
        group.bench_function(BenchmarkId::new("producers_consumers", threads), |b| {
            b.iter(|| run_fleet(threads, threads, EVENTS_PER_ITER));
        });
    }
    group.finish();
}

fn run_pair(mode: QueueMode, sync: SyncType, events: u64) -> u64 {
    let queue = Arc::new(BlockingQueue::new(QUEUE_CAPACITY, mode, sync).unwrap());

    let producer_queue = queue.clone();
    let producer = thread::spawn(move || {
        for value in 0..events {
            producer_queue.enqueue(value as usize).unwrap();
        }
        producer_queue.close();
    });

    let mut sum = 0u64;
    while let Ok(value) = queue.dequeue() {
        sum += value as u64;
    }
    producer.join().unwrap();
    black_box(sum)
}

fn run_fleet(producers: usize, consumers: usize, total_events: u64) -> u64 {
    let queue = Arc::new(
        BlockingQueue::new(QUEUE_CAPACITY, QueueMode::Mpmc, SyncType::EventCount).unwrap(),
    );
    let per_producer = total_events / producers as u64;

    let producer_handles: Vec<_> = (0..producers)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                for value in 0..per_producer {
                    queue.enqueue(value as usize).unwrap();
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || {
                let mut sum = 0u64;
                while let Ok(value) = queue.dequeue() {
                    sum += value as u64;
                }
                sum
            })
        })
        .collect();

    for handle in producer_handles {
        handle.join().unwrap();
    }
    queue.close();

    let mut sum = 0u64;
    for handle in consumer_handles {
        sum += handle.join().unwrap();
    }
    black_box(sum)
}

criterion_group!(benches, bench_try_ops, bench_blocking_pair, bench_mpmc_fleet);
criterion_main!(benches);

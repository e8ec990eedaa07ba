//! Long-running stress tests for the surge queue.
//!
//! CI-sized runs execute by default; the full-size variants from the
//! original soak configuration are `#[ignore]`d and run with
//! `cargo test -- --ignored`.

use surge::{QueueMode, SyncType};
use surge_test_support::{run_fleet, FleetConfig};

#[test]
fn test_mpmc_stress_4x4() {
    let config = FleetConfig::new(100_000)
        .with_producers(4)
        .with_consumers(4)
        .with_capacity(1024);
    let outcome = run_fleet(&config);
    outcome.assert_complete(&config);
}

#[test]
#[ignore] // 4 producers x 4 consumers x 1M items
fn test_mpmc_stress_4x4_full() {
    let config = FleetConfig::new(1_000_000)
        .with_producers(4)
        .with_consumers(4)
        .with_capacity(1024);
    let outcome = run_fleet(&config);
    outcome.assert_complete(&config);

    // 4M transfers through a 1024-slot ring cannot all ride the fast path
    assert!(outcome.stats.queue_full_count > 0 || outcome.stats.queue_empty_count > 0);
}

#[test]
fn test_stress_every_strategy() {
    for sync in [
        SyncType::EventCount,
        SyncType::Mutex,
        SyncType::Yield,
        SyncType::Semaphore,
        SyncType::Atomic32,
    ] {
        let config = FleetConfig::new(20_000)
            .with_producers(2)
            .with_consumers(2)
            .with_capacity(256)
            .with_sync(sync);
        let outcome = run_fleet(&config);
        outcome.assert_complete(&config);
    }
}

#[test]
fn test_stress_every_mode() {
    for (mode, producers, consumers) in [
        (QueueMode::Mpmc, 4, 4),
        (QueueMode::Mpsc, 4, 1),
        (QueueMode::Spmc, 1, 4),
        (QueueMode::Spsc, 1, 1),
    ] {
        let config = FleetConfig::new(50_000)
            .with_producers(producers)
            .with_consumers(consumers)
            .with_capacity(512)
            .with_mode(mode);
        let outcome = run_fleet(&config);
        outcome.assert_complete(&config);
    }
}

#[test]
fn test_tiny_capacity_maximizes_contention() {
    // a capacity-2 ring forces constant full/empty transitions and wraps
    let config = FleetConfig::new(10_000)
        .with_producers(4)
        .with_consumers(4)
        .with_capacity(2);
    let outcome = run_fleet(&config);
    outcome.assert_complete(&config);
    assert!(outcome.stats.queue_full_count > 0);
    assert!(outcome.stats.queue_empty_count > 0);
}

//! # surge-test-support
//!
//! Harness for driving surge queues from producer/consumer thread fleets.
//!
//! Producer `i` enqueues the integers `0..items_per_producer` tagged with
//! its index in the high payload bits. Consumers strip the tag, sum the
//! values, and count deliveries per producer, so a run can verify that
//! nothing was lost, duplicated, or invented:
//!
//! - total dequeued count equals `producers * items_per_producer`
//! - per-producer counts each equal `items_per_producer`
//! - the value sum equals `producers * n*(n-1)/2`
//!
//! Producers are joined before the queue is closed; consumers then drain
//! the queue until they observe the close.

use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use surge::{stats, BlockingQueue, QueueMode, QueueStats, SyncType};

/// Tag shift for the producer index carried in the payload high bits.
const TAG_SHIFT: u32 = 48;
const VALUE_MASK: usize = (1 << TAG_SHIFT) - 1;

/// Configuration for one fleet run.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Number of producer threads
    pub producers: usize,
    /// Number of consumer threads
    pub consumers: usize,
    /// Items enqueued by each producer
    pub items_per_producer: usize,
    /// Queue capacity (power of two)
    pub capacity: u32,
    /// Queue concurrency mode
    pub mode: QueueMode,
    /// Wait strategy
    pub sync: SyncType,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            producers: 4,
            consumers: 4,
            items_per_producer: 100_000,
            capacity: 1024,
            mode: QueueMode::Mpmc,
            sync: SyncType::EventCount,
        }
    }
}

impl FleetConfig {
    pub fn new(items_per_producer: usize) -> Self {
        Self {
            items_per_producer,
            ..Default::default()
        }
    }

    pub fn with_producers(mut self, n: usize) -> Self {
        self.producers = n;
        self
    }

    pub fn with_consumers(mut self, n: usize) -> Self {
        self.consumers = n;
        self
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_mode(mut self, mode: QueueMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sync(mut self, sync: SyncType) -> Self {
        self.sync = sync;
        self
    }

    /// The value sum each producer contributes.
    pub fn expected_sum_per_producer(&self) -> u64 {
        let n = self.items_per_producer as u64;
        n * (n - 1) / 2
    }
}

/// Aggregate result of a fleet run.
#[derive(Debug)]
pub struct FleetOutcome {
    /// Items successfully enqueued across all producers
    pub enqueued: u64,
    /// Items successfully dequeued across all consumers
    pub dequeued: u64,
    /// Sum of all enqueued values (tags stripped)
    pub producer_sum: u64,
    /// Sum of all dequeued values (tags stripped)
    pub consumer_sum: u64,
    /// Dequeued items per producer tag
    pub per_producer_counts: Vec<u64>,
    /// Queue statistics merged across all worker threads
    pub stats: QueueStats,
}

impl FleetOutcome {
    /// Assert the run lost and duplicated nothing.
    pub fn assert_complete(&self, config: &FleetConfig) {
        let expected = (config.producers * config.items_per_producer) as u64;
        assert_eq!(self.enqueued, expected, "enqueue count");
        assert_eq!(self.dequeued, expected, "dequeue count");

        let expected_sum = config.producers as u64 * config.expected_sum_per_producer();
        assert_eq!(self.producer_sum, expected_sum, "producer value sum");
        assert_eq!(self.consumer_sum, expected_sum, "consumer value sum");

        for (tag, &count) in self.per_producer_counts.iter().enumerate() {
            assert_eq!(
                count, config.items_per_producer as u64,
                "per-producer count for tag {tag}"
            );
        }
    }
}

/// Run a producer/consumer fleet against one queue and collect totals.
pub fn run_fleet(config: &FleetConfig) -> FleetOutcome {
    assert!(config.producers > 0 && config.consumers > 0);
    assert!(
        config.producers < (1 << 8),
        "producer tag must fit the high payload bits"
    );

    let queue = Arc::new(BlockingQueue::new(config.capacity, config.mode, config.sync).unwrap());
    let start = Arc::new(Barrier::new(config.producers + config.consumers));
    let totals = Arc::new(Mutex::new(Totals::new(config.producers)));

    let producer_handles: Vec<_> = (0..config.producers)
        .map(|tag| {
            let queue = queue.clone();
            let start = start.clone();
            let totals = totals.clone();
            let items = config.items_per_producer;
            thread::spawn(move || {
                let _ = stats::take();
                start.wait();

                let mut enqueued = 0u64;
                let mut sum = 0u64;
                for value in 0..items {
                    if queue.enqueue((tag << TAG_SHIFT) | value).is_err() {
                        break;
                    }
                    enqueued += 1;
                    sum += value as u64;
                }

                let mut totals = totals.lock().unwrap();
                totals.enqueued += enqueued;
                totals.producer_sum += sum;
                totals.stats.merge(&stats::take());
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..config.consumers)
        .map(|_| {
            let queue = queue.clone();
            let start = start.clone();
            let totals = totals.clone();
            let producers = config.producers;
            thread::spawn(move || {
                let _ = stats::take();
                start.wait();

                let mut dequeued = 0u64;
                let mut sum = 0u64;
                let mut per_producer = vec![0u64; producers];
                while let Ok(value) = queue.dequeue() {
                    dequeued += 1;
                    sum += (value & VALUE_MASK) as u64;
                    per_producer[value >> TAG_SHIFT] += 1;
                }

                let mut totals = totals.lock().unwrap();
                totals.dequeued += dequeued;
                totals.consumer_sum += sum;
                for (tag, count) in per_producer.into_iter().enumerate() {
                    totals.per_producer_counts[tag] += count;
                }
                totals.stats.merge(&stats::take());
            })
        })
        .collect();

    for handle in producer_handles {
        handle.join().unwrap();
    }
    queue.close();
    for handle in consumer_handles {
        handle.join().unwrap();
    }

    let totals = Arc::try_unwrap(totals)
        .expect("all workers joined")
        .into_inner()
        .unwrap();
    FleetOutcome {
        enqueued: totals.enqueued,
        dequeued: totals.dequeued,
        producer_sum: totals.producer_sum,
        consumer_sum: totals.consumer_sum,
        per_producer_counts: totals.per_producer_counts,
        stats: totals.stats,
    }
}

#[derive(Debug)]
struct Totals {
    enqueued: u64,
    dequeued: u64,
    producer_sum: u64,
    consumer_sum: u64,
    per_producer_counts: Vec<u64>,
    stats: QueueStats,
}

impl Totals {
    fn new(producers: usize) -> Self {
        Self {
            enqueued: 0,
            dequeued: 0,
            producer_sum: 0,
            consumer_sum: 0,
            per_producer_counts: vec![0; producers],
            stats: QueueStats::new(),
        }
    }
}

//! Core constants shared by the ring queue and its blocking wrappers.

/// Low sequence bit marking a slot as closed.
///
/// Generation arithmetic always advances slot sequences in steps of
/// `capacity` (a power of two, at least 2), so the low bit is never touched
/// by normal enqueue/dequeue traffic and is free to carry the close flag.
pub const Q_CLOSED: u64 = 1;

/// Cache line size for alignment (64 bytes on current x86-64 parts).
pub const CACHE_LINE_SIZE: usize = 64;

/// Default queue capacity used by benchmarks and examples.
pub const DEFAULT_QUEUE_CAPACITY: u32 = 64 * 1024;

/// Smallest allowed queue capacity.
///
/// A capacity of 1 would alias the "empty awaiting producer" and "full
/// awaiting consumer" slot states with the close flag bit.
pub const MIN_QUEUE_CAPACITY: u32 = 2;

/// Event-count state increment for one registered waiter (high 32 bits).
pub(crate) const WAITER_INCR: u64 = 1 << 32;

/// Event-count generation increment (low 32 bits).
///
/// Stepping by 2 keeps the low bit of the generation word fixed: odd while
/// the event count is open, zero once it is closed.
pub(crate) const FUTEX_INCR: u32 = 2;

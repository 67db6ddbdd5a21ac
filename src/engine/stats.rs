//! Engine counters

use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated with relaxed ordering
///
/// Each counter sits on its own cache line; producers bump `enqueued` and
/// `dropped` while the consumer bumps `written`.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    dropped: CachePadded<AtomicU64>,
    enqueued: CachePadded<AtomicU64>,
    written: CachePadded<AtomicU64>,
}

impl Counters {
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> Stats {
        Stats {
            dropped: self.dropped.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Events discarded instead of delivered
    pub dropped: u64,
    /// Events accepted into the queue
    pub enqueued: u64,
    /// Events delivered by the consumer
    pub written: u64,
}

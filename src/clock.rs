//! Timestamp and thread-id helpers for event headers

use once_cell::sync::Lazy;
use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Process-wide epoch, fixed on first use
static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Next id handed to a thread that asks for one
static NEXT_THREAD_ID: AtomicU32 = AtomicU32::new(1);

thread_local! {
    static THREAD_ID: Cell<u32> = const { Cell::new(0) };
}

/// Nanoseconds elapsed since the process-wide epoch
///
/// Monotonic, saturating at `u64::MAX`.
pub fn monotonic_ticks() -> u64 {
    u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Small sequential id for the calling thread
///
/// The first thread to ask gets 1, the next 2, and so on. A thread keeps its
/// id for its whole lifetime.
pub fn mapped_thread_id() -> u32 {
    THREAD_ID.with(|id| {
        if id.get() == 0 {
            id.set(NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
        }
        id.get()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_ticks_are_monotonic() {
        let first = monotonic_ticks();
        let second = monotonic_ticks();
        assert!(second >= first);
    }

    #[test]
    fn test_thread_id_is_stable_per_thread() {
        let id = mapped_thread_id();
        assert_ne!(id, 0);
        assert_eq!(mapped_thread_id(), id);

        let other = thread::spawn(mapped_thread_id).join().unwrap();
        assert_ne!(other, 0);
        assert_ne!(other, id);
    }
}

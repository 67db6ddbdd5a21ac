//! Fixed-capacity record pool with a lock-free free list
//!
//! The pool allocates all of its records once, at construction, and never
//! grows. Free records are kept on a Treiber stack threaded through each
//! record's `free_next` link:
//!
//! - `release` pushes a record as the new head with a CAS retry loop
//! - `acquire` reads the head, follows its link and CAS-advances the head,
//!   returning `None` immediately when the stack is empty
//!
//! The head word packs a version tag next to the record index, so a record
//! that is popped and pushed back between another thread's read and CAS
//! changes the tag and makes that CAS fail instead of corrupting the list.

use crate::memory::Record;
use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicIsize, AtomicU64, Ordering};

/// Default number of records in a pool
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Largest supported pool capacity (indices are stored as `u32 + 1`)
pub const MAX_POOL_CAPACITY: usize = (u32::MAX - 1) as usize;

/// Link value meaning "no record"
const NIL: u32 = 0;

/// Tagged head of the free list, cache-line padded to avoid false sharing
struct TaggedHead {
    /// High 32 bits: version tag. Low 32 bits: record index + 1, or `NIL`.
    value: CachePadded<AtomicU64>,
}

impl TaggedHead {
    fn new() -> Self {
        Self {
            value: CachePadded::new(AtomicU64::new(Self::pack(0, NIL))),
        }
    }

    fn pack(tag: u32, link: u32) -> u64 {
        ((tag as u64) << 32) | link as u64
    }

    fn tag(word: u64) -> u32 {
        (word >> 32) as u32
    }

    fn link(word: u64) -> u32 {
        word as u32
    }

    fn load(&self, ordering: Ordering) -> u64 {
        self.value.load(ordering)
    }

    fn compare_exchange_weak(
        &self,
        current: u64,
        new: u64,
        success: Ordering,
        failure: Ordering,
    ) -> Result<u64, u64> {
        self.value.compare_exchange_weak(current, new, success, failure)
    }
}

/// A fixed array of reusable records
pub struct RecordPool {
    /// Record storage, allocated once
    records: Box<[Record]>,
    /// Free list head
    head: TaggedHead,
    /// Number of records currently on the free list (observability only)
    available: CachePadded<AtomicIsize>,
}

impl RecordPool {
    /// Create a pool holding `capacity` records, all initially free
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_POOL_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        assert!(capacity <= MAX_POOL_CAPACITY, "Pool capacity exceeds the supported maximum");

        let records: Box<[Record]> = (0..capacity).map(|i| Record::new(i as u32)).collect();

        let pool = Self {
            records,
            head: TaggedHead::new(),
            available: CachePadded::new(AtomicIsize::new(0)),
        };

        // Push in reverse so the first acquire hands out index 0
        for record in pool.records.iter().rev() {
            pool.release(record);
        }

        pool
    }

    /// Take a free record, or `None` if the pool is exhausted
    pub fn acquire(&self) -> Option<&Record> {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            let link = TaggedHead::link(head);
            if link == NIL {
                return None;
            }

            let record = &self.records[(link - 1) as usize];
            let next = record.free_next().load(Ordering::Relaxed);
            let new = TaggedHead::pack(TaggedHead::tag(head).wrapping_add(1), next);

            match self
                .head
                .compare_exchange_weak(head, new, Ordering::Acquire, Ordering::Acquire)
            {
                Ok(_) => {
                    self.available.fetch_sub(1, Ordering::Relaxed);
                    return Some(record);
                }
                Err(current) => head = current,
            }
        }
    }

    /// Return a record to the free list
    ///
    /// The record must belong to this pool and must no longer hold a payload.
    pub fn release(&self, record: &Record) {
        let index = record.index() as usize;
        assert!(
            index < self.records.len() && std::ptr::eq(&self.records[index], record),
            "Record does not belong to this pool"
        );
        debug_assert!(!record.is_occupied(), "Record released while still holding a payload");

        let link = record.index() + 1;
        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            record.free_next().store(TaggedHead::link(head), Ordering::Relaxed);
            let new = TaggedHead::pack(TaggedHead::tag(head).wrapping_add(1), link);

            match self
                .head
                .compare_exchange_weak(head, new, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => {
                    self.available.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                Err(current) => head = current,
            }
        }
    }

    /// Total number of records
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Approximate number of free records
    pub fn available(&self) -> usize {
        // A racing acquire may decrement before the matching release increments
        self.available.load(Ordering::Relaxed).max(0) as usize
    }

    /// Whether no record is currently free
    pub fn is_exhausted(&self) -> bool {
        TaggedHead::link(self.head.load(Ordering::Acquire)) == NIL
    }
}

impl std::fmt::Debug for RecordPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordPool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

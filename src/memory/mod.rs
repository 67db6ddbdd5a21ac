//! Record storage for the transport core
//!
//! This module provides the data structures that carry events from producer
//! threads to the consumer thread without allocating per event:
//!
//! - [`Record`]: a cache-line-aligned slot with inline payload storage, an
//!   intrusive queue link, a free-list link and the type-erased operations
//!   captured when a payload is constructed into it
//! - [`pool::RecordPool`]: a fixed array of records handed out through a
//!   lock-free free list
//! - [`queue::MpscQueue`]: an intrusive multi-producer, single-consumer queue
//!   linking records in FIFO order
//!
//! A record is owned by exactly one party at a time: the free list, the
//! producer constructing into it, the queue, or the consumer draining it.
//! Ownership moves with the free-list pop/push and the queue push/pop.

pub mod pool;
pub mod queue;

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32};

use crate::memory::queue::Linked;

/// Bytes of inline payload storage per record
pub const SLOT_STORAGE_SIZE: usize = 256;

/// Alignment of the inline payload storage
pub const SLOT_STORAGE_ALIGN: usize = 64;

/// Renders the stored payload into the line buffer
pub(crate) type ProcessFn = unsafe fn(storage: *const u8, line: &mut String);

/// Hands the stored payload and its rendered line to the delivery target
///
/// `target` is an erased `&mut D` for the delivery type the record was
/// constructed for.
pub(crate) type SubmitFn = unsafe fn(storage: *const u8, line: &str, target: *mut ());

/// Runs the stored payload's destructor in place
pub(crate) type DestroyFn = unsafe fn(storage: *mut u8);

/// Operations captured for the concrete payload type held by a record
#[derive(Clone, Copy)]
pub(crate) struct RecordOps {
    pub(crate) process: ProcessFn,
    pub(crate) submit: SubmitFn,
    pub(crate) destroy: DestroyFn,
}

#[repr(C, align(64))]
struct SlotStorage([u8; SLOT_STORAGE_SIZE]);

const _: () = assert!(std::mem::align_of::<SlotStorage>() == SLOT_STORAGE_ALIGN);

/// Compile-time check that `P` fits a record slot
struct Fits<P>(PhantomData<P>);

impl<P> Fits<P> {
    const OK: () = assert!(
        std::mem::size_of::<P>() <= SLOT_STORAGE_SIZE
            && std::mem::align_of::<P>() <= SLOT_STORAGE_ALIGN,
        "payload does not fit a record slot"
    );
}

/// A reusable, cache-line-aligned storage slot
#[repr(C, align(64))]
pub struct Record {
    storage: UnsafeCell<MaybeUninit<SlotStorage>>,
    next: AtomicPtr<Record>,
    free_next: AtomicU32,
    index: u32,
    ops: UnsafeCell<Option<RecordOps>>,
}

// Access to `storage` and `ops` is serialized by the pool/queue ownership
// hand-off; everything else is atomic or immutable.
unsafe impl Sync for Record {}

impl Record {
    /// Index used by records that do not belong to a pool (queue stubs)
    pub const DETACHED: u32 = u32::MAX;

    pub(crate) fn new(index: u32) -> Self {
        Self {
            storage: UnsafeCell::new(MaybeUninit::uninit()),
            next: AtomicPtr::new(ptr::null_mut()),
            free_next: AtomicU32::new(0),
            index,
            ops: UnsafeCell::new(None),
        }
    }

    /// Position of this record in its pool
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether a payload is currently constructed in this record
    ///
    /// Only meaningful to the record's current owner.
    pub fn is_occupied(&self) -> bool {
        // SAFETY: the caller owns the record, so nothing writes `ops` concurrently.
        unsafe { (*self.ops.get()).is_some() }
    }

    fn storage_ptr(&self) -> *mut u8 {
        self.storage.get() as *mut u8
    }

    pub(crate) fn free_next(&self) -> &AtomicU32 {
        &self.free_next
    }

    /// Move `payload` into the record and remember its operations
    ///
    /// # Safety
    ///
    /// The caller must own the record exclusively and the record must be
    /// empty. `ops` must have been created for payload type `P`.
    pub(crate) unsafe fn construct<P>(&self, payload: P, ops: RecordOps) {
        let () = Fits::<P>::OK;
        debug_assert!(!self.is_occupied());
        ptr::write(self.storage_ptr() as *mut P, payload);
        *self.ops.get() = Some(ops);
    }

    /// Render the stored payload into `line`
    ///
    /// # Safety
    ///
    /// The caller must own the record.
    pub(crate) unsafe fn process(&self, line: &mut String) {
        if let Some(ops) = *self.ops.get() {
            (ops.process)(self.storage_ptr(), line);
        }
    }

    /// Submit the stored payload and its rendered line
    ///
    /// # Safety
    ///
    /// The caller must own the record and `target` must point to the delivery
    /// type the record's operations were created for.
    pub(crate) unsafe fn submit(&self, line: &str, target: *mut ()) {
        if let Some(ops) = *self.ops.get() {
            (ops.submit)(self.storage_ptr(), line, target);
        }
    }

    /// Drop the stored payload, leaving the record empty
    ///
    /// # Safety
    ///
    /// The caller must own the record.
    pub(crate) unsafe fn destroy(&self) {
        if let Some(ops) = (*self.ops.get()).take() {
            (ops.destroy)(self.storage_ptr());
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new(Self::DETACHED)
    }
}

impl Linked for Record {
    fn link(&self) -> &AtomicPtr<Self> {
        &self.next
    }
}

impl Drop for Record {
    fn drop(&mut self) {
        // Payloads still queued when the pool goes away are released here.
        if let Some(ops) = self.ops.get_mut().take() {
            // SAFETY: `&mut self` proves exclusive ownership.
            unsafe { (ops.destroy)(self.storage_ptr()) };
        }
    }
}

impl std::fmt::Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record").field("index", &self.index).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Tracked(Arc<u64>);

    unsafe fn process_tracked(storage: *const u8, line: &mut String) {
        let value = &*(storage as *const Tracked);
        line.push_str(&value.0.to_string());
    }

    unsafe fn submit_tracked(_storage: *const u8, line: &str, target: *mut ()) {
        let out = &mut *(target as *mut Vec<String>);
        out.push(line.to_string());
    }

    unsafe fn destroy_tracked(storage: *mut u8) {
        ptr::drop_in_place(storage as *mut Tracked);
    }

    fn tracked_ops() -> RecordOps {
        RecordOps {
            process: process_tracked,
            submit: submit_tracked,
            destroy: destroy_tracked,
        }
    }

    #[test]
    fn test_record_lifecycle() {
        let record = Record::new(0);
        let value = Arc::new(77u64);
        let mut delivered: Vec<String> = Vec::new();

        unsafe {
            record.construct(Tracked(value.clone()), tracked_ops());
            assert!(record.is_occupied());

            let mut line = String::new();
            record.process(&mut line);
            record.submit(&line, &mut delivered as *mut Vec<String> as *mut ());
            record.destroy();
        }

        assert!(!record.is_occupied());
        assert_eq!(delivered, vec!["77".to_string()]);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_drop_releases_payload() {
        let value = Arc::new(5u64);
        {
            let record = Record::new(1);
            unsafe { record.construct(Tracked(value.clone()), tracked_ops()) };
            assert_eq!(Arc::strong_count(&value), 2);
        }
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_record_alignment() {
        assert_eq!(std::mem::align_of::<Record>(), SLOT_STORAGE_ALIGN);
        assert!(std::mem::size_of::<Record>() >= SLOT_STORAGE_SIZE);
        assert_eq!(Record::default().index(), Record::DETACHED);
    }
}

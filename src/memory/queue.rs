//! Intrusive multi-producer, single-consumer queue
//!
//! Nodes are linked through an atomic pointer embedded in the node itself, so
//! pushing a pool record never allocates. The queue always holds a stub node,
//! which lets `push` work with a single atomic exchange:
//!
//! 1. Null the new node's link
//! 2. Swap the producer-side `tail` to the new node
//! 3. Store the new node into the previous tail's link
//!
//! Between steps 2 and 3 the list is longer than the consumer can traverse.
//! When `pop` meets an unpublished link while `tail` shows the queue is not
//! empty, it spins until the producer's store lands instead of reporting the
//! queue as empty.
//!
//! Order is FIFO per producer. Between producers, the order is whichever
//! thread wins the tail exchange first.

use crossbeam_utils::{Backoff, CachePadded};
use std::cell::UnsafeCell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

/// A node that can be linked into an [`MpscQueue`]
pub trait Linked: Sized {
    /// The node's intrusive queue link
    fn link(&self) -> &AtomicPtr<Self>;
}

/// Lock-free intrusive MPSC queue
pub struct MpscQueue<T: Linked> {
    /// Last linked node, shared by all producers
    tail: CachePadded<AtomicPtr<T>>,
    /// Next node to consume, owned by the consumer
    head: CachePadded<UnsafeCell<*mut T>>,
    /// Permanent sentinel node
    stub: NonNull<T>,
}

// Nodes are only reached through the push/pop contracts below.
unsafe impl<T: Linked + Send> Send for MpscQueue<T> {}
unsafe impl<T: Linked + Send> Sync for MpscQueue<T> {}

impl<T: Linked + Default> MpscQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        let stub = NonNull::from(Box::leak(Box::<T>::default()));
        // SAFETY: `stub` was just allocated and is not shared yet.
        unsafe { stub.as_ref() }
            .link()
            .store(ptr::null_mut(), Ordering::Relaxed);

        Self {
            tail: CachePadded::new(AtomicPtr::new(stub.as_ptr())),
            head: CachePadded::new(UnsafeCell::new(stub.as_ptr())),
            stub,
        }
    }
}

impl<T: Linked + Default> Default for MpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Linked> MpscQueue<T> {
    /// Append `node` to the queue
    ///
    /// Safe to call from any number of threads at once.
    ///
    /// # Safety
    ///
    /// `node` must stay valid until it has been popped, and must not already
    /// be linked into this or any other queue.
    pub unsafe fn push(&self, node: NonNull<T>) {
        self.push_raw(node.as_ptr());
    }

    unsafe fn push_raw(&self, node: *mut T) {
        (*node).link().store(ptr::null_mut(), Ordering::Relaxed);
        let prev = self.tail.swap(node, Ordering::AcqRel);
        (*prev).link().store(node, Ordering::Release);
    }

    /// Remove the oldest node, or `None` if the queue is empty
    ///
    /// May spin briefly while a producer finishes publishing a node.
    ///
    /// # Safety
    ///
    /// Must only be called from a single consumer thread at a time.
    pub unsafe fn pop(&self) -> Option<NonNull<T>> {
        let head_cell = self.head.get();
        let stub = self.stub.as_ptr();

        let mut head = *head_cell;
        let mut next = (*head).link().load(Ordering::Acquire);

        if head == stub {
            if next.is_null() {
                if self.tail.load(Ordering::Acquire) == stub {
                    return None;
                }
                next = Self::wait_for_link(head);
            }
            // Skip past the stub
            *head_cell = next;
            head = next;
            next = (*head).link().load(Ordering::Acquire);
        }

        if next.is_null() {
            if self.tail.load(Ordering::Acquire) != head {
                next = Self::wait_for_link(head);
            } else {
                // `head` is the last node; put the stub behind it so `head`
                // can be detached without leaving the queue without a node.
                self.push_raw(stub);
                next = Self::wait_for_link(head);
            }
        }

        *head_cell = next;
        NonNull::new(head)
    }

    /// Whether the queue currently holds no nodes
    ///
    /// # Safety
    ///
    /// Must only be called from the consumer thread.
    pub unsafe fn is_empty(&self) -> bool {
        let head = *self.head.get();
        if head != self.stub.as_ptr() {
            return false;
        }
        (*head).link().load(Ordering::Acquire).is_null()
            && self.tail.load(Ordering::Acquire) == head
    }

    /// Spin until a producer publishes the link out of `node`
    unsafe fn wait_for_link(node: *mut T) -> *mut T {
        let backoff = Backoff::new();
        loop {
            let next = (*node).link().load(Ordering::Acquire);
            if !next.is_null() {
                return next;
            }
            backoff.snooze();
        }
    }
}

impl<T: Linked> Drop for MpscQueue<T> {
    fn drop(&mut self) {
        // Linked nodes are owned elsewhere; only the stub belongs to the queue.
        // SAFETY: the stub was leaked from a Box in `new` and is freed once.
        unsafe { drop(Box::from_raw(self.stub.as_ptr())) };
    }
}

impl<T: Linked> std::fmt::Debug for MpscQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpscQueue").finish_non_exhaustive()
    }
}

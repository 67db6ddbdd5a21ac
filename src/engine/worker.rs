//! Consumer side of the engine
//!
//! Exactly one thread drains the queue at a time: the worker spawned by
//! `Engine::start`, or the thread running `Engine::shutdown` once the worker
//! has been joined.

use crate::engine::Shared;
use crate::memory::{Record, RecordOps};
use crate::publisher::Deliver;
use crate::schema::Envelope;
use std::ptr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// Operations for payload type `P` delivered through `D`
pub(crate) fn record_ops<P: Envelope, D: Deliver>() -> RecordOps {
    RecordOps {
        process: process_payload::<P>,
        submit: submit_payload::<P, D>,
        destroy: destroy_payload::<P>,
    }
}

unsafe fn process_payload<P: Envelope>(storage: *const u8, line: &mut String) {
    (*(storage as *const P)).render(line);
}

unsafe fn submit_payload<P: Envelope, D: Deliver>(storage: *const u8, line: &str, target: *mut ()) {
    let delivery = &mut *(target as *mut D);
    delivery.deliver(&*(storage as *const P), line);
}

unsafe fn destroy_payload<P>(storage: *mut u8) {
    ptr::drop_in_place(storage as *mut P);
}

/// Worker thread body
///
/// Polls the queue until the engine stops running, then drains what is left
/// if configured to. Returns the delivery target so the engine can hand it
/// back after shutdown.
pub(crate) fn run<D: Deliver>(shared: Arc<Shared>, mut delivery: D) -> D {
    debug!(name = %shared.config.worker_name, "Worker started");

    let mut line = String::with_capacity(256);

    while shared.running.load(Ordering::Acquire) {
        // SAFETY: this thread is the only consumer while the engine runs.
        match unsafe { shared.queue.pop() } {
            // SAFETY: a popped record is owned by the consumer until released.
            Some(record) => unsafe { deliver_record(&shared, record.as_ref(), &mut line, &mut delivery) },
            None => thread::sleep(shared.config.idle_sleep),
        }
    }

    if shared.config.drain_on_shutdown {
        drain(&shared, &mut line, &mut delivery);
    }

    debug!(name = %shared.config.worker_name, "Worker stopped");
    delivery
}

/// Deliver every record still queued
pub(crate) fn drain<D: Deliver>(shared: &Shared, line: &mut String, delivery: &mut D) {
    // SAFETY: callers guarantee they are the only consumer.
    while let Some(record) = unsafe { shared.queue.pop() } {
        unsafe { deliver_record(shared, record.as_ref(), line, delivery) };
    }
}

/// Discard every record still queued, counting each as dropped
pub(crate) fn discard(shared: &Shared) -> u64 {
    let mut discarded = 0;
    // SAFETY: callers guarantee they are the only consumer.
    while let Some(record) = unsafe { shared.queue.pop() } {
        let record = unsafe { record.as_ref() };
        unsafe { record.destroy() };
        shared.pool.release(record);
        shared.counters.record_dropped();
        discarded += 1;
    }
    discarded
}

/// Render, submit, destroy and release one record
///
/// # Safety
///
/// The caller must own `record` (popped from the queue) and `D` must be the
/// delivery type its operations were created for.
unsafe fn deliver_record<D: Deliver>(
    shared: &Shared,
    record: &Record,
    line: &mut String,
    delivery: &mut D,
) {
    line.clear();
    record.process(line);
    record.submit(line.as_str(), delivery as *mut D as *mut ());
    record.destroy();
    shared.counters.record_written();
    shared.pool.release(record);
}

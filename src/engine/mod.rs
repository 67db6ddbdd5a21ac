//! The logging engine
//!
//! An [`Engine`] owns a record pool, an MPSC queue and one consumer thread.
//! Producers call [`Engine::log`] (or [`Engine::enqueue`] with a payload they
//! built themselves) from any thread:
//!
//! 1. A free record is taken from the pool. If none is left the event is
//!    counted as dropped and discarded; the producer never waits.
//! 2. The payload is moved into the record together with the type-erased
//!    operations for its concrete type.
//! 3. The record is pushed onto the queue.
//!
//! The consumer pops records in order, renders each one into a reused line
//! buffer, hands it to the delivery target, destroys the payload and returns
//! the record to the pool.
//!
//! ```no_run
//! use sherlog_pipeline::{log_event, Engine, EngineConfig, Request, RequestPath, Severity};
//!
//! let engine = Engine::stdout(EngineConfig::default());
//! log_event!(engine, Request; Severity::Info, 0u64, 1u32, 7u32, 1u16, 4u16, 1u16,
//!     42u64, RequestPath::from("/health"));
//! engine.shutdown();
//! ```

pub mod config;
pub mod stats;
mod worker;

pub use config::EngineConfig;
pub use stats::Stats;

use crate::error::{Error, Result};
use crate::memory::pool::RecordPool;
use crate::memory::queue::MpscQueue;
use crate::memory::Record;
use crate::publisher::{Deliver, Publisher, TerminalPolicy, TextSink};
use crate::schema::builder::{Builder, Register};
use crate::schema::Envelope;
use crossbeam_utils::Backoff;
use parking_lot::Mutex;
use stats::Counters;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// State shared between producers and the consumer
pub(crate) struct Shared {
    pub(crate) pool: RecordPool,
    pub(crate) queue: MpscQueue<Record>,
    pub(crate) counters: Counters,
    /// Producers may still enqueue
    accepting: AtomicBool,
    /// Producers currently inside `enqueue` past the `accepting` check
    in_flight: AtomicUsize,
    /// The consumer keeps polling
    pub(crate) running: AtomicBool,
    pub(crate) config: EngineConfig,
}

/// Where the delivery target currently lives
enum Lifecycle<D> {
    /// Not started yet; the engine holds the delivery target
    Idle(D),
    /// The worker thread owns the delivery target and returns it on join
    Running(JoinHandle<D>),
    /// The worker could not be spawned
    Failed,
    /// Shut down; the delivery target, if it survived, waits to be taken back
    Stopped(Option<D>),
}

/// Asynchronous structured-event pipeline
///
/// `D` is the delivery target. The default writes text lines to standard
/// output; any [`Publisher`] combination or custom [`Deliver`] works.
pub struct Engine<D: Deliver = Publisher<TerminalPolicy, TextSink>> {
    shared: Arc<Shared>,
    /// Fast-path flag: set once `start` has run to completion
    started: AtomicBool,
    lifecycle: Mutex<Lifecycle<D>>,
}

impl Engine {
    /// Engine writing text lines to standard output
    pub fn stdout(config: EngineConfig) -> Self {
        Self::new(config, Publisher::default())
    }
}

impl<D: Deliver> Engine<D> {
    /// Create an engine delivering through `delivery`
    ///
    /// The pool is allocated here. The worker thread is spawned by
    /// [`start`](Self::start) or by the first enqueue.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_capacity` exceeds the supported maximum; use
    /// [`try_new`](Self::try_new) to get an error instead.
    pub fn new(config: EngineConfig, delivery: D) -> Self {
        let shared = Arc::new(Shared {
            pool: RecordPool::new(config.pool_capacity),
            queue: MpscQueue::new(),
            counters: Counters::default(),
            accepting: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            running: AtomicBool::new(true),
            config,
        });

        Self {
            shared,
            started: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::Idle(delivery)),
        }
    }

    /// Validate `config`, then create the engine
    pub fn try_new(config: EngineConfig, delivery: D) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config, delivery))
    }

    /// Spawn the consumer thread
    ///
    /// Idempotent. Fails with [`Error::ShutDown`] after shutdown and with
    /// [`Error::WorkerSpawn`] if the thread cannot be created, in which case
    /// the engine stops accepting events.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();

        let delivery = match std::mem::replace(&mut *lifecycle, Lifecycle::Failed) {
            Lifecycle::Idle(delivery) => delivery,
            Lifecycle::Running(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                return Ok(());
            }
            Lifecycle::Failed => return Err(Error::ShutDown),
            stopped @ Lifecycle::Stopped(_) => {
                *lifecycle = stopped;
                return Err(Error::ShutDown);
            }
        };

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(self.shared.config.worker_name.clone())
            .spawn(move || worker::run(shared, delivery));

        self.started.store(true, Ordering::Release);

        match spawned {
            Ok(handle) => {
                *lifecycle = Lifecycle::Running(handle);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn worker thread, events will be dropped");
                self.shared.accepting.store(false, Ordering::SeqCst);
                Err(Error::WorkerSpawn(e))
            }
        }
    }

    fn ensure_started(&self) {
        if !self.started.load(Ordering::Acquire) {
            // Failure is logged by `start` and shows up as dropped events
            let _ = self.start();
        }
    }

    /// Hand a payload to the consumer thread
    ///
    /// Never blocks on I/O. If the pool is exhausted or the engine has shut
    /// down, the event is discarded and counted in [`Stats::dropped`].
    ///
    /// A payload that does not fit a record slot fails to build:
    ///
    /// ```compile_fail
    /// use sherlog_pipeline::{Engine, EngineConfig, Envelope, Header, Tag};
    ///
    /// struct Huge {
    ///     header: Header,
    ///     blob: [u8; 512],
    /// }
    ///
    /// impl Envelope for Huge {
    ///     const TAG: Tag = Tag::Generic;
    ///     fn header(&self) -> &Header {
    ///         &self.header
    ///     }
    ///     fn render(&self, _out: &mut String) {}
    /// }
    ///
    /// let engine = Engine::stdout(EngineConfig::default());
    /// engine.enqueue(Huge { header: Header::default(), blob: [0; 512] });
    /// ```
    pub fn enqueue<P: Envelope>(&self, payload: P) {
        self.ensure_started();

        let shared = &*self.shared;
        shared.in_flight.fetch_add(1, Ordering::SeqCst);

        if !shared.accepting.load(Ordering::SeqCst) {
            shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            shared.counters.record_dropped();
            return;
        }

        match shared.pool.acquire() {
            Some(record) => {
                // SAFETY: the record came off the free list, so this thread
                // owns it until the push hands it to the consumer.
                unsafe {
                    record.construct(payload, worker::record_ops::<P, D>());
                    shared.queue.push(NonNull::from(record));
                }
                shared.counters.record_enqueued();
            }
            None => shared.counters.record_dropped(),
        }

        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Build a payload for schema `R` from `args` and enqueue it
    pub fn log<R: Register>(&self, args: R::Args) {
        self.enqueue(Builder::build::<R>(args));
    }

    /// Stop accepting events, finish queued work and join the consumer
    ///
    /// Producers already inside [`enqueue`](Self::enqueue) are waited for.
    /// Queued events are delivered when `drain_on_shutdown` is set and
    /// counted as dropped otherwise. Idempotent; also run on drop.
    pub fn shutdown(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if matches!(*lifecycle, Lifecycle::Stopped(_)) {
            return;
        }

        let shared = &*self.shared;
        shared.accepting.store(false, Ordering::SeqCst);
        self.started.store(true, Ordering::Release);

        let backoff = Backoff::new();
        while shared.in_flight.load(Ordering::SeqCst) != 0 {
            backoff.snooze();
        }

        shared.running.store(false, Ordering::Release);

        let delivery = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped(None)) {
            Lifecycle::Idle(mut delivery) => {
                if shared.config.drain_on_shutdown {
                    let mut line = String::new();
                    worker::drain(shared, &mut line, &mut delivery);
                }
                Some(delivery)
            }
            Lifecycle::Running(handle) => match handle.join() {
                Ok(delivery) => Some(delivery),
                Err(_) => {
                    error!("Worker thread panicked");
                    None
                }
            },
            Lifecycle::Failed | Lifecycle::Stopped(_) => None,
        };

        let discarded = worker::discard(shared);
        if discarded > 0 {
            debug!(discarded, "Discarded queued events at shutdown");
        }

        *lifecycle = Lifecycle::Stopped(delivery);

        let stats = shared.counters.snapshot();
        info!(
            enqueued = stats.enqueued,
            written = stats.written,
            dropped = stats.dropped,
            "Engine shut down"
        );
    }

    /// Take the delivery target back after [`shutdown`](Self::shutdown)
    ///
    /// Returns `None` before shutdown, if it was already taken, or if the
    /// worker panicked.
    pub fn take_delivery(&self) -> Option<D> {
        match &mut *self.lifecycle.lock() {
            Lifecycle::Stopped(delivery) => delivery.take(),
            _ => None,
        }
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> Stats {
        self.shared.counters.snapshot()
    }

    /// Number of record slots
    pub fn pool_capacity(&self) -> usize {
        self.shared.pool.capacity()
    }

    /// Approximate number of free record slots
    pub fn available_slots(&self) -> usize {
        self.shared.pool.available()
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Whether the engine still accepts events
    pub fn is_accepting(&self) -> bool {
        self.shared.accepting.load(Ordering::Acquire)
    }
}

impl<D: Deliver> Drop for Engine<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<D: Deliver> std::fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .field("pool", &self.shared.pool)
            .finish()
    }
}

/// Build and enqueue an event from positional arguments
///
/// `log_event!(engine, Schema; a, b, c)` is `engine.log::<Schema>((a, b, c))`.
#[macro_export]
macro_rules! log_event {
    ($engine:expr, $schema:ty; $($arg:expr),+ $(,)?) => {
        $engine.log::<$schema>(($($arg,)+))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::payloads::{Generic, GenericPayload};
    use crate::schema::{Header, Severity};
    use std::sync::mpsc;

    /// Delivery forwarding every line to a channel
    struct ChannelDelivery(mpsc::Sender<String>);

    impl Deliver for ChannelDelivery {
        fn deliver<E: Envelope>(&mut self, _envelope: &E, line: &str) {
            let _ = self.0.send(line.to_string());
        }
    }

    /// Delivery collecting lines in place
    #[derive(Default)]
    struct Collect(Vec<String>);

    impl Deliver for Collect {
        fn deliver<E: Envelope>(&mut self, _envelope: &E, line: &str) {
            self.0.push(line.to_string());
        }
    }

    fn small_config(capacity: usize) -> EngineConfig {
        EngineConfig {
            pool_capacity: capacity,
            ..EngineConfig::default()
        }
    }

    fn generic(request_id: u32) -> GenericPayload {
        let mut header = Header::default();
        header.request_id = request_id;
        GenericPayload { header }
    }

    #[test]
    fn test_enqueue_is_delivered() {
        let (tx, rx) = mpsc::channel();
        let engine = Engine::new(small_config(8), ChannelDelivery(tx));

        engine.enqueue(generic(3));
        let line = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert!(line.contains("request_id=3 "));

        engine.shutdown();
        assert_eq!(engine.stats(), Stats { dropped: 0, enqueued: 1, written: 1 });
        assert_eq!(engine.available_slots(), 8);
    }

    #[test]
    fn test_log_macro() {
        let engine = Engine::new(small_config(8), Collect::default());
        log_event!(engine, Generic; Severity::Warn, 1u64, 2u32, 3u32, 4u16, 5u16, 6u16);
        engine.shutdown();

        let lines = engine.take_delivery().unwrap().0;
        assert_eq!(
            lines,
            vec!["[tag=0] severity=Warn timestamp=1 thread_id=2 request_id=3 class_id=4 method_id=5 schema_version=6 "]
        );
    }

    #[test]
    fn test_enqueue_after_shutdown_is_dropped() {
        let engine = Engine::new(small_config(4), Collect::default());
        engine.shutdown();
        engine.shutdown();

        engine.enqueue(generic(1));
        assert!(!engine.is_accepting());
        assert_eq!(engine.stats().dropped, 1);
        assert!(engine.start().is_err());
        assert!(engine.take_delivery().unwrap().0.is_empty());
        assert!(engine.take_delivery().is_none());
    }

    #[test]
    fn test_start_is_idempotent() {
        let engine = Engine::new(small_config(4), Collect::default());
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.take_delivery().is_none());
    }

    #[test]
    fn test_try_new_rejects_bad_config() {
        let config = EngineConfig {
            worker_name: "bad\0name".to_string(),
            ..EngineConfig::default()
        };
        assert!(Engine::try_new(config, Collect::default()).is_err());
    }
}

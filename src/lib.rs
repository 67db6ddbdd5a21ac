//! Sherlog Pipeline - A low-latency structured logging pipeline
//!
//! # Overview
//!
//! Producer threads hand typed events to a background consumer without taking
//! locks or allocating per event:
//!
//! 1. A fixed pool of cache-line-aligned records, handed out through a
//!    lock-free free list
//! 2. An intrusive MPSC (Multi-Producer, Single-Consumer) queue linking filled
//!    records in order
//! 3. A single consumer thread that renders each record, delivers it and
//!    recycles the record
//!
//! Events are fixed-layout payloads: a shared [`Header`] plus a body chosen by
//! [`Tag`]. Each payload kind is declared once and gets a typed argument
//! tuple, so a field of the wrong type is a compile error.
//!
//! # Key Features
//!
//! - Lock-free, allocation-free producer path
//! - Pool exhaustion drops and counts the event instead of blocking
//! - Compile-time check that every payload fits a record slot
//! - Two-stage delivery chosen at compile time: a [`Sink`] for formatting
//!   (text or JSON) and a [`Policy`] for the destination (terminal or file)
//! - Draining shutdown, also run on drop
//!
//! # Usage
//!
//! ```no_run
//! use sherlog_pipeline::{Engine, EngineConfig, Request, RequestPath, Severity};
//! use sherlog_pipeline::names::{ClassId, MethodId};
//!
//! let engine = Engine::stdout(EngineConfig::default());
//!
//! engine.log::<Request>((
//!     Severity::Info,
//!     sherlog_pipeline::clock::monotonic_ticks(),
//!     sherlog_pipeline::clock::mapped_thread_id(),
//!     17,
//!     ClassId::Handler.as_u16(),
//!     MethodId::HandlerRun.as_u16(),
//!     1,
//!     555,
//!     RequestPath::from("/api/v1/users"),
//! ));
//!
//! engine.shutdown();
//! ```
//!
//! See the `demos` directory for a multi-threaded example.

#![deny(missing_docs)]

pub mod clock;
pub mod engine;
pub mod error;
pub mod memory;
pub mod names;
pub mod publisher;
pub mod schema;

pub use engine::{Engine, EngineConfig, Stats};
pub use error::{Error, Result};
pub use memory::pool::RecordPool;
pub use memory::queue::{Linked, MpscQueue};
pub use memory::Record;
pub use names::{class_name, method_class, method_name, ClassId, MethodId};
pub use publisher::{
    render_envelope, Deliver, FilePolicy, JsonSink, Policy, Publisher, Sink, TerminalPolicy,
    TextSink,
};
pub use schema::builder::{Builder, Register};
pub use schema::payloads::{Generic, GenericPayload, Request, RequestPath, RequestPayload};
pub use schema::{Envelope, Header, InlineStr, Severity, Tag};

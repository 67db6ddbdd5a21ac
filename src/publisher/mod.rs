//! Two-stage delivery: Sink × Policy
//!
//! Delivery is split along two independent axes:
//!
//! - A [`Sink`] decides *how* a rendered line becomes the final message
//!   ([`TextSink`], [`JsonSink`])
//! - A [`Policy`] decides *where* the message goes ([`TerminalPolicy`],
//!   [`FilePolicy`])
//!
//! A [`Publisher`] binds one of each at compile time. The engine is generic
//! over its delivery type, so switching between the four combinations never
//! touches engine code and costs no runtime branch:
//!
//! ```no_run
//! use sherlog_pipeline::{Engine, EngineConfig, FilePolicy, JsonSink, Publisher};
//!
//! let publisher: Publisher<FilePolicy, JsonSink> = Publisher::new(FilePolicy::new("events.log"));
//! let engine = Engine::new(EngineConfig::default(), publisher);
//! # drop(engine);
//! ```

pub mod policy;
pub mod sink;

use crate::schema::Envelope;
use std::borrow::Cow;
use std::marker::PhantomData;

pub use policy::{FilePolicy, Policy, TerminalPolicy};
pub use sink::{JsonSink, Sink, TextSink};

/// Final stage of the consumer loop
///
/// The engine calls `deliver` once per drained record, on the consumer thread,
/// with the typed payload and the line it rendered to.
pub trait Deliver: Send + 'static {
    /// Deliver one event
    fn deliver<E: Envelope>(&mut self, envelope: &E, line: &str);
}

/// Standard adapter: the envelope's own rendering
pub fn render_envelope<E: Envelope>(envelope: &E) -> Cow<'_, str> {
    Cow::Owned(envelope.to_line())
}

/// A policy bound to a sink
pub struct Publisher<P: Policy, S: Sink> {
    policy: P,
    _sink: PhantomData<fn() -> S>,
}

impl<P: Policy, S: Sink> Publisher<P, S> {
    /// Bind `policy` to sink `S`
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            _sink: PhantomData,
        }
    }

    /// Convert `envelope` with `adapter`, format it with the sink and write it
    pub fn publish<E: ?Sized>(&mut self, envelope: &E, adapter: fn(&E) -> Cow<'_, str>) {
        let line = adapter(envelope);
        self.publish_line(&line);
    }

    /// Format an already rendered line with the sink and write it
    pub fn publish_line(&mut self, line: &str) {
        let msg = S::format(line);
        self.policy.write(&msg);
    }

    /// Borrow the policy
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Take the policy back
    pub fn into_policy(self) -> P {
        self.policy
    }
}

impl<P: Policy + Default, S: Sink> Default for Publisher<P, S> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: Policy + std::fmt::Debug, S: Sink> std::fmt::Debug for Publisher<P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("policy", &self.policy)
            .field("sink", &std::any::type_name::<S>())
            .finish()
    }
}

impl<P: Policy, S: Sink> Deliver for Publisher<P, S> {
    fn deliver<E: Envelope>(&mut self, _envelope: &E, line: &str) {
        self.publish_line(line);
    }
}

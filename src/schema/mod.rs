//! Event schema: severities, tags, the shared header and field rendering
//!
//! Every log event travelling through the pipeline is a plain value made of
//! two parts:
//!
//! - A [`Header`] shared by all payload kinds (severity, monotonic timestamp,
//!   mapped thread id, correlation id, class/method ids and schema version)
//! - A tag-specific body declared in [`payloads`]
//!
//! The header layout is fixed at build time. With the `header-padding` feature
//! (enabled by default) a trailing pad makes the header occupy exactly one
//! cache line, so consecutive headers never share a line between producers.
//!
//! Payloads render themselves into the space-separated `key=value` line shape
//! consumed by the sinks in [`crate::publisher`].

pub mod builder;
pub mod payloads;

use std::fmt::{self, Write as _};

/// Size of a cache line on the targets we care about
pub const CACHE_LINE_SIZE: usize = 64;

/// Bytes occupied by the header fields before any trailing pad
///
/// Field offsets follow `repr(C)` declaration order; the `const` assertion
/// below keeps this in sync with the real layout.
pub const HEADER_FIELDS_SIZE: usize = 30;

/// Whether the header is padded to a full cache line (build-time switch)
pub const HEADER_PADDING: bool = cfg!(feature = "header-padding");

/// Number of pad bytes appended after the header fields
pub const HEADER_PAD: usize = if HEADER_PADDING {
    CACHE_LINE_SIZE - HEADER_FIELDS_SIZE
} else {
    0
};

/// Schema version stamped on headers by default
pub const DEFAULT_SCHEMA_VERSION: u16 = 1;

/// Severity of a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Severity {
    /// Informational event
    #[default]
    Info,
    /// Something unexpected that the application recovered from
    Warn,
    /// A failed operation
    Error,
}

impl Severity {
    /// Name used in formatted lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warn => "Warn",
            Severity::Error => "Error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of payload schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Header-only event
    Generic = 0,
    /// Incoming request with a unique id and a path
    Request = 1,
}

impl Tag {
    /// Numeric value rendered as `[tag=<int>]`
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Fields shared by every payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Header {
    /// Event severity
    pub severity: Severity,
    /// Monotonic time in ticks
    pub timestamp: u64,
    /// Mapped (small, sequential) thread identifier
    pub thread_id: u32,
    /// Correlation id
    pub request_id: u32,
    /// Class identifier, resolved by [`crate::names`]
    pub class_id: u16,
    /// Method identifier, resolved by [`crate::names`]
    pub method_id: u16,
    /// ABI/schema version
    pub schema_version: u16,
    _pad: [u8; HEADER_PAD],
}

const _: () = assert!(std::mem::offset_of!(Header, _pad) == HEADER_FIELDS_SIZE);
const _: () = assert!(HEADER_FIELDS_SIZE + HEADER_PAD <= CACHE_LINE_SIZE);
const _: () = assert!(!HEADER_PADDING || std::mem::size_of::<Header>() == CACHE_LINE_SIZE);

impl Default for Header {
    fn default() -> Self {
        Self {
            severity: Severity::Info,
            timestamp: 0,
            thread_id: 0,
            request_id: 0,
            class_id: 0,
            method_id: 0,
            schema_version: DEFAULT_SCHEMA_VERSION,
            _pad: [0; HEADER_PAD],
        }
    }
}

impl Header {
    /// Names of the header fields, in declaration order
    pub const FIELD_NAMES: [&'static str; 7] = [
        "severity",
        "timestamp",
        "thread_id",
        "request_id",
        "class_id",
        "method_id",
        "schema_version",
    ];

    /// Build a header stamped with the current monotonic time and thread id
    pub fn capture(severity: Severity, request_id: u32, class_id: u16, method_id: u16) -> Self {
        Self {
            severity,
            timestamp: crate::clock::monotonic_ticks(),
            thread_id: crate::clock::mapped_thread_id(),
            request_id,
            class_id,
            method_id,
            ..Self::default()
        }
    }

    /// Append the header tokens to `out`
    pub fn render(&self, out: &mut String) {
        push_field(out, "severity", &self.severity);
        push_field(out, "timestamp", &self.timestamp);
        push_field(out, "thread_id", &self.thread_id);
        push_field(out, "request_id", &self.request_id);
        push_field(out, "class_id", &self.class_id);
        push_field(out, "method_id", &self.method_id);
        push_field(out, "schema_version", &self.schema_version);
    }
}

/// A value that can appear on the right-hand side of a `key=value` token
pub trait FieldValue {
    /// Append the textual form of the value
    fn write_value(&self, out: &mut String);
}

impl FieldValue for Severity {
    fn write_value(&self, out: &mut String) {
        out.push_str(self.as_str());
    }
}

macro_rules! integer_field_value {
    ($($ty:ty),*) => {
        $(
            impl FieldValue for $ty {
                fn write_value(&self, out: &mut String) {
                    let _ = write!(out, "{}", self);
                }
            }
        )*
    };
}

integer_field_value!(u8, u16, u32, u64);

impl<const N: usize> FieldValue for InlineStr<N> {
    fn write_value(&self, out: &mut String) {
        push_text(out, self.as_str());
    }
}

/// Append a string value, quoted when it would not read back as one token
///
/// Values containing whitespace, `"` or `\`, and values that would parse as
/// an unsigned integer, are wrapped in double quotes. Inside quotes `"` and
/// `\` are backslash-escaped, and newline, carriage return and tab are
/// written as `\n`, `\r` and `\t`.
pub fn push_text(out: &mut String, value: &str) {
    let needs_quotes = value.parse::<u64>().is_ok()
        || value.chars().any(|c| c.is_whitespace() || c == '"' || c == '\\');

    if !needs_quotes {
        out.push_str(value);
        return;
    }

    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Append `name=value ` to `out`
pub fn push_field<V: FieldValue + ?Sized>(out: &mut String, name: &str, value: &V) {
    out.push_str(name);
    out.push('=');
    value.write_value(out);
    out.push(' ');
}

/// A payload that can travel through the engine
///
/// Payloads are moved into a pool slot on the producer thread and rendered on
/// the consumer thread, so they must own their data.
pub trait Envelope: Send + 'static {
    /// Schema tag of this payload kind
    const TAG: Tag;

    /// Shared header
    fn header(&self) -> &Header;

    /// Append the formatted line (`[tag=N] key=value ...`) to `out`
    fn render(&self, out: &mut String);

    /// Render into a freshly allocated string
    fn to_line(&self) -> String {
        let mut line = String::with_capacity(128);
        self.render(&mut line);
        line
    }
}

/// Fixed-capacity string stored inline in a payload
///
/// Input longer than `N` bytes is truncated at the last char boundary that
/// fits. `N` must not exceed 255.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct InlineStr<const N: usize> {
    len: u8,
    bytes: [u8; N],
}

impl<const N: usize> InlineStr<N> {
    const CAPACITY_FITS: () = assert!(N <= u8::MAX as usize, "InlineStr capacity exceeds 255 bytes");

    /// Copy `s` (possibly truncated) into a new inline string
    pub fn new(s: &str) -> Self {
        let () = Self::CAPACITY_FITS;
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; N];
        bytes[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self {
            len: end as u8,
            bytes,
        }
    }

    /// Borrow the stored text
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or_default()
    }

    /// Stored length in bytes
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the string is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of bytes that can be stored
    pub const fn capacity() -> usize {
        N
    }
}

impl<const N: usize> Default for InlineStr<N> {
    fn default() -> Self {
        Self {
            len: 0,
            bytes: [0u8; N],
        }
    }
}

impl<const N: usize> From<&str> for InlineStr<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Debug for InlineStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for InlineStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<const N: usize> PartialEq<&str> for InlineStr<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

//! Field registry and payload builder
//!
//! Each payload kind is declared once with [`payload_schema!`]. The same
//! field list produces:
//!
//! - The payload struct (header first, body fields after it)
//! - A marker type implementing [`Register`], whose `Args` tuple lists the
//!   exact field types in declaration order
//! - The assignment routine used by [`Builder::build`]
//! - The rendering routine used by the consumer thread
//!
//! Because the argument tuple and the field list come from one declaration
//! they cannot drift apart, and a value of the wrong type is rejected by the
//! compiler rather than converted:
//!
//! ```compile_fail
//! use sherlog_pipeline::{Builder, Generic, Severity};
//!
//! let timestamp: u32 = 1000;
//! // A 32-bit value cannot land in the 64-bit timestamp slot.
//! let _ = Builder::build::<Generic>((Severity::Info, timestamp, 1u32, 0u32, 1u16, 1u16, 1u16));
//! ```

use crate::schema::{Envelope, Tag};

/// Registry entry for one payload schema
pub trait Register {
    /// Payload type assembled for this schema
    type Payload: Envelope + Default;

    /// Ordered argument tuple, position-wise identical to [`Self::FIELD_NAMES`]
    type Args;

    /// Schema tag
    const TAG: Tag;

    /// Field names in assignment order (header fields first)
    const FIELD_NAMES: &'static [&'static str];

    /// Assign every field of `payload` from `args`, in declaration order
    fn assign(payload: &mut Self::Payload, args: Self::Args);
}

/// Assembles payloads from ordered argument tuples
pub struct Builder;

impl Builder {
    /// Build a fully populated payload for schema `R`
    pub fn build<R: Register>(args: R::Args) -> R::Payload {
        let mut payload = R::Payload::default();
        R::assign(&mut payload, args);
        payload
    }
}

/// Declare a payload struct together with its registry entry
///
/// ```ignore
/// payload_schema! {
///     /// Docs for the payload
///     RequestPayload => Request (Tag::Request) {
///         /// Docs for the field
///         req_unique_id: u64,
///     }
/// }
/// ```
macro_rules! payload_schema {
    (
        $(#[$meta:meta])*
        $payload:ident => $marker:ident ($tag:expr) {
            $(
                $(#[$field_meta:meta])*
                $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        #[repr(C, align(64))]
        pub struct $payload {
            /// Shared header
            pub header: $crate::schema::Header,
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        #[doc = concat!("Registry marker for [`", stringify!($payload), "`]")]
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl $crate::schema::builder::Register for $marker {
            type Payload = $payload;
            type Args = (
                $crate::schema::Severity,
                u64,
                u32,
                u32,
                u16,
                u16,
                u16,
                $($ty,)*
            );

            const TAG: $crate::schema::Tag = $tag;

            const FIELD_NAMES: &'static [&'static str] = &[
                "severity",
                "timestamp",
                "thread_id",
                "request_id",
                "class_id",
                "method_id",
                "schema_version",
                $(stringify!($field),)*
            ];

            fn assign(payload: &mut $payload, args: Self::Args) {
                let (
                    severity,
                    timestamp,
                    thread_id,
                    request_id,
                    class_id,
                    method_id,
                    schema_version,
                    $($field,)*
                ) = args;

                payload.header.severity = severity;
                payload.header.timestamp = timestamp;
                payload.header.thread_id = thread_id;
                payload.header.request_id = request_id;
                payload.header.class_id = class_id;
                payload.header.method_id = method_id;
                payload.header.schema_version = schema_version;
                $(payload.$field = $field;)*
            }
        }

        impl $crate::schema::Envelope for $payload {
            const TAG: $crate::schema::Tag = $tag;

            fn header(&self) -> &$crate::schema::Header {
                &self.header
            }

            fn render(&self, out: &mut String) {
                use std::fmt::Write as _;
                let _ = write!(out, "[tag={}] ", <Self as $crate::schema::Envelope>::TAG.as_u8());
                self.header.render(out);
                $($crate::schema::push_field(out, stringify!($field), &self.$field);)*
            }
        }
    };
}

pub(crate) use payload_schema;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::payloads::{Generic, Request, RequestPath};
    use crate::schema::{Header, Severity};

    #[test]
    fn test_field_names_match_arity() {
        assert_eq!(Generic::FIELD_NAMES.len(), Header::FIELD_NAMES.len());
        assert_eq!(Request::FIELD_NAMES.len(), Header::FIELD_NAMES.len() + 2);
        assert_eq!(&Request::FIELD_NAMES[..7], &Header::FIELD_NAMES[..]);
        assert_eq!(&Request::FIELD_NAMES[7..], &["req_unique_id", "path"]);
    }

    #[test]
    fn test_tags() {
        assert_eq!(Generic::TAG, Tag::Generic);
        assert_eq!(Request::TAG, Tag::Request);
    }

    #[test]
    fn test_build_assigns_in_order() {
        let payload = Builder::build::<Request>((
            Severity::Warn,
            7u64,
            8u32,
            9u32,
            10u16,
            11u16,
            12u16,
            13u64,
            RequestPath::from("/x"),
        ));

        assert_eq!(payload.header.severity, Severity::Warn);
        assert_eq!(payload.header.timestamp, 7);
        assert_eq!(payload.header.thread_id, 8);
        assert_eq!(payload.header.request_id, 9);
        assert_eq!(payload.header.class_id, 10);
        assert_eq!(payload.header.method_id, 11);
        assert_eq!(payload.header.schema_version, 12);
        assert_eq!(payload.req_unique_id, 13);
        assert_eq!(payload.path, "/x");
    }
}

//! Concrete payload schemas
//!
//! Adding a schema means adding a [`Tag`] variant and one more
//! `payload_schema!` block here.

use crate::schema::builder::payload_schema;
use crate::schema::{InlineStr, Tag};

/// Maximum number of path bytes kept by a [`RequestPayload`]
pub const REQUEST_PATH_CAPACITY: usize = 128;

/// Request path copied into the payload at build time
pub type RequestPath = InlineStr<REQUEST_PATH_CAPACITY>;

payload_schema! {
    /// Header-only event
    GenericPayload => Generic (Tag::Generic) {}
}

payload_schema! {
    /// Event describing an incoming request
    RequestPayload => Request (Tag::Request) {
        /// Unique id of the request
        req_unique_id: u64,
        /// Request path, truncated to [`REQUEST_PATH_CAPACITY`] bytes
        path: RequestPath,
    }
}

//! Upstream client subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamCall (method, path, query, headers, body)
//!     → client.rs (join onto base URI, add shared secret, send)
//!     → types.rs (decode body by content type)
//!     → UpstreamReply {status, headers, body}
//! ```

pub mod client;
pub mod types;

pub use client::{HttpUpstream, Upstream, CONFIGURATION_PATH, FUNCTION_PATH};
pub use types::{is_json_content_type, ReplyBody, UpstreamCall, UpstreamError, UpstreamReply, UpstreamResult};

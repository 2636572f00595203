//! Socket calls over the host ABI.
//!
//! This module turns structured socket operations into host calls:
//! - accepting connections on a preopened listening socket,
//! - sending and receiving through single-entry iovec arrays,
//! - shutting down, closing and flushing descriptors.
//!
//! Every call allocates its ABI buffers for the duration of the call only.
//! Errors from the primary host call are always returned as-is; callers
//! decide which codes they can recover from.
mod socket;

#[doc(inline)]
pub use socket::{accept, close, flush, receive, send, send_raw, shutdown};

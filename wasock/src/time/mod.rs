//! Blocking time utilities.
//!
//! This module builds on [`poll`](crate::poll) to block the calling thread:
//! - [`sleep`] waits for a duration and panics if the host cannot,
//! - [`try_sleep`] does the same but returns the host error.

mod sleep;

#[doc(inline)]
pub use sleep::{sleep, try_sleep};

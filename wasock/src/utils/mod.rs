//! Low-level memory utilities.
//!
//! - [`scratch`]: per-call host buffers with allocation accounting, used by
//!   every host call in [`net`](crate::net) and [`poll`](crate::poll).
//! - `Slab`: index-stable storage backing the server's client registry.

pub mod scratch;

mod slab;

pub(crate) use slab::Slab;

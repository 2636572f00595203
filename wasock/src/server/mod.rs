//! Connection lifecycle server.
//!
//! A [`Server`] owns a preopened listening descriptor and an ordered registry
//! of connected [`Client`]s. It does no work on its own: the embedding
//! program drives it by calling [`Server::accept_client`] (or
//! [`Server::run_tick`]) in a loop. Each call:
//! - accepts at most one pending connection,
//! - drains every registered client's pending input,
//! - dispatches the connect and receive callbacks.
//!
//! Servers are configured through [`ServerBuilder`].

mod builder;
mod client;
mod core;
mod registry;

#[doc(inline)]
pub use builder::{ServerBuilder, ServerConfig};

#[doc(inline)]
pub use client::Client;

#[doc(inline)]
pub use self::core::Server;

//! # wasock
//!
//! **wasock** is a small non-blocking socket layer for programs running on the
//! WASI preview1 socket ABI, designed for single-threaded servers that drive
//! their own event loop.
//!
//! Instead of wrapping `std::net`, wasock talks directly to the seven host
//! calls a preview1 runtime provides for preopened sockets: accept, send,
//! receive, shutdown, close, datasync and poll. Every call marshals its
//! arguments into fixed-layout buffers, and every failure surfaces as a
//! [`SystemError`] carrying the host's error code.
//!
//! On top of that it offers:
//!
//! - **Socket calls** over preopened listening sockets and accepted connections
//! - **Batched polling** of clock deadlines and descriptor readiness
//! - **A blocking sleep** built on a single clock subscription
//! - **A tick-driven server** with a client registry and connect, disconnect
//!   and receive callbacks
//!
//! On unix targets the host ABI is emulated with libc, so the same code runs
//! natively for development and testing.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wasock::ServerBuilder;
//!
//! fn main() {
//!     let mut server = ServerBuilder::new().build();
//!
//!     server.on_receive(|server, client, message| {
//!         server.send(client, message);
//!     });
//!
//!     server.start();
//!
//!     loop {
//!         server.run_tick(10);
//!     }
//! }
//! ```
//!
//! ## Modules
//!
//! - [`net`] — Socket calls (accept, send, receive, shutdown, close, flush)
//! - [`poll`] — Clock and descriptor-readiness polling
//! - [`time`] — Blocking sleep
//! - [`server`] — Connection registry and server loop
//! - [`sys`] — The raw host ABI and its backends
//! - [`fd`], [`flags`] — Descriptors and host flag sets

mod error;

pub mod fd;
pub mod flags;
pub mod net;
pub mod poll;
pub mod server;
pub mod sys;
pub mod time;
pub mod utils;

pub use error::SystemError;
pub use fd::Descriptor;
pub use server::{Client, Server, ServerBuilder};

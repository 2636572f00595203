use crate::fd::{Descriptor, RawFd};

use std::fmt;

/// A connected peer.
///
/// A client is nothing more than the descriptor its connection was accepted
/// on; two clients are the same client if they share a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Client {
    fd: Descriptor,
}

impl Client {
    pub fn new(fd: Descriptor) -> Self {
        Self { fd }
    }

    /// Returns the connection's descriptor.
    pub fn fd(&self) -> Descriptor {
        self.fd
    }

    /// Returns the numeric identity of the client.
    pub fn id(&self) -> RawFd {
        self.fd.raw()
    }
}

impl From<Descriptor> for Client {
    fn from(fd: Descriptor) -> Self {
        Self::new(fd)
    }
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client {}", self.fd)
    }
}

use std::fmt;

/// Raw descriptor number as exchanged with the host.
pub type RawFd = u32;

/// Number of descriptors the host hands out before any preopened resource
/// (stdin, stdout and stderr).
pub const STANDARD_DESCRIPTORS: RawFd = 3;

/// An opaque handle identifying one open communication endpoint.
///
/// A `Descriptor` is a plain value: copying it does not duplicate the
/// underlying resource, and dropping it does not release anything. The
/// resource is released only by an explicit [`close`](crate::net::close),
/// after which every copy of the descriptor is dangling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Descriptor(RawFd);

impl Descriptor {
    /// Wraps a raw descriptor number. No range validation is performed.
    pub const fn new(raw: RawFd) -> Self {
        Self(raw)
    }

    /// Returns the descriptor of the `offset`-th preopened resource, i.e.
    /// the first descriptor past the standard set plus `offset`.
    pub const fn preopened(offset: RawFd) -> Self {
        Self(STANDARD_DESCRIPTORS.saturating_add(offset))
    }

    /// Returns the underlying descriptor number.
    pub const fn raw(self) -> RawFd {
        self.0
    }
}

impl From<RawFd> for Descriptor {
    fn from(raw: RawFd) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fd#{}", self.0)
    }
}

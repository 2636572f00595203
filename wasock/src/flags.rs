//! Symbolic flags and the host bitmasks they fold into.
//!
//! Every flag family comes in two halves:
//! - a symbol enum (e.g. [`RecvFlag`]) naming the individual options,
//! - a bitmask type (e.g. [`RiFlags`]) holding the value passed to the host.
//!
//! Lists of symbols are turned into a mask with [`combine`]. Each symbol owns
//! exactly one reserved bit, so folding is commutative and idempotent.

use bitflags::{Flags as _, bitflags};

use std::ops::BitOr;

bitflags! {
    /// Descriptor flags (`fdflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FdFlags: u16 {
        const APPEND = 1 << 0;
        const DSYNC = 1 << 1;
        const NONBLOCK = 1 << 2;
        const RSYNC = 1 << 3;
        const SYNC = 1 << 4;
    }

    /// Send input flags (`siflags`). The host defines no bits yet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SiFlags: u16 {
        const DEFAULT = 0;
    }

    /// Receive input flags (`riflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RiFlags: u16 {
        const RECV_PEEK = 1 << 0;
        const RECV_WAITALL = 1 << 1;
    }

    /// Receive output flags (`roflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RoFlags: u16 {
        const RECV_DATA_TRUNCATED = 1 << 0;
        const RECV_FDS_TRUNCATED = 1 << 1;
    }

    /// Shutdown directions (`sdflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SdFlags: u8 {
        const RD = 1 << 0;
        const WR = 1 << 1;
    }

    /// Clock subscription flags (`subclockflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SubclockFlags: u16 {
        const ABSTIME = 1 << 0;
    }

    /// Readiness flags reported with descriptor events (`eventrwflags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventRwFlags: u16 {
        const HANGUP = 1 << 0;
    }
}

/// A symbolic flag that owns one reserved bit of a host bitmask.
pub trait Flag: Copy {
    /// The bitmask type this flag folds into.
    type Mask: bitflags::Flags + Copy + BitOr<Output = Self::Mask>;

    /// Returns the mask with only this flag's bit set.
    fn mask(self) -> Self::Mask;
}

/// Folds a list of symbolic flags into a single host bitmask.
///
/// The fold starts from the empty mask and ORs in each symbol, so the result
/// does not depend on order and repeated symbols have no extra effect.
///
/// # Examples
///
/// ```
/// use wasock::flags::{combine, ShutdownDirection, SdFlags};
///
/// let both = combine(&[ShutdownDirection::Write, ShutdownDirection::Read]);
/// assert_eq!(both, SdFlags::RD | SdFlags::WR);
/// ```
pub fn combine<F: Flag>(flags: &[F]) -> F::Mask {
    flags
        .iter()
        .fold(F::Mask::empty(), |mask, flag| mask | flag.mask())
}

/// Options applied to a descriptor when it is opened or accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenFlag {
    Append,
    DataSync,
    NonBlocking,
    ReadSync,
    Sync,
}

impl Flag for OpenFlag {
    type Mask = FdFlags;

    fn mask(self) -> FdFlags {
        match self {
            OpenFlag::Append => FdFlags::APPEND,
            OpenFlag::DataSync => FdFlags::DSYNC,
            OpenFlag::NonBlocking => FdFlags::NONBLOCK,
            OpenFlag::ReadSync => FdFlags::RSYNC,
            OpenFlag::Sync => FdFlags::SYNC,
        }
    }
}

/// Options for a send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SendFlag {
    Default,
}

impl Flag for SendFlag {
    type Mask = SiFlags;

    fn mask(self) -> SiFlags {
        match self {
            SendFlag::Default => SiFlags::DEFAULT,
        }
    }
}

/// Options for a receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecvFlag {
    /// Leave the data in the socket queue.
    Peek,
    /// Fill the whole buffer before returning, when the socket allows waiting.
    WaitAll,
}

impl Flag for RecvFlag {
    type Mask = RiFlags;

    fn mask(self) -> RiFlags {
        match self {
            RecvFlag::Peek => RiFlags::RECV_PEEK,
            RecvFlag::WaitAll => RiFlags::RECV_WAITALL,
        }
    }
}

/// Conditions reported back by a receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecvOutFlag {
    DataTruncated,
    FdsTruncated,
}

impl Flag for RecvOutFlag {
    type Mask = RoFlags;

    fn mask(self) -> RoFlags {
        match self {
            RecvOutFlag::DataTruncated => RoFlags::RECV_DATA_TRUNCATED,
            RecvOutFlag::FdsTruncated => RoFlags::RECV_FDS_TRUNCATED,
        }
    }
}

/// Halves of a connection that a shutdown call closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownDirection {
    Read,
    Write,
}

impl Flag for ShutdownDirection {
    type Mask = SdFlags;

    fn mask(self) -> SdFlags {
        match self {
            ShutdownDirection::Read => SdFlags::RD,
            ShutdownDirection::Write => SdFlags::WR,
        }
    }
}

/// Options for a clock subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockFlag {
    /// The timeout is an absolute time on the subscription's clock rather
    /// than a delay relative to now.
    AbsoluteTime,
}

impl Flag for ClockFlag {
    type Mask = SubclockFlags;

    fn mask(self) -> SubclockFlags {
        match self {
            ClockFlag::AbsoluteTime => SubclockFlags::ABSTIME,
        }
    }
}

/// Readiness conditions attached to a descriptor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFlag {
    /// The peer closed its end of the connection.
    Hangup,
}

impl Flag for EventFlag {
    type Mask = EventRwFlags;

    fn mask(self) -> EventRwFlags {
        match self {
            EventFlag::Hangup => EventRwFlags::HANGUP,
        }
    }
}

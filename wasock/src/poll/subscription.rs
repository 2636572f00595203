use crate::fd::Descriptor;
use crate::flags::{ClockFlag, SubclockFlags, combine};
use crate::sys::abi;

/// Clock sources a clock subscription can be measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockId {
    Realtime,
    Monotonic,
    ProcessCputime,
    ThreadCputime,
}

impl ClockId {
    /// Returns the host identifier of this clock.
    pub const fn raw(self) -> u32 {
        match self {
            ClockId::Realtime => abi::CLOCKID_REALTIME,
            ClockId::Monotonic => abi::CLOCKID_MONOTONIC,
            ClockId::ProcessCputime => abi::CLOCKID_PROCESS_CPUTIME_ID,
            ClockId::ThreadCputime => abi::CLOCKID_THREAD_CPUTIME_ID,
        }
    }

    /// Maps a host identifier back to a clock.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            abi::CLOCKID_REALTIME => Some(ClockId::Realtime),
            abi::CLOCKID_MONOTONIC => Some(ClockId::Monotonic),
            abi::CLOCKID_PROCESS_CPUTIME_ID => Some(ClockId::ProcessCputime),
            abi::CLOCKID_THREAD_CPUTIME_ID => Some(ClockId::ThreadCputime),
            _ => None,
        }
    }
}

/// A clock deadline.
///
/// `timeout` and `precision` are in nanoseconds. Without
/// [`SubclockFlags::ABSTIME`] the timeout is relative to the moment the poll
/// is issued; with it, the timeout is an absolute time on `clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSubscription {
    pub clock: ClockId,
    pub timeout: u64,
    pub precision: u64,
    pub flags: SubclockFlags,
}

impl ClockSubscription {
    /// A deadline `timeout` nanoseconds from now.
    pub fn relative(clock: ClockId, timeout: u64) -> Self {
        Self {
            clock,
            timeout,
            precision: 0,
            flags: SubclockFlags::empty(),
        }
    }

    /// A deadline at the absolute time `deadline` on `clock`.
    pub fn absolute(clock: ClockId, deadline: u64) -> Self {
        Self {
            clock,
            timeout: deadline,
            precision: 0,
            flags: combine(&[ClockFlag::AbsoluteTime]),
        }
    }

    /// Lets the host coalesce the wake-up within `precision` nanoseconds.
    pub fn with_precision(mut self, precision: u64) -> Self {
        self.precision = precision;
        self
    }

    /// Returns `true` if the timeout is an absolute time.
    pub fn is_absolute(&self) -> bool {
        self.flags.contains(SubclockFlags::ABSTIME)
    }
}

/// The condition a [`Subscription`] waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// A clock deadline.
    Clock(ClockSubscription),

    /// The descriptor has data to read or a pending connection.
    FdRead(Descriptor),

    /// The descriptor can accept more outgoing data.
    FdWrite(Descriptor),
}

/// One awaited condition in a poll batch.
///
/// `userdata` is opaque to the host and comes back unchanged in the
/// [`Event`](super::Event) that satisfies this subscription. It is the only
/// way to match events to subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub userdata: u64,
    pub kind: SubscriptionKind,
}

impl Subscription {
    pub fn clock(userdata: u64, clock: ClockSubscription) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::Clock(clock),
        }
    }

    pub fn fd_read(userdata: u64, fd: Descriptor) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::FdRead(fd),
        }
    }

    pub fn fd_write(userdata: u64, fd: Descriptor) -> Self {
        Self {
            userdata,
            kind: SubscriptionKind::FdWrite(fd),
        }
    }
}

use crate::SystemError;
use crate::flags::{EventFlag, EventRwFlags, Flag};
use crate::sys::abi::Errno;

/// Readiness details reported for a descriptor event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdReadiness {
    /// Bytes available to read, or space available to write, as far as the
    /// host knows. Zero when the host cannot tell.
    pub nbytes: u64,

    /// Extra conditions, such as the peer hanging up.
    pub flags: EventRwFlags,
}

/// Which kind of subscription an [`Event`] satisfies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Clock,
    FdRead(FdReadiness),
    FdWrite(FdReadiness),
}

/// A satisfied subscription, as reported by the host.
///
/// Events are matched to their [`Subscription`](super::Subscription) by
/// `userdata` only; the host may report any subset of a batch in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The user data of the subscription this event satisfies.
    pub userdata: u64,

    /// Host error code for this particular condition; `0` on success.
    pub error: Errno,

    pub kind: EventKind,
}

impl Event {
    /// Returns the per-event error as a `Result`.
    pub fn result(&self) -> Result<(), SystemError> {
        SystemError::check(self.error)
    }

    /// Returns the descriptor readiness details, if this is a descriptor event.
    pub fn readiness(&self) -> Option<FdReadiness> {
        match self.kind {
            EventKind::Clock => None,
            EventKind::FdRead(readiness) | EventKind::FdWrite(readiness) => Some(readiness),
        }
    }

    /// Returns the readiness flags as a list of symbols.
    ///
    /// Clock events carry no flags.
    pub fn flag_list(&self) -> Vec<EventFlag> {
        let flags = self
            .readiness()
            .map(|readiness| readiness.flags)
            .unwrap_or(EventRwFlags::empty());

        [EventFlag::Hangup]
            .into_iter()
            .filter(|flag| flags.contains(flag.mask()))
            .collect()
    }

    /// Returns `true` if the peer hung up.
    pub fn is_hangup(&self) -> bool {
        self.flag_list().contains(&EventFlag::Hangup)
    }
}

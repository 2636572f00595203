//! Batched clock and descriptor-readiness polling.
//!
//! A poll submits a whole batch of [`Subscription`]s in a single host call
//! and blocks the calling thread until the host reports at least one of
//! them as satisfied. Each subscription is encoded into a fixed 48-byte
//! record, each reported [`Event`] is decoded from a fixed 32-byte record.
//!
//! There is no state between calls: every batch is self-contained, and
//! events are correlated with subscriptions through their `userdata` only.

mod event;
mod subscription;

pub use event::{Event, EventKind, FdReadiness};
pub use subscription::{ClockId, ClockSubscription, Subscription, SubscriptionKind};

use crate::SystemError;
use crate::sys::Host;
use crate::sys::abi::{self, EVENT_SIZE, SUBSCRIPTION_SIZE};
use crate::utils::scratch::Scratch;

use log::trace;

/// Waits until at least one of `subscriptions` is satisfied.
///
/// Exactly `subscriptions.len()` subscription slots and as many event slots
/// are handed to the host. The returned events keep the order the host
/// reported them in; the host may report fewer events than subscriptions.
///
/// All buffers allocated for the call are released before it returns,
/// whether the host succeeded or not.
///
/// # Errors
///
/// Returns the host error code if the poll call itself fails, and `INVAL`
/// if the host reports an event record with an unknown type.
pub fn poll_oneoff<H: Host + ?Sized>(
    host: &mut H,
    subscriptions: &[Subscription],
) -> Result<Vec<Event>, SystemError> {
    let n = subscriptions.len();

    let mut input = Scratch::zeroed(slots(n, SUBSCRIPTION_SIZE)?);
    for (record, subscription) in input
        .chunks_exact_mut(SUBSCRIPTION_SIZE)
        .zip(subscriptions)
    {
        abi::encode_subscription(subscription, record);
    }

    let mut output = Scratch::zeroed(slots(n, EVENT_SIZE)?);
    let mut count = Scratch::zeroed(abi::SIZE_CELL);

    let errno = unsafe {
        host.poll_oneoff(
            input.as_ptr(),
            output.as_mut_ptr(),
            n,
            count.as_mut_ptr(),
        )
    };

    if let Err(err) = SystemError::check(errno) {
        trace!("poll_oneoff over {n} subscriptions failed: {err}");
        return Err(err);
    }

    let reported = (abi::read_u32(&count, 0) as usize).min(n);
    trace!("poll_oneoff over {n} subscriptions reported {reported} events");

    output
        .chunks_exact(EVENT_SIZE)
        .take(reported)
        .map(abi::decode_event)
        .collect()
}

fn slots(n: usize, size: usize) -> Result<usize, SystemError> {
    n.checked_mul(size)
        .ok_or(SystemError::new(abi::ERRNO_OVERFLOW))
}

use crate::SystemError;
use crate::poll::{self, ClockId, ClockSubscription, Subscription};
use crate::sys::Host;

use log::trace;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Blocks the calling thread for `milliseconds`.
///
/// A single relative subscription on the monotonic clock is submitted to the
/// host, with zero coalescing precision.
///
/// # Panics
///
/// Panics if the host fails the poll call or reports an error for the clock
/// event. A thread that cannot sleep cannot make timed progress.
///
/// # Examples
///
/// ```rust,ignore
/// use wasock::sys::DefaultHost;
///
/// wasock::time::sleep(&mut DefaultHost::default(), 10);
/// ```
pub fn sleep<H: Host + ?Sized>(host: &mut H, milliseconds: u64) {
    if let Err(err) = try_sleep(host, milliseconds) {
        panic!("sleep of {milliseconds}ms failed: {err}");
    }
}

/// Blocks the calling thread for `milliseconds`, returning host failures.
///
/// # Errors
///
/// Returns the error of the poll call, or the error the host attached to the
/// clock event.
pub fn try_sleep<H: Host + ?Sized>(host: &mut H, milliseconds: u64) -> Result<(), SystemError> {
    let timeout = milliseconds.saturating_mul(NANOS_PER_MILLI);
    let subscription = Subscription::clock(
        0,
        ClockSubscription::relative(ClockId::Monotonic, timeout).with_precision(0),
    );

    let events = poll::poll_oneoff(host, &[subscription])?;
    trace!("slept {milliseconds}ms ({} events)", events.len());

    events.iter().try_for_each(|event| event.result())
}

//! Host ABI constants and fixed-offset record layouts.
//!
//! This is the only place that knows where fields live inside the buffers
//! exchanged with the host. All multi-byte fields are little-endian except
//! the iovec words, which use the native pointer layout so that the same
//! buffer can be handed to the platform `struct iovec` unchanged.

use crate::fd::Descriptor;
use crate::flags::{EventRwFlags, SubclockFlags};
use crate::poll::{ClockId, ClockSubscription, Event, EventKind, FdReadiness};
use crate::poll::{Subscription, SubscriptionKind};
use crate::SystemError;

use std::mem;

/// Raw error code returned by every host call.
pub type Errno = u16;

pub const ERRNO_SUCCESS: Errno = 0;
pub const ERRNO_2BIG: Errno = 1;
pub const ERRNO_ACCES: Errno = 2;
pub const ERRNO_ADDRINUSE: Errno = 3;
pub const ERRNO_ADDRNOTAVAIL: Errno = 4;
pub const ERRNO_AFNOSUPPORT: Errno = 5;
pub const ERRNO_AGAIN: Errno = 6;
pub const ERRNO_ALREADY: Errno = 7;
pub const ERRNO_BADF: Errno = 8;
pub const ERRNO_BADMSG: Errno = 9;
pub const ERRNO_BUSY: Errno = 10;
pub const ERRNO_CANCELED: Errno = 11;
pub const ERRNO_CHILD: Errno = 12;
pub const ERRNO_CONNABORTED: Errno = 13;
pub const ERRNO_CONNREFUSED: Errno = 14;
pub const ERRNO_CONNRESET: Errno = 15;
pub const ERRNO_DEADLK: Errno = 16;
pub const ERRNO_DESTADDRREQ: Errno = 17;
pub const ERRNO_FAULT: Errno = 21;
pub const ERRNO_HOSTUNREACH: Errno = 23;
pub const ERRNO_INPROGRESS: Errno = 26;
pub const ERRNO_INTR: Errno = 27;
pub const ERRNO_INVAL: Errno = 28;
pub const ERRNO_IO: Errno = 29;
pub const ERRNO_ISCONN: Errno = 30;
pub const ERRNO_MFILE: Errno = 33;
pub const ERRNO_MSGSIZE: Errno = 35;
pub const ERRNO_NETDOWN: Errno = 38;
pub const ERRNO_NETRESET: Errno = 39;
pub const ERRNO_NETUNREACH: Errno = 40;
pub const ERRNO_NFILE: Errno = 41;
pub const ERRNO_NOBUFS: Errno = 42;
pub const ERRNO_NOENT: Errno = 44;
pub const ERRNO_NOMEM: Errno = 48;
pub const ERRNO_NOPROTOOPT: Errno = 50;
pub const ERRNO_NOSPC: Errno = 51;
pub const ERRNO_NOSYS: Errno = 52;
pub const ERRNO_NOTCONN: Errno = 53;
pub const ERRNO_NOTSOCK: Errno = 57;
pub const ERRNO_NOTSUP: Errno = 58;
pub const ERRNO_OVERFLOW: Errno = 61;
pub const ERRNO_PERM: Errno = 63;
pub const ERRNO_PIPE: Errno = 64;
pub const ERRNO_TIMEDOUT: Errno = 70;
pub const ERRNO_NOTCAPABLE: Errno = 73;

/// Returns the symbolic name of a host error code.
pub const fn errno_name(code: Errno) -> &'static str {
    match code {
        ERRNO_SUCCESS => "SUCCESS",
        ERRNO_2BIG => "2BIG",
        ERRNO_ACCES => "ACCES",
        ERRNO_ADDRINUSE => "ADDRINUSE",
        ERRNO_ADDRNOTAVAIL => "ADDRNOTAVAIL",
        ERRNO_AFNOSUPPORT => "AFNOSUPPORT",
        ERRNO_AGAIN => "AGAIN",
        ERRNO_ALREADY => "ALREADY",
        ERRNO_BADF => "BADF",
        ERRNO_BADMSG => "BADMSG",
        ERRNO_BUSY => "BUSY",
        ERRNO_CANCELED => "CANCELED",
        ERRNO_CHILD => "CHILD",
        ERRNO_CONNABORTED => "CONNABORTED",
        ERRNO_CONNREFUSED => "CONNREFUSED",
        ERRNO_CONNRESET => "CONNRESET",
        ERRNO_DEADLK => "DEADLK",
        ERRNO_DESTADDRREQ => "DESTADDRREQ",
        ERRNO_FAULT => "FAULT",
        ERRNO_HOSTUNREACH => "HOSTUNREACH",
        ERRNO_INPROGRESS => "INPROGRESS",
        ERRNO_INTR => "INTR",
        ERRNO_INVAL => "INVAL",
        ERRNO_IO => "IO",
        ERRNO_ISCONN => "ISCONN",
        ERRNO_MFILE => "MFILE",
        ERRNO_MSGSIZE => "MSGSIZE",
        ERRNO_NETDOWN => "NETDOWN",
        ERRNO_NETRESET => "NETRESET",
        ERRNO_NETUNREACH => "NETUNREACH",
        ERRNO_NFILE => "NFILE",
        ERRNO_NOBUFS => "NOBUFS",
        ERRNO_NOENT => "NOENT",
        ERRNO_NOMEM => "NOMEM",
        ERRNO_NOPROTOOPT => "NOPROTOOPT",
        ERRNO_NOSPC => "NOSPC",
        ERRNO_NOSYS => "NOSYS",
        ERRNO_NOTCONN => "NOTCONN",
        ERRNO_NOTSOCK => "NOTSOCK",
        ERRNO_NOTSUP => "NOTSUP",
        ERRNO_OVERFLOW => "OVERFLOW",
        ERRNO_PERM => "PERM",
        ERRNO_PIPE => "PIPE",
        ERRNO_TIMEDOUT => "TIMEDOUT",
        ERRNO_NOTCAPABLE => "NOTCAPABLE",
        _ => "UNKNOWN",
    }
}

pub const EVENTTYPE_CLOCK: u8 = 0;
pub const EVENTTYPE_FD_READ: u8 = 1;
pub const EVENTTYPE_FD_WRITE: u8 = 2;

pub const CLOCKID_REALTIME: u32 = 0;
pub const CLOCKID_MONOTONIC: u32 = 1;
pub const CLOCKID_PROCESS_CPUTIME_ID: u32 = 2;
pub const CLOCKID_THREAD_CPUTIME_ID: u32 = 3;

/// Size of one subscription record.
pub const SUBSCRIPTION_SIZE: usize = 48;
pub const SUBSCRIPTION_USERDATA: usize = 0;
pub const SUBSCRIPTION_TAG: usize = 8;
pub const SUBSCRIPTION_CLOCK_ID: usize = 16;
pub const SUBSCRIPTION_CLOCK_TIMEOUT: usize = 24;
pub const SUBSCRIPTION_CLOCK_PRECISION: usize = 32;
pub const SUBSCRIPTION_CLOCK_FLAGS: usize = 40;
pub const SUBSCRIPTION_FD: usize = 16;

/// Size of one event record.
pub const EVENT_SIZE: usize = 32;
pub const EVENT_USERDATA: usize = 0;
pub const EVENT_ERROR: usize = 8;
pub const EVENT_TYPE: usize = 10;
pub const EVENT_FD_NBYTES: usize = 16;
pub const EVENT_FD_FLAGS: usize = 24;

/// Size of one buffer descriptor: a pointer word followed by a length word.
pub const IOVEC_SIZE: usize = 2 * mem::size_of::<usize>();

/// Size of the out-cell receiving a descriptor number.
pub const FD_CELL: usize = 4;

/// Size of the out-cell receiving a byte or event count.
pub const SIZE_CELL: usize = 4;

/// Size of the out-cell receiving a 16-bit flag set.
pub const FLAGS_CELL: usize = 2;

pub fn read_u8(buffer: &[u8], offset: usize) -> u8 {
    buffer[offset]
}

pub fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&buffer[offset..offset + 2]);
    u16::from_le_bytes(raw)
}

pub fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buffer[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

pub fn read_u64(buffer: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buffer[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

pub fn write_u8(buffer: &mut [u8], offset: usize, value: u8) {
    buffer[offset] = value;
}

pub fn write_u16(buffer: &mut [u8], offset: usize, value: u16) {
    buffer[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u32(buffer: &mut [u8], offset: usize, value: u32) {
    buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub fn write_u64(buffer: &mut [u8], offset: usize, value: u64) {
    buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Writes a buffer descriptor referencing `len` bytes at `base`.
pub fn encode_iovec(record: &mut [u8], base: usize, len: usize) {
    let word = mem::size_of::<usize>();

    record[..word].copy_from_slice(&base.to_ne_bytes());
    record[word..2 * word].copy_from_slice(&len.to_ne_bytes());
}

/// Reads the `(base, len)` pair of a buffer descriptor.
pub fn decode_iovec(record: &[u8]) -> (usize, usize) {
    let word = mem::size_of::<usize>();
    let mut base = [0u8; mem::size_of::<usize>()];
    let mut len = [0u8; mem::size_of::<usize>()];

    base.copy_from_slice(&record[..word]);
    len.copy_from_slice(&record[word..2 * word]);

    (usize::from_ne_bytes(base), usize::from_ne_bytes(len))
}

/// Writes one subscription into a zeroed 48-byte record.
pub fn encode_subscription(subscription: &Subscription, record: &mut [u8]) {
    debug_assert_eq!(record.len(), SUBSCRIPTION_SIZE);

    write_u64(record, SUBSCRIPTION_USERDATA, subscription.userdata);

    match subscription.kind {
        SubscriptionKind::Clock(clock) => {
            write_u8(record, SUBSCRIPTION_TAG, EVENTTYPE_CLOCK);
            write_u32(record, SUBSCRIPTION_CLOCK_ID, clock.clock.raw());
            write_u64(record, SUBSCRIPTION_CLOCK_TIMEOUT, clock.timeout);
            write_u64(record, SUBSCRIPTION_CLOCK_PRECISION, clock.precision);
            write_u16(record, SUBSCRIPTION_CLOCK_FLAGS, clock.flags.bits());
        }
        SubscriptionKind::FdRead(fd) => {
            write_u8(record, SUBSCRIPTION_TAG, EVENTTYPE_FD_READ);
            write_u32(record, SUBSCRIPTION_FD, fd.raw());
        }
        SubscriptionKind::FdWrite(fd) => {
            write_u8(record, SUBSCRIPTION_TAG, EVENTTYPE_FD_WRITE);
            write_u32(record, SUBSCRIPTION_FD, fd.raw());
        }
    }
}

/// Reads one subscription record.
///
/// Unknown discriminants and clock ids are rejected with `INVAL`.
pub fn decode_subscription(record: &[u8]) -> Result<Subscription, SystemError> {
    debug_assert_eq!(record.len(), SUBSCRIPTION_SIZE);

    let userdata = read_u64(record, SUBSCRIPTION_USERDATA);
    let fd = || Descriptor::new(read_u32(record, SUBSCRIPTION_FD));

    let kind = match read_u8(record, SUBSCRIPTION_TAG) {
        EVENTTYPE_CLOCK => {
            let clock = ClockId::from_raw(read_u32(record, SUBSCRIPTION_CLOCK_ID))
                .ok_or(SystemError::new(ERRNO_INVAL))?;

            SubscriptionKind::Clock(ClockSubscription {
                clock,
                timeout: read_u64(record, SUBSCRIPTION_CLOCK_TIMEOUT),
                precision: read_u64(record, SUBSCRIPTION_CLOCK_PRECISION),
                flags: SubclockFlags::from_bits_retain(read_u16(record, SUBSCRIPTION_CLOCK_FLAGS)),
            })
        }
        EVENTTYPE_FD_READ => SubscriptionKind::FdRead(fd()),
        EVENTTYPE_FD_WRITE => SubscriptionKind::FdWrite(fd()),
        _ => return Err(SystemError::new(ERRNO_INVAL)),
    };

    Ok(Subscription { userdata, kind })
}

/// Writes one event into a zeroed 32-byte record.
pub fn encode_event(event: &Event, record: &mut [u8]) {
    debug_assert_eq!(record.len(), EVENT_SIZE);

    write_u64(record, EVENT_USERDATA, event.userdata);
    write_u16(record, EVENT_ERROR, event.error);

    let (tag, readiness) = match event.kind {
        EventKind::Clock => (EVENTTYPE_CLOCK, None),
        EventKind::FdRead(readiness) => (EVENTTYPE_FD_READ, Some(readiness)),
        EventKind::FdWrite(readiness) => (EVENTTYPE_FD_WRITE, Some(readiness)),
    };

    write_u8(record, EVENT_TYPE, tag);

    if let Some(readiness) = readiness {
        write_u64(record, EVENT_FD_NBYTES, readiness.nbytes);
        write_u16(record, EVENT_FD_FLAGS, readiness.flags.bits());
    }
}

/// Reads one event record.
///
/// Unknown type discriminants are rejected with `INVAL`.
pub fn decode_event(record: &[u8]) -> Result<Event, SystemError> {
    debug_assert_eq!(record.len(), EVENT_SIZE);

    let readiness = || FdReadiness {
        nbytes: read_u64(record, EVENT_FD_NBYTES),
        flags: EventRwFlags::from_bits_retain(read_u16(record, EVENT_FD_FLAGS)),
    };

    let kind = match read_u8(record, EVENT_TYPE) {
        EVENTTYPE_CLOCK => EventKind::Clock,
        EVENTTYPE_FD_READ => EventKind::FdRead(readiness()),
        EVENTTYPE_FD_WRITE => EventKind::FdWrite(readiness()),
        _ => return Err(SystemError::new(ERRNO_INVAL)),
    };

    Ok(Event {
        userdata: read_u64(record, EVENT_USERDATA),
        error: read_u16(record, EVENT_ERROR),
        kind,
    })
}

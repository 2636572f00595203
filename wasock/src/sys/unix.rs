//! libc backend for unix targets.
//!
//! Emulates the WASI socket and polling calls on top of the platform socket
//! API so the crate can run natively:
//! - `sock_recv`/`sock_send` map onto `recvmsg`/`sendmsg`, reusing the iovec
//!   array as-is since its words follow the native `struct iovec` layout,
//! - `poll_oneoff` decodes the subscription records and drives `poll(2)`,
//!   turning clock subscriptions into the poll timeout,
//! - platform `errno` values are translated into the WASI error space.
//!
//! It also provides the setup a WASI runtime would normally do before the
//! program starts: creating a listening socket and placing it at a preopened
//! descriptor number.

use super::Host;
use super::abi::{self, EVENT_SIZE, Errno, SUBSCRIPTION_SIZE};
use crate::fd::{Descriptor, RawFd};
use crate::flags::{EventRwFlags, FdFlags, RiFlags, RoFlags, SdFlags};
use crate::poll::{ClockId, Event, EventKind, FdReadiness, Subscription, SubscriptionKind};
use crate::SystemError;

use libc::{
    AF_INET, AF_INET6, CLOCK_MONOTONIC, CLOCK_PROCESS_CPUTIME_ID, CLOCK_REALTIME,
    CLOCK_THREAD_CPUTIME_ID, EACCES, EADDRINUSE, EADDRNOTAVAIL, EAFNOSUPPORT, EAGAIN, EALREADY,
    EBADF, ECONNABORTED, ECONNREFUSED, ECONNRESET, EFAULT, EHOSTUNREACH, EINPROGRESS, EINTR,
    EINVAL, EISCONN, EMFILE, EMSGSIZE, ENETDOWN, ENETRESET, ENETUNREACH, ENFILE, ENOBUFS, ENOENT,
    ENOMEM, ENOPROTOOPT, ENOSPC, ENOSYS, ENOTCONN, ENOTSOCK, ENOTSUP, EOPNOTSUPP, EPERM, EPIPE,
    ETIMEDOUT, EWOULDBLOCK, F_GETFL, F_SETFL, FIONREAD, IPPROTO_IPV6, IPV6_V6ONLY, MSG_CTRUNC,
    MSG_PEEK, MSG_TRUNC, MSG_WAITALL, O_NONBLOCK, POLLERR, POLLHUP, POLLIN, POLLNVAL, POLLOUT,
    SHUT_RD, SHUT_RDWR, SHUT_WR, SO_REUSEADDR, SOCK_STREAM, SOL_SOCKET, accept, bind, c_int,
    clock_gettime, close, dup2, fcntl, getsockname, iovec, ioctl, listen, msghdr, nfds_t, poll,
    pollfd, recvmsg, sendmsg, setsockopt, shutdown, sockaddr, sockaddr_in, sockaddr_in6,
    sockaddr_storage, socket, socklen_t, timespec,
};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;
use std::time::Instant;
use std::{io, mem, ptr, slice};

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: c_int = libc::MSG_NOSIGNAL;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: c_int = 0;

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const NANOS_PER_MILLI: u64 = 1_000_000;

/// The host emulated on top of the platform socket API.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixHost;

impl UnixHost {
    /// Creates a non-blocking listening socket bound to `address`.
    ///
    /// The address must be a valid socket address string, such as
    /// `"127.0.0.1:8080"` or `"[::1]:8080"`.
    pub fn listen(address: &str) -> io::Result<Descriptor> {
        let (storage, len) = sys_parse_sockaddr(address)?;
        let domain = storage.ss_family as c_int;

        let fd = sys_socket(domain)?;

        let setup = sys_set_reuseaddr(fd)
            .and_then(|()| sys_ipv6_is_necessary(fd, domain))
            .and_then(|()| sys_bind(fd, &storage, len))
            .and_then(|()| sys_listen(fd));

        if let Err(e) = setup {
            unsafe { close(fd) };
            return Err(e);
        }

        Ok(Descriptor::new(fd as RawFd))
    }

    /// Creates a listening socket on `address` and moves it to the
    /// `offset`-th preopened descriptor, replacing whatever was open there.
    pub fn preopen(address: &str, offset: RawFd) -> io::Result<Descriptor> {
        let listener = Self::listen(address)?;
        let target = Descriptor::preopened(offset);

        if listener == target {
            return Ok(target);
        }

        let rc = unsafe { dup2(listener.raw() as c_int, target.raw() as c_int) };
        let result = if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(target)
        };

        unsafe { close(listener.raw() as c_int) };

        result
    }

    /// Returns the local address of a socket.
    pub fn local_addr(fd: Descriptor) -> io::Result<SocketAddr> {
        sys_sockname(fd.raw() as c_int)
    }
}

impl Host for UnixHost {
    unsafe fn sock_accept(&mut self, fd: RawFd, flags: u16, fd_out: *mut u8) -> Errno {
        let client = unsafe { accept(fd as c_int, ptr::null_mut(), ptr::null_mut()) };

        if client < 0 {
            return last_errno();
        }

        if FdFlags::from_bits_retain(flags).contains(FdFlags::NONBLOCK) {
            if let Err(e) = sys_set_nonblocking(client) {
                unsafe { close(client) };
                return io_errno(&e);
            }
        }

        unsafe { store(fd_out, &(client as u32).to_le_bytes()) };

        abi::ERRNO_SUCCESS
    }

    unsafe fn sock_recv(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        ri_flags: u16,
        ro_datalen: *mut u8,
        ro_flags: *mut u8,
    ) -> Errno {
        let ri_flags = RiFlags::from_bits_retain(ri_flags);
        let mut flags = 0;

        if ri_flags.contains(RiFlags::RECV_PEEK) {
            flags |= MSG_PEEK;
        }
        if ri_flags.contains(RiFlags::RECV_WAITALL) {
            flags |= MSG_WAITALL;
        }

        let mut message: msghdr = unsafe { mem::zeroed() };
        message.msg_iov = iovs as *mut iovec;
        message.msg_iovlen = iovs_len as _;

        let n = unsafe { recvmsg(fd as c_int, &mut message, flags) };

        if n < 0 {
            return last_errno();
        }

        let mut out = RoFlags::empty();

        if message.msg_flags & MSG_TRUNC != 0 {
            out |= RoFlags::RECV_DATA_TRUNCATED;
        }
        if message.msg_flags & MSG_CTRUNC != 0 {
            out |= RoFlags::RECV_FDS_TRUNCATED;
        }

        unsafe {
            store(ro_datalen, &(n as u32).to_le_bytes());
            store(ro_flags, &out.bits().to_le_bytes());
        }

        abi::ERRNO_SUCCESS
    }

    unsafe fn sock_send(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        _si_flags: u16,
        so_datalen: *mut u8,
    ) -> Errno {
        let mut message: msghdr = unsafe { mem::zeroed() };
        message.msg_iov = iovs as *mut iovec;
        message.msg_iovlen = iovs_len as _;

        let n = unsafe { sendmsg(fd as c_int, &message, SEND_FLAGS) };

        if n < 0 {
            return last_errno();
        }

        unsafe { store(so_datalen, &(n as u32).to_le_bytes()) };

        abi::ERRNO_SUCCESS
    }

    fn sock_shutdown(&mut self, fd: RawFd, how: u8) -> Errno {
        let how = SdFlags::from_bits_retain(how);

        let how = if how == SdFlags::RD | SdFlags::WR {
            SHUT_RDWR
        } else if how == SdFlags::RD {
            SHUT_RD
        } else if how == SdFlags::WR {
            SHUT_WR
        } else {
            return abi::ERRNO_INVAL;
        };

        if unsafe { shutdown(fd as c_int, how) } < 0 {
            last_errno()
        } else {
            abi::ERRNO_SUCCESS
        }
    }

    fn fd_close(&mut self, fd: RawFd) -> Errno {
        if unsafe { close(fd as c_int) } < 0 {
            last_errno()
        } else {
            abi::ERRNO_SUCCESS
        }
    }

    fn fd_datasync(&mut self, fd: RawFd) -> Errno {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        let rc = unsafe { libc::fdatasync(fd as c_int) };

        #[cfg(not(any(target_os = "linux", target_os = "android")))]
        let rc = unsafe { libc::fsync(fd as c_int) };

        if rc < 0 {
            last_errno()
        } else {
            abi::ERRNO_SUCCESS
        }
    }

    unsafe fn poll_oneoff(
        &mut self,
        subscriptions: *const u8,
        events: *mut u8,
        nsubscriptions: usize,
        nevents: *mut u8,
    ) -> Errno {
        if nsubscriptions == 0 {
            return abi::ERRNO_INVAL;
        }

        let input =
            unsafe { slice::from_raw_parts(subscriptions, nsubscriptions * SUBSCRIPTION_SIZE) };
        let output = unsafe { slice::from_raw_parts_mut(events, nsubscriptions * EVENT_SIZE) };

        let decoded: Result<Vec<Subscription>, SystemError> = input
            .chunks_exact(SUBSCRIPTION_SIZE)
            .map(abi::decode_subscription)
            .collect();

        let ready = match decoded.map_err(|e| e.code()).and_then(|s| wait(&s)) {
            Ok(ready) => ready,
            Err(errno) => return errno,
        };

        for (record, event) in output.chunks_exact_mut(EVENT_SIZE).zip(&ready) {
            record.fill(0);
            abi::encode_event(event, record);
        }

        unsafe { store(nevents, &(ready.len() as u32).to_le_bytes()) };

        abi::ERRNO_SUCCESS
    }
}

/// Blocks in `poll(2)` until a descriptor is ready or the nearest clock
/// deadline passes, and reports every satisfied subscription.
fn wait(subscriptions: &[Subscription]) -> Result<Vec<Event>, Errno> {
    let mut clocks = Vec::new();
    let mut watched = Vec::new();
    let mut fds = Vec::new();

    for subscription in subscriptions {
        let (fd, events) = match subscription.kind {
            SubscriptionKind::Clock(clock) => {
                let remaining = if clock.is_absolute() {
                    clock.timeout.saturating_sub(clock_now(clock.clock)?)
                } else {
                    clock.timeout
                };

                clocks.push((subscription.userdata, remaining));
                continue;
            }
            SubscriptionKind::FdRead(fd) => (fd, POLLIN),
            SubscriptionKind::FdWrite(fd) => (fd, POLLOUT),
        };

        watched.push(*subscription);
        fds.push(pollfd {
            fd: fd.raw() as c_int,
            events,
            revents: 0,
        });
    }

    let nearest = clocks.iter().map(|&(_, remaining)| remaining).min();
    let timeout_ms = match nearest {
        Some(ns) => ns.div_ceil(NANOS_PER_MILLI).min(c_int::MAX as u64) as c_int,
        None => -1,
    };

    let started = Instant::now();

    let ready = loop {
        let rc = unsafe { poll(fds.as_mut_ptr(), fds.len() as nfds_t, timeout_ms) };

        if rc >= 0 {
            break rc;
        }

        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(io_errno(&err));
        }
    };

    let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
    let mut events = Vec::new();

    for (subscription, pfd) in watched.iter().zip(&fds) {
        if pfd.revents == 0 {
            continue;
        }

        let error = if pfd.revents & POLLNVAL != 0 {
            abi::ERRNO_BADF
        } else if pfd.revents & POLLERR != 0 {
            abi::ERRNO_IO
        } else {
            abi::ERRNO_SUCCESS
        };

        let mut flags = EventRwFlags::empty();
        if pfd.revents & POLLHUP != 0 {
            flags |= EventRwFlags::HANGUP;
        }

        let kind = match subscription.kind {
            SubscriptionKind::FdRead(fd) => EventKind::FdRead(FdReadiness {
                nbytes: readable_bytes(fd),
                flags,
            }),
            SubscriptionKind::FdWrite(_) => EventKind::FdWrite(FdReadiness { nbytes: 0, flags }),
            SubscriptionKind::Clock(_) => continue,
        };

        events.push(Event {
            userdata: subscription.userdata,
            error,
            kind,
        });
    }

    // A poll that timed out has waited at least until the nearest deadline.
    let fired_by = if ready == 0 {
        elapsed.max(nearest.unwrap_or(0))
    } else {
        elapsed
    };

    for (userdata, remaining) in clocks {
        if remaining <= fired_by {
            events.push(Event {
                userdata,
                error: abi::ERRNO_SUCCESS,
                kind: EventKind::Clock,
            });
        }
    }

    Ok(events)
}

/// Reads the current time of `clock` in nanoseconds.
fn clock_now(clock: ClockId) -> Result<u64, Errno> {
    let id = match clock {
        ClockId::Realtime => CLOCK_REALTIME,
        ClockId::Monotonic => CLOCK_MONOTONIC,
        ClockId::ProcessCputime => CLOCK_PROCESS_CPUTIME_ID,
        ClockId::ThreadCputime => CLOCK_THREAD_CPUTIME_ID,
    };

    let mut now: timespec = unsafe { mem::zeroed() };
    if unsafe { clock_gettime(id, &mut now) } < 0 {
        return Err(last_errno());
    }

    Ok((now.tv_sec as u64)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(now.tv_nsec as u64))
}

/// Returns how many bytes are queued for reading on `fd`, or 0 if unknown.
fn readable_bytes(fd: Descriptor) -> u64 {
    let mut available: c_int = 0;
    let rc = unsafe { ioctl(fd.raw() as c_int, FIONREAD, &mut available as *mut c_int) };

    if rc < 0 { 0 } else { available.max(0) as u64 }
}

/// Copies `bytes` to a host out-pointer.
unsafe fn store(dst: *mut u8, bytes: &[u8]) {
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
}

fn last_errno() -> Errno {
    io_errno(&io::Error::last_os_error())
}

fn io_errno(err: &io::Error) -> Errno {
    translate(err.raw_os_error().unwrap_or(0))
}

/// Translates a platform `errno` into the WASI error space.
///
/// Codes without a counterpart become `IO`.
fn translate(code: c_int) -> Errno {
    if code == EAGAIN || code == EWOULDBLOCK {
        return abi::ERRNO_AGAIN;
    }
    if code == ENOTSUP || code == EOPNOTSUPP {
        return abi::ERRNO_NOTSUP;
    }

    match code {
        EACCES => abi::ERRNO_ACCES,
        EADDRINUSE => abi::ERRNO_ADDRINUSE,
        EADDRNOTAVAIL => abi::ERRNO_ADDRNOTAVAIL,
        EAFNOSUPPORT => abi::ERRNO_AFNOSUPPORT,
        EALREADY => abi::ERRNO_ALREADY,
        EBADF => abi::ERRNO_BADF,
        ECONNABORTED => abi::ERRNO_CONNABORTED,
        ECONNREFUSED => abi::ERRNO_CONNREFUSED,
        ECONNRESET => abi::ERRNO_CONNRESET,
        EFAULT => abi::ERRNO_FAULT,
        EHOSTUNREACH => abi::ERRNO_HOSTUNREACH,
        EINPROGRESS => abi::ERRNO_INPROGRESS,
        EINTR => abi::ERRNO_INTR,
        EINVAL => abi::ERRNO_INVAL,
        EISCONN => abi::ERRNO_ISCONN,
        EMFILE => abi::ERRNO_MFILE,
        EMSGSIZE => abi::ERRNO_MSGSIZE,
        ENETDOWN => abi::ERRNO_NETDOWN,
        ENETRESET => abi::ERRNO_NETRESET,
        ENETUNREACH => abi::ERRNO_NETUNREACH,
        ENFILE => abi::ERRNO_NFILE,
        ENOBUFS => abi::ERRNO_NOBUFS,
        ENOENT => abi::ERRNO_NOENT,
        ENOMEM => abi::ERRNO_NOMEM,
        ENOPROTOOPT => abi::ERRNO_NOPROTOOPT,
        ENOSPC => abi::ERRNO_NOSPC,
        ENOSYS => abi::ERRNO_NOSYS,
        ENOTCONN => abi::ERRNO_NOTCONN,
        ENOTSOCK => abi::ERRNO_NOTSOCK,
        EPERM => abi::ERRNO_PERM,
        EPIPE => abi::ERRNO_PIPE,
        ETIMEDOUT => abi::ERRNO_TIMEDOUT,
        _ => abi::ERRNO_IO,
    }
}

/// Sets a file descriptor to non-blocking mode.
fn sys_set_nonblocking(fd: c_int) -> io::Result<()> {
    let flags = unsafe { fcntl(fd, F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = unsafe { fcntl(fd, F_SETFL, flags | O_NONBLOCK) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Creates a non-blocking stream socket.
fn sys_socket(domain: c_int) -> io::Result<c_int> {
    let fd = unsafe { socket(domain, SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    if let Err(e) = sys_set_nonblocking(fd) {
        unsafe { close(fd) };
        return Err(e);
    }

    Ok(fd)
}

fn sys_bind(fd: c_int, addr: &sockaddr_storage, len: socklen_t) -> io::Result<()> {
    let rc = unsafe { bind(fd, addr as *const _ as *const sockaddr, len) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sys_listen(fd: c_int) -> io::Result<()> {
    let rc = unsafe { listen(fd, 128) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sys_sockname(fd: c_int) -> io::Result<SocketAddr> {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };
    let mut len = mem::size_of::<sockaddr_storage>() as socklen_t;

    let rc = unsafe { getsockname(fd, &mut storage as *mut _ as *mut sockaddr, &mut len) };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        sockaddr_storage_to_socketaddr(&storage)
    }
}

fn sys_set_reuseaddr(fd: c_int) -> io::Result<()> {
    let yes: c_int = 1;
    let rc = unsafe {
        setsockopt(
            fd,
            SOL_SOCKET,
            SO_REUSEADDR,
            &yes as *const _ as *const _,
            mem::size_of::<c_int>() as socklen_t,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Enables IPv6 dual-stack support when required.
fn sys_ipv6_is_necessary(fd: c_int, domain: c_int) -> io::Result<()> {
    if domain != AF_INET6 {
        return Ok(());
    }

    let v6only: c_int = 0;
    let rc = unsafe {
        setsockopt(
            fd,
            IPPROTO_IPV6,
            IPV6_V6ONLY,
            &v6only as *const _ as *const _,
            mem::size_of::<c_int>() as socklen_t,
        )
    };

    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sys_parse_sockaddr(address: &str) -> io::Result<(sockaddr_storage, socklen_t)> {
    let addr = SocketAddr::from_str(address)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "invalid socket addr"))?;

    Ok(socketaddr_to_storage(&addr))
}

fn sockaddr_storage_to_socketaddr(storage: &sockaddr_storage) -> io::Result<SocketAddr> {
    match storage.ss_family as c_int {
        AF_INET => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in) };
            let ip = Ipv4Addr::from(u32::from_be(addr.sin_addr.s_addr));
            let port = u16::from_be(addr.sin_port);

            Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
        }

        AF_INET6 => {
            let addr = unsafe { &*(storage as *const _ as *const sockaddr_in6) };
            let ip = Ipv6Addr::from(addr.sin6_addr.s6_addr);
            let port = u16::from_be(addr.sin6_port);

            Ok(SocketAddr::V6(SocketAddrV6::new(
                ip,
                port,
                addr.sin6_flowinfo,
                addr.sin6_scope_id,
            )))
        }

        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "unsupported address family",
        )),
    }
}

fn socketaddr_to_storage(addr: &SocketAddr) -> (sockaddr_storage, socklen_t) {
    let mut storage: sockaddr_storage = unsafe { mem::zeroed() };

    match addr {
        SocketAddr::V4(v4) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in) };
            sa.sin_family = AF_INET as _;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from(*v4.ip()).to_be();

            (storage, mem::size_of::<sockaddr_in>() as socklen_t)
        }

        SocketAddr::V6(v6) => {
            let sa = unsafe { &mut *(&mut storage as *mut _ as *mut sockaddr_in6) };
            sa.sin6_family = AF_INET6 as _;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr.s6_addr = v6.ip().octets();
            sa.sin6_flowinfo = v6.flowinfo();
            sa.sin6_scope_id = v6.scope_id();

            (storage, mem::size_of::<sockaddr_in6>() as socklen_t)
        }
    }
}

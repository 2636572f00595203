use crate::SystemError;
use crate::fd::Descriptor;
use crate::flags::{OpenFlag, RecvFlag, SdFlags, SendFlag, ShutdownDirection, combine};
use crate::sys::Host;
use crate::sys::abi::{self, FD_CELL, FLAGS_CELL, IOVEC_SIZE, SIZE_CELL};
use crate::utils::scratch::Scratch;

use log::trace;

/// Accepts a pending connection on a listening socket.
///
/// The new descriptor is opened in non-blocking mode.
///
/// # Errors
///
/// Returns the host error code on failure; `AGAIN` means no connection is
/// pending.
pub fn accept<H: Host + ?Sized>(
    host: &mut H,
    listening: Descriptor,
) -> Result<Descriptor, SystemError> {
    let flags = combine(&[OpenFlag::NonBlocking]);
    let mut cell = Scratch::zeroed(FD_CELL);

    let errno = unsafe { host.sock_accept(listening.raw(), flags.bits(), cell.as_mut_ptr()) };
    SystemError::check(errno)?;

    let fd = Descriptor::new(abi::read_u32(&cell, 0));
    trace!("accepted {fd} on {listening}");

    Ok(fd)
}

/// Writes `content` to `fd`, then sends a flagless shutdown hint.
///
/// The hint carries no direction, so it never closes either half of the
/// connection. Its own status is logged and does not affect the result.
///
/// # Errors
///
/// Returns the host error code if the write fails; the hint is still sent.
pub fn send<H: Host + ?Sized>(
    host: &mut H,
    fd: Descriptor,
    content: &str,
) -> Result<usize, SystemError> {
    let written = write(host, fd, content.as_bytes());
    shutdown_hint(host, fd);

    written
}

/// Writes the first `length` bytes of `bytes` to `fd`.
///
/// `length` is clamped to `bytes.len()`. Unlike [`send`], no shutdown hint
/// follows the write.
///
/// # Errors
///
/// Returns the host error code if the write fails.
pub fn send_raw<H: Host + ?Sized>(
    host: &mut H,
    fd: Descriptor,
    bytes: &[u8],
    length: usize,
) -> Result<usize, SystemError> {
    let length = length.min(bytes.len());

    write(host, fd, &bytes[..length])
}

/// Reads up to `max_size` bytes from `fd`, then sends a flagless shutdown
/// hint.
///
/// The read is issued with the wait-all flag. On success the returned buffer
/// is trimmed to the number of bytes actually read, which is also returned.
///
/// # Errors
///
/// Returns the host error code if the read fails; `AGAIN` means no data is
/// available right now.
pub fn receive<H: Host + ?Sized>(
    host: &mut H,
    fd: Descriptor,
    max_size: usize,
) -> Result<(Vec<u8>, usize), SystemError> {
    let mut buffer = Scratch::zeroed(max_size);
    let mut iovec = Scratch::zeroed(IOVEC_SIZE);
    abi::encode_iovec(&mut iovec, buffer.as_mut_ptr() as usize, max_size);

    let mut datalen = Scratch::zeroed(SIZE_CELL);
    let mut ro_flags = Scratch::zeroed(FLAGS_CELL);
    let ri_flags = combine(&[RecvFlag::WaitAll]);

    let errno = unsafe {
        host.sock_recv(
            fd.raw(),
            iovec.as_ptr(),
            1,
            ri_flags.bits(),
            datalen.as_mut_ptr(),
            ro_flags.as_mut_ptr(),
        )
    };

    let received = SystemError::check(errno).map(|()| {
        let n = (abi::read_u32(&datalen, 0) as usize).min(max_size);
        trace!(
            "received {n} bytes on {fd} (roflags {:#x})",
            abi::read_u16(&ro_flags, 0)
        );

        (buffer[..n].to_vec(), n)
    });

    shutdown_hint(host, fd);

    received
}

/// Shuts down the given halves of the connection.
///
/// # Errors
///
/// Returns the host error code on failure. Hosts commonly reject an empty
/// direction set with `INVAL`.
pub fn shutdown<H: Host + ?Sized>(
    host: &mut H,
    fd: Descriptor,
    directions: &[ShutdownDirection],
) -> Result<(), SystemError> {
    let how = combine(directions);

    SystemError::check(host.sock_shutdown(fd.raw(), how.bits()))
}

/// Shuts down both halves of the connection and releases the descriptor.
///
/// The descriptor is closed even if the shutdown fails.
///
/// # Errors
///
/// Returns the first error: the shutdown's if it failed, otherwise the
/// close's.
pub fn close<H: Host + ?Sized>(host: &mut H, fd: Descriptor) -> Result<(), SystemError> {
    let shut = shutdown(host, fd, &[ShutdownDirection::Read, ShutdownDirection::Write]);
    let closed = SystemError::check(host.fd_close(fd.raw()));

    trace!("closed {fd} (shutdown: {shut:?}, close: {closed:?})");

    shut.and(closed)
}

/// Forces pending writes on `fd` to complete.
///
/// # Errors
///
/// Returns the host error code on failure.
pub fn flush<H: Host + ?Sized>(host: &mut H, fd: Descriptor) -> Result<(), SystemError> {
    SystemError::check(host.fd_datasync(fd.raw()))
}

fn write<H: Host + ?Sized>(
    host: &mut H,
    fd: Descriptor,
    bytes: &[u8],
) -> Result<usize, SystemError> {
    let mut iovec = Scratch::zeroed(IOVEC_SIZE);
    abi::encode_iovec(&mut iovec, bytes.as_ptr() as usize, bytes.len());

    let mut datalen = Scratch::zeroed(SIZE_CELL);
    let si_flags = combine(&[SendFlag::Default]);

    let errno = unsafe {
        host.sock_send(
            fd.raw(),
            iovec.as_ptr(),
            1,
            si_flags.bits(),
            datalen.as_mut_ptr(),
        )
    };
    SystemError::check(errno)?;

    let n = abi::read_u32(&datalen, 0) as usize;
    trace!("sent {n} of {} bytes on {fd}", bytes.len());

    Ok(n)
}

fn shutdown_hint<H: Host + ?Sized>(host: &mut H, fd: Descriptor) {
    let errno = host.sock_shutdown(fd.raw(), SdFlags::empty().bits());

    if let Err(err) = SystemError::check(errno) {
        trace!("shutdown hint on {fd} ignored: {err}");
    }
}

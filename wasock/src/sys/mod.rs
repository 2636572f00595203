//! The host call surface.
//!
//! Everything this crate does goes through the seven calls of [`Host`],
//! which mirror the socket and polling imports of `wasi_snapshot_preview1`.
//! Arguments are raw addresses into buffers laid out as described in
//! [`abi`]; results are written back through out-pointers and the call
//! itself returns an error code.
//!
//! The concrete backend is selected at compile time:
//! - on `wasi` targets, [`WasiHost`] forwards to the real imports,
//! - on unix targets, [`UnixHost`] emulates them with libc.
//!
//! [`DefaultHost`] names whichever backend the current target uses.

pub mod abi;

#[cfg(target_os = "wasi")]
mod wasi;

#[cfg(unix)]
mod unix;

#[cfg(target_os = "wasi")]
pub use wasi::WasiHost;

#[cfg(target_os = "wasi")]
pub type DefaultHost = WasiHost;

#[cfg(unix)]
pub use unix::UnixHost;

#[cfg(unix)]
pub type DefaultHost = UnixHost;

use crate::fd::RawFd;
use abi::Errno;

/// The raw host syscall ABI.
///
/// Every method returns `ERRNO_SUCCESS` (`0`) or a host error code. Results
/// are written through the out-pointers, which are only written on success.
///
/// # Safety
///
/// Callers must pass pointers that are valid for the documented number of
/// bytes for the whole duration of the call. Implementations must not
/// retain any pointer past the call.
pub trait Host {
    /// Accepts a pending connection on the listening socket `fd`.
    ///
    /// On success the new descriptor is written as a little-endian `u32` to
    /// `fd_out` (4 bytes). `flags` are the descriptor flags of the new socket.
    ///
    /// # Safety
    ///
    /// `fd_out` must be valid for a 4-byte write.
    unsafe fn sock_accept(&mut self, fd: RawFd, flags: u16, fd_out: *mut u8) -> Errno;

    /// Receives into the buffers described by `iovs_len` iovec records.
    ///
    /// On success writes the byte count (`u32`, 4 bytes) to `ro_datalen` and
    /// the receive output flags (`u16`, 2 bytes) to `ro_flags`.
    ///
    /// # Safety
    ///
    /// `iovs` must point to `iovs_len` iovec records whose buffers are valid
    /// for writes; the out-pointers must be valid for their writes.
    unsafe fn sock_recv(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        ri_flags: u16,
        ro_datalen: *mut u8,
        ro_flags: *mut u8,
    ) -> Errno;

    /// Sends the bytes described by `iovs_len` iovec records.
    ///
    /// On success writes the byte count (`u32`, 4 bytes) to `so_datalen`.
    ///
    /// # Safety
    ///
    /// `iovs` must point to `iovs_len` iovec records whose buffers are valid
    /// for reads; `so_datalen` must be valid for a 4-byte write.
    unsafe fn sock_send(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        si_flags: u16,
        so_datalen: *mut u8,
    ) -> Errno;

    /// Shuts down the halves of the connection named by `how`.
    fn sock_shutdown(&mut self, fd: RawFd, how: u8) -> Errno;

    /// Releases the descriptor.
    fn fd_close(&mut self, fd: RawFd) -> Errno;

    /// Forces pending writes on the descriptor to complete.
    fn fd_datasync(&mut self, fd: RawFd) -> Errno;

    /// Blocks until at least one of `nsubscriptions` subscriptions is satisfied.
    ///
    /// Writes up to `nsubscriptions` event records to `events` and the number
    /// written (`u32`, 4 bytes) to `nevents`.
    ///
    /// # Safety
    ///
    /// `subscriptions` must be valid for `nsubscriptions * 48` bytes of reads,
    /// `events` for `nsubscriptions * 32` bytes of writes and `nevents` for a
    /// 4-byte write.
    unsafe fn poll_oneoff(
        &mut self,
        subscriptions: *const u8,
        events: *mut u8,
        nsubscriptions: usize,
        nevents: *mut u8,
    ) -> Errno;
}

impl<H: Host + ?Sized> Host for &mut H {
    unsafe fn sock_accept(&mut self, fd: RawFd, flags: u16, fd_out: *mut u8) -> Errno {
        unsafe { (**self).sock_accept(fd, flags, fd_out) }
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
        unsafe { (**self).sock_recv(fd, iovs, iovs_len, ri_flags, ro_datalen, ro_flags) }
    }

    unsafe fn sock_send(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        si_flags: u16,
        so_datalen: *mut u8,
    ) -> Errno {
        unsafe { (**self).sock_send(fd, iovs, iovs_len, si_flags, so_datalen) }
    }

    fn sock_shutdown(&mut self, fd: RawFd, how: u8) -> Errno {
        (**self).sock_shutdown(fd, how)
    }

    fn fd_close(&mut self, fd: RawFd) -> Errno {
        (**self).fd_close(fd)
    }

    fn fd_datasync(&mut self, fd: RawFd) -> Errno {
        (**self).fd_datasync(fd)
    }

    unsafe fn poll_oneoff(
        &mut self,
        subscriptions: *const u8,
        events: *mut u8,
        nsubscriptions: usize,
        nevents: *mut u8,
    ) -> Errno {
        unsafe { (**self).poll_oneoff(subscriptions, events, nsubscriptions, nevents) }
    }
}

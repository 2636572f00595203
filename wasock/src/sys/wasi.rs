//! `wasi_snapshot_preview1` backend.
//!
//! Forwards each [`Host`] call to the matching import. Addresses are passed
//! as 32-bit offsets into linear memory.

use super::Host;
use super::abi::Errno;
use crate::fd::RawFd;

mod raw {
    #[link(wasm_import_module = "wasi_snapshot_preview1")]
    unsafe extern "C" {
        pub(super) fn sock_accept(fd: i32, flags: i32, fd_out: i32) -> i32;
        pub(super) fn sock_recv(
            fd: i32,
            iovs: i32,
            iovs_len: i32,
            ri_flags: i32,
            ro_datalen: i32,
            ro_flags: i32,
        ) -> i32;
        pub(super) fn sock_send(
            fd: i32,
            iovs: i32,
            iovs_len: i32,
            si_flags: i32,
            so_datalen: i32,
        ) -> i32;
        pub(super) fn sock_shutdown(fd: i32, how: i32) -> i32;
        pub(super) fn fd_close(fd: i32) -> i32;
        pub(super) fn fd_datasync(fd: i32) -> i32;
        pub(super) fn poll_oneoff(
            subscriptions: i32,
            events: i32,
            nsubscriptions: i32,
            nevents: i32,
        ) -> i32;
    }
}

/// The host provided by a WASI preview1 runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasiHost;

impl Host for WasiHost {
    unsafe fn sock_accept(&mut self, fd: RawFd, flags: u16, fd_out: *mut u8) -> Errno {
        unsafe { raw::sock_accept(fd as i32, flags as i32, fd_out as i32) as Errno }
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
        unsafe {
            raw::sock_recv(
                fd as i32,
                iovs as i32,
                iovs_len as i32,
                ri_flags as i32,
                ro_datalen as i32,
                ro_flags as i32,
            ) as Errno
        }
    }

    unsafe fn sock_send(
        &mut self,
        fd: RawFd,
        iovs: *const u8,
        iovs_len: usize,
        si_flags: u16,
        so_datalen: *mut u8,
    ) -> Errno {
        unsafe {
            raw::sock_send(
                fd as i32,
                iovs as i32,
                iovs_len as i32,
                si_flags as i32,
                so_datalen as i32,
            ) as Errno
        }
    }

    fn sock_shutdown(&mut self, fd: RawFd, how: u8) -> Errno {
        unsafe { raw::sock_shutdown(fd as i32, how as i32) as Errno }
    }

    fn fd_close(&mut self, fd: RawFd) -> Errno {
        unsafe { raw::fd_close(fd as i32) as Errno }
    }

    fn fd_datasync(&mut self, fd: RawFd) -> Errno {
        unsafe { raw::fd_datasync(fd as i32) as Errno }
    }

    unsafe fn poll_oneoff(
        &mut self,
        subscriptions: *const u8,
        events: *mut u8,
        nsubscriptions: usize,
        nevents: *mut u8,
    ) -> Errno {
        unsafe {
            raw::poll_oneoff(
                subscriptions as i32,
                events as i32,
                nsubscriptions as i32,
                nevents as i32,
            ) as Errno
        }
    }
}

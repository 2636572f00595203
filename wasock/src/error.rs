use crate::sys::abi::{self, Errno};

use std::io;
use thiserror::Error;

/// An error code returned by a host call.
///
/// The code is forwarded exactly as the host reported it. Only
/// [`would-block`](Self::is_would_block) carries a meaning of its own; every
/// other code is opaque to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("host call failed: {} (errno {code})", describe(.code))]
pub struct SystemError {
    code: Errno,
}

fn describe(code: &Errno) -> &'static str {
    abi::errno_name(*code)
}

impl SystemError {
    /// The operation cannot complete without waiting.
    pub const WOULD_BLOCK: SystemError = SystemError::new(abi::ERRNO_AGAIN);

    /// Wraps a raw host error code.
    pub const fn new(code: Errno) -> Self {
        Self { code }
    }

    /// Turns a host return value into a `Result`.
    ///
    /// `ERRNO_SUCCESS` maps to `Ok(())`, anything else to `Err`.
    pub const fn check(code: Errno) -> Result<(), SystemError> {
        if code == abi::ERRNO_SUCCESS {
            Ok(())
        } else {
            Err(SystemError::new(code))
        }
    }

    /// Returns the raw host error code.
    pub const fn code(&self) -> Errno {
        self.code
    }

    /// Returns the symbolic name of the error code, e.g. `"AGAIN"`.
    pub const fn name(&self) -> &'static str {
        abi::errno_name(self.code)
    }

    /// Returns `true` if the host reported that the call would block.
    pub const fn is_would_block(&self) -> bool {
        self.code == abi::ERRNO_AGAIN
    }
}

impl From<SystemError> for io::Error {
    fn from(err: SystemError) -> Self {
        let kind = match err.code {
            abi::ERRNO_AGAIN => io::ErrorKind::WouldBlock,
            abi::ERRNO_ACCES | abi::ERRNO_PERM | abi::ERRNO_NOTCAPABLE => {
                io::ErrorKind::PermissionDenied
            }
            abi::ERRNO_ADDRINUSE => io::ErrorKind::AddrInUse,
            abi::ERRNO_ADDRNOTAVAIL => io::ErrorKind::AddrNotAvailable,
            abi::ERRNO_CONNABORTED => io::ErrorKind::ConnectionAborted,
            abi::ERRNO_CONNREFUSED => io::ErrorKind::ConnectionRefused,
            abi::ERRNO_CONNRESET => io::ErrorKind::ConnectionReset,
            abi::ERRNO_INTR => io::ErrorKind::Interrupted,
            abi::ERRNO_INVAL => io::ErrorKind::InvalidInput,
            abi::ERRNO_NOENT => io::ErrorKind::NotFound,
            abi::ERRNO_NOTCONN => io::ErrorKind::NotConnected,
            abi::ERRNO_PIPE => io::ErrorKind::BrokenPipe,
            abi::ERRNO_TIMEDOUT => io::ErrorKind::TimedOut,
            abi::ERRNO_NOTSUP | abi::ERRNO_NOSYS => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };

        io::Error::new(kind, err)
    }
}

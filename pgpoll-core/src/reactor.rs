use std::fmt::{self, Display};
use std::io;
use std::os::fd::BorrowedFd;

use crate::error::FatalError;

/// Readiness a connection can wait for on its socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Readable,
    Writable,
}

impl Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interest::Readable => "readable",
            Interest::Writable => "writable",
        })
    }
}

/// Callback invoked by a [`Reactor`] when a registered readiness event occurs.
pub type ReadyCallback = Box<dyn FnOnce() + 'static>;

/// The single-threaded scheduler a connection registers socket interest with.
///
/// Registrations are one-shot: a callback fires at most once, on the next readiness
/// event for its interest, and is never invoked synchronously from inside
/// [`register`](Self::register). A descriptor has at most one registration per
/// [`Interest`] at a time.
pub trait Reactor {
    /// Arm `callback` to run when `fd` becomes ready for `interest`.
    fn register(
        &self,
        fd: BorrowedFd<'_>,
        interest: Interest,
        callback: ReadyCallback,
    ) -> io::Result<()>;

    /// Disarm the registration for `interest` on `fd`.
    ///
    /// Deregistering an interest that is not armed, or has already fired, is a no-op.
    fn deregister(&self, fd: BorrowedFd<'_>, interest: Interest);

    /// Hand an unrecoverable connection error to the process-wide error sink.
    ///
    /// Must not call back into the connection that reported it.
    fn report_unhandled_error(&self, error: FatalError);

    fn register_readable(&self, fd: BorrowedFd<'_>, callback: ReadyCallback) -> io::Result<()> {
        self.register(fd, Interest::Readable, callback)
    }

    fn register_writable(&self, fd: BorrowedFd<'_>, callback: ReadyCallback) -> io::Result<()> {
        self.register(fd, Interest::Writable, callback)
    }

    fn deregister_readable(&self, fd: BorrowedFd<'_>) {
        self.deregister(fd, Interest::Readable)
    }

    fn deregister_writable(&self, fd: BorrowedFd<'_>) {
        self.deregister(fd, Interest::Writable)
    }
}

//! The capability a non-blocking database driver must provide.
//!
//! The driver performs all network I/O and SQL execution itself. pgpoll only asks it
//! what it needs next and waits on its socket accordingly.

use std::os::fd::BorrowedFd;

use crate::cursor::CursorOptions;
use crate::error::DriverError;
use crate::options::ConnectOptions;

/// The outcome of a single [`Driver::poll`] step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// The last request has been fully serviced.
    Ok,
    /// The driver must wait for its socket to become readable.
    Read,
    /// The driver must wait for its socket to become writable.
    Write,
    /// The request failed; the error is available from [`Driver::take_error`].
    Error,
    /// A status code the driver does not document.
    Unknown(i32),
}

impl PollStatus {
    pub const OK: i32 = 0;
    pub const READ: i32 = 1;
    pub const WRITE: i32 = 2;
    pub const ERROR: i32 = 3;
}

impl From<i32> for PollStatus {
    fn from(code: i32) -> Self {
        match code {
            PollStatus::OK => PollStatus::Ok,
            PollStatus::READ => PollStatus::Read,
            PollStatus::WRITE => PollStatus::Write,
            PollStatus::ERROR => PollStatus::Error,
            code => PollStatus::Unknown(code),
        }
    }
}

/// A connection handle opened in non-blocking mode.
///
/// The handle exclusively owns its socket. Every method is called from the thread that
/// drives the owning [`Connection`](crate::connection::Connection).
pub trait Driver: 'static {
    /// The driver-level cursor produced by [`cursor`](Self::cursor).
    type Cursor;

    /// Advance the current request and report what the driver needs next.
    ///
    /// Returning `Err` signals that the driver raised while polling. Errors of kind
    /// [`Internal`](crate::error::DriverErrorKind::Internal) are treated as fatal.
    fn poll(&mut self) -> Result<PollStatus, DriverError>;

    /// The socket the driver communicates over. Fixed for the lifetime of the handle.
    fn socket(&self) -> BorrowedFd<'_>;

    /// `true` while a request has been issued and not yet fully serviced.
    fn is_executing(&self) -> bool;

    /// Begin creating a cursor. Completion is observed through [`poll`](Self::poll).
    fn cursor(&mut self, options: &CursorOptions) -> Result<Self::Cursor, DriverError>;

    /// The error behind the last [`PollStatus::Error`], if the driver retained one.
    fn take_error(&mut self) -> Option<DriverError>;

    /// Close the connection and release the socket.
    fn close(&mut self);
}

/// Issues the non-blocking connect that produces a [`Driver`].
pub trait Connect {
    type Driver: Driver;

    /// Start connecting. The returned handle is executing; the handshake completes
    /// through [`Driver::poll`].
    fn connect(&self, options: &ConnectOptions) -> Result<Self::Driver, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::PollStatus;

    #[test]
    fn it_maps_status_codes() {
        assert_eq!(PollStatus::from(0), PollStatus::Ok);
        assert_eq!(PollStatus::from(1), PollStatus::Read);
        assert_eq!(PollStatus::from(2), PollStatus::Write);
        assert_eq!(PollStatus::from(3), PollStatus::Error);
        assert_eq!(PollStatus::from(4), PollStatus::Unknown(4));
        assert_eq!(PollStatus::from(-1), PollStatus::Unknown(-1));
    }
}

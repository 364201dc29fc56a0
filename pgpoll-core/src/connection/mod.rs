use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;

use crate::completion::{PendingSlot, Waiter};
use crate::cursor::{Cursor, CursorOptions};
use crate::driver::Driver;
use crate::error::{DriverError, Error, Result};
use crate::reactor::{Interest, Reactor};

pub use establish::open;

mod close;
mod establish;
mod poll;

pub(crate) use poll::{advance, Trigger};

/// Where a connection is in its readiness cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No interest registered with the reactor.
    Idle,
    /// Waiting for the socket to become readable.
    AwaitingReadable,
    /// Waiting for the socket to become writable.
    AwaitingWritable,
    /// Closed after an unrecoverable error was reported to the reactor.
    Fatal,
    /// Closed by the caller.
    Closed,
}

/// A connection driven by a non-blocking [`Driver`] on a single-threaded [`Reactor`].
///
/// At most one operation may be waiting on a connection at a time; starting another
/// fails with [`Error::OperationInProgress`]. The connection is not `Send`: the reactor's
/// callbacks and every caller run on the same thread.
///
/// Dropping the last handle (including any [`Cursor`]s created from it) closes the
/// connection.
pub struct Connection<D: Driver> {
    pub(crate) inner: Rc<RefCell<ConnectionInner<D>>>,
}

pub(crate) struct ConnectionInner<D: Driver> {
    // `None` once closed
    pub(crate) driver: Option<D>,
    pub(crate) descriptor: RawFd,
    pub(crate) pending: PendingSlot,
    // the one interest currently registered with the reactor, if any
    pub(crate) armed: Option<Interest>,
    pub(crate) reactor: Rc<dyn Reactor>,
    pub(crate) fatal: bool,
}

impl<D: Driver> Connection<D> {
    pub(crate) fn new(driver: D, reactor: Rc<dyn Reactor>) -> Self {
        let descriptor = driver.socket().as_raw_fd();

        Connection {
            inner: Rc::new(RefCell::new(ConnectionInner {
                driver: Some(driver),
                descriptor,
                pending: PendingSlot::default(),
                armed: None,
                reactor,
                fatal: false,
            })),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.borrow().state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().is_closed()
    }

    /// The socket descriptor registered with the reactor.
    pub fn descriptor(&self) -> RawFd {
        self.inner.borrow().descriptor
    }

    /// Request a cursor from the driver and wait for the driver to finish creating it.
    pub async fn cursor(&self, options: CursorOptions) -> Result<Cursor<D>> {
        let raw = self
            .request("cursor", |driver| driver.cursor(&options))
            .await?;

        Ok(Cursor {
            conn: Rc::clone(&self.inner),
            options,
            raw,
        })
    }

    /// Start a request on the driver with `start`, then wait until the driver has
    /// fully serviced it.
    ///
    /// `operation` names the request in [`Error::OperationInProgress`].
    pub async fn request<T>(
        &self,
        operation: &'static str,
        start: impl FnOnce(&mut D) -> Result<T, DriverError>,
    ) -> Result<T> {
        let waiter = self.begin_operation(operation)?;

        let started = {
            let mut this = self.inner.borrow_mut();

            match this.driver.as_mut() {
                Some(driver) => start(driver).map_err(Error::Driver),
                None => Err(Error::ConnectionClosed),
            }
        };

        let value = match started {
            Ok(value) => value,
            Err(e) => {
                self.inner.borrow_mut().pending.abandon(waiter.id());
                return Err(e);
            }
        };

        self.await_completion(waiter).await?;

        Ok(value)
    }

    pub(crate) fn begin_operation(&self, operation: &'static str) -> Result<Waiter> {
        let mut this = self.inner.borrow_mut();

        if this.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let waiter = this.pending.begin(operation)?;

        tracing::debug!(fd = this.descriptor, operation, "operation started");

        Ok(waiter)
    }

    /// Seed the poll loop and wait on `waiter`.
    ///
    /// The driver must already be executing the request `waiter` was created for.
    pub(crate) async fn await_completion(&self, waiter: Waiter) -> Result<()> {
        {
            let this = self.inner.borrow();

            assert!(
                this.pending.is_owned_by(waiter.id()),
                "await_completion() called without a matching begin_operation()"
            );
            assert!(
                this.driver.as_ref().is_some_and(|d| d.is_executing()),
                "underlying connection is not executing a request; is it in non-blocking mode?"
            );
        }

        let _guard = PendingGuard {
            inner: &self.inner,
            id: waiter.id(),
        };

        advance(&self.inner, Trigger::Seed);

        waiter.await
    }
}

impl<D: Driver> Debug for Connection<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let this = self.inner.borrow();

        f.debug_struct("Connection")
            .field("descriptor", &this.descriptor)
            .field("state", &this.state())
            .field("pending", &this.pending.is_set())
            .finish()
    }
}

impl<D: Driver> ConnectionInner<D> {
    pub(crate) fn is_closed(&self) -> bool {
        self.driver.is_none()
    }

    pub(crate) fn state(&self) -> ConnectionState {
        if self.is_closed() {
            return if self.fatal {
                ConnectionState::Fatal
            } else {
                ConnectionState::Closed
            };
        }

        match self.armed {
            Some(Interest::Readable) => ConnectionState::AwaitingReadable,
            Some(Interest::Writable) => ConnectionState::AwaitingWritable,
            None => ConnectionState::Idle,
        }
    }
}

// Releases the pending slot when the waiting future completes or is dropped.
struct PendingGuard<'a, D: Driver> {
    inner: &'a Rc<RefCell<ConnectionInner<D>>>,
    id: u64,
}

impl<D: Driver> Drop for PendingGuard<'_, D> {
    fn drop(&mut self) {
        let Ok(mut this) = self.inner.try_borrow_mut() else {
            // the slot stays taken; later operations fail with `OperationInProgress`
            tracing::warn!(
                operation_id = self.id,
                "operation dropped while its connection was in use; pending slot not released"
            );
            return;
        };

        if this.pending.abandon(self.id) {
            if let Some(interest) = this.armed {
                this.disarm(interest);
            }

            tracing::debug!(fd = this.descriptor, "operation abandoned before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::io;
    use std::os::fd::{AsFd, BorrowedFd};
    use std::os::unix::net::UnixStream;
    use std::rc::Rc;

    use super::{Connection, ConnectionState};
    use crate::cursor::CursorOptions;
    use crate::driver::{Driver, PollStatus};
    use crate::error::{DriverError, Error, FatalError};
    use crate::reactor::{Interest, ReadyCallback, Reactor};

    struct IdleDriver {
        socket: UnixStream,
        polls: Rc<Cell<usize>>,
    }

    impl Driver for IdleDriver {
        type Cursor = ();

        fn poll(&mut self) -> Result<PollStatus, DriverError> {
            self.polls.set(self.polls.get() + 1);
            Ok(PollStatus::Ok)
        }

        fn socket(&self) -> BorrowedFd<'_> {
            self.socket.as_fd()
        }

        fn is_executing(&self) -> bool {
            true
        }

        fn cursor(&mut self, _options: &CursorOptions) -> Result<(), DriverError> {
            Ok(())
        }

        fn take_error(&mut self) -> Option<DriverError> {
            None
        }

        fn close(&mut self) {}
    }

    #[derive(Default)]
    struct RecordingReactor {
        deregistered: RefCell<Vec<Interest>>,
    }

    impl Reactor for RecordingReactor {
        fn register(&self, _: BorrowedFd<'_>, _: Interest, _: ReadyCallback) -> io::Result<()> {
            Ok(())
        }

        fn deregister(&self, _: BorrowedFd<'_>, interest: Interest) {
            self.deregistered.borrow_mut().push(interest);
        }

        fn report_unhandled_error(&self, _: FatalError) {}
    }

    fn connection() -> Connection<IdleDriver> {
        connection_with(Rc::default(), Rc::default())
    }

    fn connection_with(
        polls: Rc<Cell<usize>>,
        reactor: Rc<RecordingReactor>,
    ) -> Connection<IdleDriver> {
        let (socket, _peer) = UnixStream::pair().unwrap();
        Connection::new(IdleDriver { socket, polls }, reactor)
    }

    #[test]
    fn it_allows_one_operation_at_a_time() {
        let conn = connection();

        let _first = conn.begin_operation("first").unwrap();
        let err = conn.begin_operation("second").unwrap_err();

        assert!(matches!(
            err,
            Error::OperationInProgress {
                operation: "second"
            }
        ));
        assert!(conn.inner.borrow().pending.is_set());
    }

    #[test]
    fn it_refuses_operations_after_close() {
        let conn = connection();
        conn.close();

        assert!(matches!(
            conn.begin_operation("cursor"),
            Err(Error::ConnectionClosed)
        ));
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn it_frees_the_slot_once_resolved() {
        let conn = connection();

        let waiter = conn.begin_operation("first").unwrap();
        super::advance(&conn.inner, super::Trigger::Seed);

        assert!(!conn.inner.borrow().pending.is_set());
        assert!(matches!(
            futures_util::FutureExt::now_or_never(waiter),
            Some(Ok(()))
        ));

        conn.begin_operation("second").unwrap();
    }

    #[test]
    fn it_ignores_a_readiness_event_with_no_operation_waiting() {
        let polls = Rc::new(Cell::new(0));
        let reactor = Rc::new(RecordingReactor::default());
        let conn = connection_with(Rc::clone(&polls), Rc::clone(&reactor));

        super::advance(&conn.inner, super::Trigger::Readable);

        assert_eq!(polls.get(), 0);
        assert_eq!(*reactor.deregistered.borrow(), [Interest::Readable]);
        assert_eq!(conn.state(), ConnectionState::Idle);
        assert!(!conn.inner.borrow().pending.is_set());

        conn.begin_operation("after").unwrap();
    }

    #[test]
    fn it_keeps_the_slot_when_the_wait_is_dropped_during_a_borrow() {
        let conn = connection();
        let waiter = conn.begin_operation("first").unwrap();

        {
            let _in_use = conn.inner.borrow_mut();

            drop(super::PendingGuard {
                inner: &conn.inner,
                id: waiter.id(),
            });
        }

        assert!(conn.inner.borrow().pending.is_owned_by(waiter.id()));
        assert!(conn.begin_operation("second").is_err());
    }
}

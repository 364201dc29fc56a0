use crate::connection::{Connection, ConnectionInner};
use crate::driver::Driver;
use crate::error::Error;
use crate::reactor::Interest;

impl<D: Driver> Connection<D> {
    /// Deregister the connection from the reactor and close the driver.
    ///
    /// Does nothing if the connection is already closed. An operation still waiting on
    /// the connection fails with [`Error::ConnectionClosed`].
    pub fn close(&self) {
        self.inner.borrow_mut().close();
    }
}

impl<D: Driver> ConnectionInner<D> {
    pub(crate) fn close(&mut self) {
        self.shutdown(false);
    }

    pub(crate) fn force_close(&mut self) {
        self.shutdown(true);
    }

    fn shutdown(&mut self, fatal: bool) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };

        // both, regardless of which one is armed
        let fd = driver.socket();
        self.reactor.deregister(fd, Interest::Readable);
        self.reactor.deregister(fd, Interest::Writable);
        self.armed = None;

        driver.close();
        self.fatal = fatal;

        tracing::debug!(fd = self.descriptor, fatal, "connection closed");

        if self.pending.resolve(Err(Error::ConnectionClosed)) {
            tracing::debug!(
                fd = self.descriptor,
                "operation interrupted by close of its connection"
            );
        }
    }
}

impl<D: Driver> Drop for ConnectionInner<D> {
    fn drop(&mut self) {
        self.close();
    }
}

use std::rc::Rc;

use crate::connection::Connection;
use crate::driver::{Connect, Driver};
use crate::error::Result;
use crate::options::ConnectOptions;
use crate::reactor::Reactor;

impl<D: Driver> Connection<D> {
    /// Issue a non-blocking connect through `connector` and wait for the handshake to
    /// complete on `reactor`.
    pub async fn open<C>(
        connector: &C,
        options: &ConnectOptions,
        reactor: Rc<dyn Reactor>,
    ) -> Result<Self>
    where
        C: Connect<Driver = D>,
    {
        tracing::debug!(
            host = options.get_host(),
            port = options.get_port(),
            dbname = options.get_database(),
            "opening connection"
        );

        let driver = connector.connect(options)?;
        let conn = Connection::new(driver, reactor);

        let waiter = conn.begin_operation("open")?;
        conn.await_completion(waiter).await?;

        tracing::debug!(fd = conn.descriptor(), "connection established");

        Ok(conn)
    }
}

/// Open a [`Connection`]; see [`Connection::open`].
pub async fn open<C: Connect>(
    connector: &C,
    options: &ConnectOptions,
    reactor: Rc<dyn Reactor>,
) -> Result<Connection<C::Driver>> {
    Connection::open(connector, options, reactor).await
}

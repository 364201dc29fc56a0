#![doc = include_str!("lib.md")]
#![cfg(unix)]

// Modules
pub use pgpoll_core::{connection, cursor, driver, error, options, reactor, rt};

// Types
pub use pgpoll_core::connection::{Connection, ConnectionState};
pub use pgpoll_core::cursor::{Cursor, CursorOptions};
pub use pgpoll_core::driver::{Connect, Driver, PollStatus};
pub use pgpoll_core::error::{DriverError, DriverErrorKind, Error, FatalError, Result};
pub use pgpoll_core::options::{ConnectOptions, ConnectParam, SslMode};
pub use pgpoll_core::reactor::{Interest, ReadyCallback, Reactor};

// Functions
pub use pgpoll_core::connection::open;

#[cfg(feature = "_rt-tokio")]
pub use pgpoll_core::rt::rt_tokio::TokioReactor;

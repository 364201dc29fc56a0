use std::cell::RefCell;
use std::fmt::{self, Debug, Formatter};
use std::rc::Rc;

use crate::connection::ConnectionInner;
use crate::driver::Driver;

/// Options for [`Connection::cursor`](crate::connection::Connection::cursor).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorOptions {
    pub(crate) name: Option<String>,
    pub(crate) scrollable: Option<bool>,
    pub(crate) withhold: bool,
}

impl CursorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a named (server-side) cursor.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Whether a named cursor may scroll backwards. Left to the server's default if unset.
    pub fn scrollable(mut self, scrollable: bool) -> Self {
        self.scrollable = Some(scrollable);
        self
    }

    /// Keep a named cursor usable after the transaction that created it commits.
    pub fn withhold(mut self, withhold: bool) -> Self {
        self.withhold = withhold;
        self
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn get_scrollable(&self) -> Option<bool> {
        self.scrollable
    }

    pub fn get_withhold(&self) -> bool {
        self.withhold
    }
}

/// A driver cursor created through the handshake in
/// [`Connection::cursor`](crate::connection::Connection::cursor).
///
/// Keeps the connection's state alive; executing and fetching are up to the driver cursor.
pub struct Cursor<D: Driver> {
    pub(crate) conn: Rc<RefCell<ConnectionInner<D>>>,
    pub(crate) options: CursorOptions,
    pub(crate) raw: D::Cursor,
}

impl<D: Driver> Cursor<D> {
    pub fn options(&self) -> &CursorOptions {
        &self.options
    }

    pub fn name(&self) -> Option<&str> {
        self.options.get_name()
    }

    /// `true` once the connection this cursor was created on has been closed.
    pub fn is_closed(&self) -> bool {
        self.conn.borrow().is_closed()
    }

    pub fn as_raw(&self) -> &D::Cursor {
        &self.raw
    }

    pub fn as_raw_mut(&mut self) -> &mut D::Cursor {
        &mut self.raw
    }

    pub fn into_raw(self) -> D::Cursor {
        self.raw
    }
}

impl<D: Driver> Debug for Cursor<D>
where
    D::Cursor: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("options", &self.options)
            .field("raw", &self.raw)
            .finish()
    }
}

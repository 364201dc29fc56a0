use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::io;
use std::os::fd::{AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;

use tokio::io::unix::AsyncFd;
use tokio::task::JoinHandle;

use crate::error::FatalError;
use crate::reactor::{Interest, ReadyCallback, Reactor};

type ErrorSink = Box<dyn Fn(FatalError) + 'static>;

/// A [`Reactor`] backed by Tokio's I/O driver.
///
/// Each registration waits in its own local task on a duplicate of the descriptor, so
/// a registration being torn down never collides with the next one on the same socket.
/// Must be used from within a [`tokio::task::LocalSet`].
pub struct TokioReactor {
    shared: Rc<Shared>,
    sink: ErrorSink,
}

#[derive(Default)]
struct Shared {
    registrations: RefCell<HashMap<(RawFd, Interest), Registration>>,
    next_id: Cell<u64>,
}

struct Registration {
    id: u64,
    task: JoinHandle<()>,
}

impl TokioReactor {
    /// A reactor whose error sink logs unhandled errors at `ERROR`.
    pub fn new() -> Self {
        Self::with_error_sink(|error| {
            tracing::error!(
                fd = error.descriptor,
                error = %error.error,
                "{}",
                error.message
            );
        })
    }

    /// A reactor that hands unhandled connection errors to `sink`.
    pub fn with_error_sink(sink: impl Fn(FatalError) + 'static) -> Self {
        TokioReactor {
            shared: Rc::default(),
            sink: Box::new(sink),
        }
    }

    /// The number of armed registrations.
    pub fn registered(&self) -> usize {
        self.shared.registrations.borrow().len()
    }
}

impl Default for TokioReactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn remove(&self, key: (RawFd, Interest), id: u64) {
        let mut registrations = self.registrations.borrow_mut();

        if registrations.get(&key).is_some_and(|r| r.id == id) {
            registrations.remove(&key);
        }
    }
}

impl Reactor for TokioReactor {
    fn register(
        &self,
        fd: BorrowedFd<'_>,
        interest: Interest,
        callback: ReadyCallback,
    ) -> io::Result<()> {
        let key = (fd.as_raw_fd(), interest);

        if self.shared.registrations.borrow().contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("descriptor {} is already registered as {interest}", key.0),
            ));
        }

        let async_fd = AsyncFd::with_interest(
            fd.try_clone_to_owned()?,
            match interest {
                Interest::Readable => tokio::io::Interest::READABLE,
                Interest::Writable => tokio::io::Interest::WRITABLE,
            },
        )?;

        let id = self.shared.next_id.get();
        self.shared.next_id.set(id + 1);

        let shared = Rc::downgrade(&self.shared);

        let task = tokio::task::spawn_local(async move {
            let ready = match interest {
                Interest::Readable => async_fd.readable().await.map(drop),
                Interest::Writable => async_fd.writable().await.map(drop),
            };

            // the callback polls the driver, which will surface the error if there is one
            if let Err(error) = ready {
                tracing::warn!(fd = key.0, %interest, %error, "error waiting for readiness");
            }

            drop(async_fd);

            if let Some(shared) = shared.upgrade() {
                shared.remove(key, id);
            }

            tracing::trace!(fd = key.0, %interest, "ready");

            callback();
        });

        self.shared
            .registrations
            .borrow_mut()
            .insert(key, Registration { id, task });

        Ok(())
    }

    fn deregister(&self, fd: BorrowedFd<'_>, interest: Interest) {
        let key = (fd.as_raw_fd(), interest);

        if let Some(registration) = self.shared.registrations.borrow_mut().remove(&key) {
            registration.task.abort();
        }
    }

    fn report_unhandled_error(&self, error: FatalError) {
        (self.sink)(error);
    }
}

impl Drop for TokioReactor {
    fn drop(&mut self) {
        for (_, registration) in self.shared.registrations.borrow_mut().drain() {
            registration.task.abort();
        }
    }
}

impl Debug for TokioReactor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioReactor")
            .field("registered", &self.registered())
            .finish()
    }
}

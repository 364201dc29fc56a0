use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_channel::oneshot;
use futures_util::FutureExt;

use crate::error::Error;

/// The resolving half of an operation's completion signal.
///
/// Move-only: resolving consumes it, so a signal can resume its waiter at most once.
/// Dropping it unresolved wakes the waiter with [`Error::ConnectionClosed`].
#[derive(Debug)]
pub(crate) struct Completion {
    id: u64,
    tx: oneshot::Sender<Result<(), Error>>,
}

/// The waiting half of an operation's completion signal.
#[derive(Debug)]
pub(crate) struct Waiter {
    id: u64,
    rx: oneshot::Receiver<Result<(), Error>>,
}

impl Completion {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn resolve(self, result: Result<(), Error>) {
        // the waiter may have been dropped, in which case nobody is left to resume
        let _ = self.tx.send(result);
    }
}

impl Waiter {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Future for Waiter {
    type Output = Result<(), Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(self.rx.poll_unpin(cx)) {
            Ok(result) => Poll::Ready(result),
            Err(oneshot::Canceled) => Poll::Ready(Err(Error::ConnectionClosed)),
        }
    }
}

/// Holds at most one outstanding [`Completion`].
///
/// Every signal is tagged with a fresh operation id so that cleanup on behalf of an
/// old operation can never clear a newer one.
#[derive(Debug, Default)]
pub(crate) struct PendingSlot {
    current: Option<Completion>,
    next_id: u64,
}

impl PendingSlot {
    /// Install a new signal, failing if one is already outstanding.
    pub(crate) fn begin(&mut self, operation: &'static str) -> Result<Waiter, Error> {
        if self.current.is_some() {
            return Err(Error::OperationInProgress { operation });
        }

        let id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.current = Some(Completion { id, tx });

        Ok(Waiter { id, rx })
    }

    pub(crate) fn is_set(&self) -> bool {
        self.current.is_some()
    }

    pub(crate) fn is_owned_by(&self, id: u64) -> bool {
        self.current.as_ref().is_some_and(|c| c.id() == id)
    }

    /// Resolve and clear the outstanding signal. Returns `false` if there was none.
    pub(crate) fn resolve(&mut self, result: Result<(), Error>) -> bool {
        match self.current.take() {
            Some(completion) => {
                completion.resolve(result);
                true
            }
            None => false,
        }
    }

    /// Clear the slot without resolving it, but only if it still belongs to `id`.
    pub(crate) fn abandon(&mut self, id: u64) -> bool {
        if self.is_owned_by(id) {
            self.current = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::FutureExt;

    use super::PendingSlot;
    use crate::error::Error;

    #[test]
    fn it_refuses_a_second_signal() {
        let mut slot = PendingSlot::default();

        let _waiter = slot.begin("first").unwrap();
        let err = slot.begin("second").unwrap_err();

        assert!(matches!(
            err,
            Error::OperationInProgress {
                operation: "second"
            }
        ));
        assert!(slot.is_set());
    }

    #[test]
    fn it_resumes_the_waiter_once() {
        let mut slot = PendingSlot::default();
        let waiter = slot.begin("op").unwrap();

        assert!(slot.resolve(Ok(())));
        assert!(!slot.resolve(Ok(())));
        assert!(!slot.is_set());

        assert!(matches!(waiter.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn it_reports_dropped_signals_as_closed() {
        let mut slot = PendingSlot::default();
        let waiter = slot.begin("op").unwrap();

        assert!(slot.abandon(waiter.id()));

        assert!(matches!(
            waiter.now_or_never(),
            Some(Err(Error::ConnectionClosed))
        ));
    }

    #[test]
    fn it_does_not_abandon_a_newer_operation() {
        let mut slot = PendingSlot::default();

        let old = slot.begin("old").unwrap();
        slot.resolve(Ok(()));

        let new = slot.begin("new").unwrap();

        assert!(!slot.abandon(old.id()));
        assert!(slot.is_owned_by(new.id()));
    }
}

use std::cell::RefCell;
use std::io;
use std::rc::{Rc, Weak};

use crate::connection::ConnectionInner;
use crate::driver::{Driver, PollStatus};
use crate::error::{DriverError, DriverErrorKind, Error, FatalError};
use crate::reactor::{Interest, ReadyCallback};

/// What caused a call to [`advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    /// A request was just issued; nothing is registered yet.
    Seed,
    Readable,
    Writable,
}

impl Trigger {
    fn interest(self) -> Option<Interest> {
        match self {
            Trigger::Seed => None,
            Trigger::Readable => Some(Interest::Readable),
            Trigger::Writable => Some(Interest::Writable),
        }
    }
}

impl From<Interest> for Trigger {
    fn from(interest: Interest) -> Self {
        match interest {
            Interest::Readable => Trigger::Readable,
            Interest::Writable => Trigger::Writable,
        }
    }
}

enum Step {
    Done(Result<(), Error>),
    Wait(Interest),
    Fatal(Error),
}

/// Run one poll step for the operation waiting on `inner`.
///
/// Called once when a request is issued and then by the reactor on every readiness
/// event the previous step registered for.
pub(crate) fn advance<D: Driver>(inner: &Rc<RefCell<ConnectionInner<D>>>, trigger: Trigger) {
    let fatal = inner
        .borrow_mut()
        .step(&Rc::downgrade(inner), trigger);

    // the error sink runs with the connection released
    if let Some(fatal) = fatal {
        let reactor = Rc::clone(&inner.borrow().reactor);
        reactor.report_unhandled_error(fatal);
    }
}

impl<D: Driver> ConnectionInner<D> {
    fn step(&mut self, this: &Weak<RefCell<Self>>, trigger: Trigger) -> Option<FatalError> {
        tracing::trace!(fd = self.descriptor, ?trigger, "advance");

        if let Some(interest) = trigger.interest() {
            self.disarm(interest);
        }

        if !self.pending.is_set() {
            tracing::warn!(
                fd = self.descriptor,
                ?trigger,
                "readiness event with no operation waiting; ignoring"
            );
            return None;
        }

        let driver = self.driver.as_mut()?;

        let step = match driver.poll() {
            Ok(PollStatus::Ok) => Step::Done(Ok(())),
            Ok(PollStatus::Read) => Step::Wait(Interest::Readable),
            Ok(PollStatus::Write) => Step::Wait(Interest::Writable),
            Ok(PollStatus::Error) => Step::Done(Err(driver
                .take_error()
                .unwrap_or_else(unreported_error)
                .into())),
            Ok(PollStatus::Unknown(code)) => Step::Fatal(Error::UnknownReadinessState(code)),
            Err(e) if e.is_internal() => Step::Fatal(e.into()),
            Err(e) => Step::Done(Err(e.into())),
        };

        let fatal = match step {
            Step::Done(result) => {
                tracing::trace!(
                    fd = self.descriptor,
                    ok = result.is_ok(),
                    "advance: operation finished"
                );
                self.pending.resolve(result);
                None
            }

            Step::Wait(interest) => match self.arm(this, interest) {
                Ok(()) => None,
                Err(e) => Some(self.fatal_error(e.into())),
            },

            Step::Fatal(error) => Some(self.fatal_error(error)),
        };

        tracing::trace!(fd = self.descriptor, state = ?self.state(), "advance: done");

        fatal
    }

    fn arm(&mut self, this: &Weak<RefCell<Self>>, interest: Interest) -> io::Result<()> {
        debug_assert_eq!(self.armed, None, "interest registered twice");

        let Some(driver) = self.driver.as_ref() else {
            return Ok(());
        };

        let this = Weak::clone(this);
        let callback: ReadyCallback = Box::new(move || {
            // the connection may have been dropped since
            if let Some(inner) = this.upgrade() {
                advance(&inner, interest.into());
            }
        });

        self.reactor.register(driver.socket(), interest, callback)?;
        self.armed = Some(interest);

        tracing::debug!(fd = self.descriptor, %interest, "registered interest");

        Ok(())
    }

    pub(crate) fn disarm(&mut self, interest: Interest) {
        let Some(driver) = self.driver.as_ref() else {
            return;
        };

        self.reactor.deregister(driver.socket(), interest);

        if self.armed == Some(interest) {
            self.armed = None;
            tracing::debug!(fd = self.descriptor, %interest, "deregistered interest");
        }
    }

    fn fatal_error(&mut self, error: Error) -> FatalError {
        tracing::error!(fd = self.descriptor, %error, "fatal error on connection; closing");

        self.force_close();

        FatalError {
            message: "fatal error on pgpoll connection",
            error,
            descriptor: self.descriptor,
        }
    }
}

fn unreported_error() -> DriverError {
    DriverError::new(
        DriverErrorKind::Operational,
        "driver poll reported an error without details",
    )
}

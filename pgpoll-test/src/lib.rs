use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

use pgpoll::error::{DriverError, DriverErrorKind, FatalError};
use pgpoll::reactor::{Interest, ReadyCallback, Reactor};
use pgpoll::{Connect, ConnectOptions, CursorOptions, Driver, PollStatus};

pub fn setup_if_needed() {
    let _ = dotenvy::dotenv();
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn driver_error(message: &'static str) -> DriverError {
    DriverError::new(DriverErrorKind::Database, message)
}

/// One scripted answer of [`ScriptedDriver::poll`].
#[derive(Debug)]
pub enum Step {
    /// Return this status.
    Status(PollStatus),
    /// Raise this error from `poll()`.
    Raise(DriverError),
    /// Return [`PollStatus::Error`] and retain this error for `take_error()`.
    Fail(DriverError),
}

/// The readiness sequence a [`ScriptedDriver`] plays back, shared with the test so
/// steps can be queued while a connection is live.
#[derive(Clone, Default)]
pub struct Script {
    state: Rc<RefCell<ScriptState>>,
}

#[derive(Default)]
struct ScriptState {
    steps: VecDeque<Step>,
    polls: usize,
    closed: bool,
    connect_error: Option<DriverError>,
    cursor_error: Option<DriverError>,
    cursors: Vec<CursorOptions>,
    conninfo: Option<String>,
    peer: Option<UnixStream>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(&self, status: PollStatus) -> &Self {
        self.push(Step::Status(status))
    }

    pub fn then_raise(&self, error: DriverError) -> &Self {
        self.push(Step::Raise(error))
    }

    pub fn then_fail(&self, error: DriverError) -> &Self {
        self.push(Step::Fail(error))
    }

    pub fn push(&self, step: Step) -> &Self {
        self.state.borrow_mut().steps.push_back(step);
        self
    }

    pub fn fail_connect(&self, error: DriverError) {
        self.state.borrow_mut().connect_error = Some(error);
    }

    pub fn fail_next_cursor(&self, error: DriverError) {
        self.state.borrow_mut().cursor_error = Some(error);
    }

    /// How many times the driver has been polled.
    pub fn polls(&self) -> usize {
        self.state.borrow().polls
    }

    /// Steps not yet played back.
    pub fn remaining(&self) -> usize {
        self.state.borrow().steps.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }

    /// Options of every cursor the driver was asked to create.
    pub fn cursors(&self) -> Vec<CursorOptions> {
        self.state.borrow().cursors.clone()
    }

    /// The conninfo string the driver was opened with.
    pub fn conninfo(&self) -> Option<String> {
        self.state.borrow().conninfo.clone()
    }

    /// The far end of the driver's socket, standing in for the server.
    pub fn take_peer(&self) -> Option<UnixStream> {
        self.state.borrow_mut().peer.take()
    }
}

/// Opens [`ScriptedDriver`]s that share one [`Script`].
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    pub script: Script,
}

impl ScriptedConnector {
    pub fn new(script: &Script) -> Self {
        ScriptedConnector {
            script: script.clone(),
        }
    }
}

impl Connect for ScriptedConnector {
    type Driver = ScriptedDriver;

    fn connect(&self, options: &ConnectOptions) -> Result<ScriptedDriver, DriverError> {
        let mut state = self.script.state.borrow_mut();

        if let Some(error) = state.connect_error.take() {
            return Err(error);
        }

        let (socket, peer) = UnixStream::pair()
            .and_then(|(socket, peer)| socket.set_nonblocking(true).map(|_| (socket, peer)))
            .map_err(|e| {
                DriverError::new(DriverErrorKind::Operational, "could not open socket pair")
                    .with_source(e)
            })?;

        state.conninfo = Some(options.to_conninfo());
        state.peer = Some(peer);

        Ok(ScriptedDriver {
            socket,
            script: self.script.clone(),
            executing: true,
            last_error: None,
        })
    }
}

/// A driver that answers `poll()` from a [`Script`] over a real socket.
pub struct ScriptedDriver {
    socket: UnixStream,
    script: Script,
    executing: bool,
    last_error: Option<DriverError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCursor {
    pub options: CursorOptions,
}

impl ScriptedDriver {
    // consume whatever the peer sent so edge-triggered readiness fires again
    fn drain(&mut self) {
        let mut buf = [0u8; 256];

        while matches!(self.socket.read(&mut buf), Ok(n) if n > 0) {}
    }
}

impl Driver for ScriptedDriver {
    type Cursor = ScriptedCursor;

    fn poll(&mut self) -> Result<PollStatus, DriverError> {
        self.drain();

        let step = {
            let mut state = self.script.state.borrow_mut();
            state.polls += 1;
            state.steps.pop_front()
        };

        match step {
            None | Some(Step::Status(PollStatus::Ok)) => {
                self.executing = false;
                Ok(PollStatus::Ok)
            }
            Some(Step::Status(PollStatus::Error)) => {
                self.executing = false;
                Ok(PollStatus::Error)
            }
            Some(Step::Status(status)) => Ok(status),
            Some(Step::Raise(error)) => {
                self.executing = false;
                Err(error)
            }
            Some(Step::Fail(error)) => {
                self.executing = false;
                self.last_error = Some(error);
                Ok(PollStatus::Error)
            }
        }
    }

    fn socket(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }

    fn is_executing(&self) -> bool {
        self.executing
    }

    fn cursor(&mut self, options: &CursorOptions) -> Result<ScriptedCursor, DriverError> {
        let mut state = self.script.state.borrow_mut();

        if let Some(error) = state.cursor_error.take() {
            return Err(error);
        }

        state.cursors.push(options.clone());
        self.executing = true;

        Ok(ScriptedCursor {
            options: options.clone(),
        })
    }

    fn take_error(&mut self) -> Option<DriverError> {
        self.last_error.take()
    }

    fn close(&mut self) {
        self.executing = false;
        self.script.state.borrow_mut().closed = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactorEvent {
    Registered(Interest),
    /// `armed` is `false` when the interest was not registered at the time.
    Deregistered { interest: Interest, armed: bool },
}

/// A [`Reactor`] that only fires when the test tells it to.
#[derive(Default)]
pub struct ManualReactor {
    state: RefCell<ManualState>,
    fail_registrations: Cell<bool>,
}

#[derive(Default)]
struct ManualState {
    // a fired registration keeps its slot, with no callback, until deregistered
    armed: HashMap<(RawFd, Interest), Option<ReadyCallback>>,
    events: Vec<ReactorEvent>,
    reports: Vec<FatalError>,
}

impl ManualReactor {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Make every following `register()` fail.
    pub fn fail_registrations(&self) {
        self.fail_registrations.set(true);
    }

    pub fn is_armed(&self, interest: Interest) -> bool {
        self.state
            .borrow()
            .armed
            .keys()
            .any(|(_, armed)| *armed == interest)
    }

    pub fn armed(&self) -> usize {
        self.state.borrow().armed.len()
    }

    /// Deliver a readiness event for `interest` to whichever registration is waiting
    /// for it. Returns `false` if none is.
    pub fn fire(&self, interest: Interest) -> bool {
        let callback = self
            .state
            .borrow_mut()
            .armed
            .iter_mut()
            .find(|((_, armed), callback)| *armed == interest && callback.is_some())
            .and_then(|(_, callback)| callback.take());

        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    pub fn fire_readable(&self) -> bool {
        self.fire(Interest::Readable)
    }

    pub fn fire_writable(&self) -> bool {
        self.fire(Interest::Writable)
    }

    pub fn events(&self) -> Vec<ReactorEvent> {
        self.state.borrow().events.clone()
    }

    pub fn take_reports(&self) -> Vec<FatalError> {
        std::mem::take(&mut self.state.borrow_mut().reports)
    }
}

impl Reactor for ManualReactor {
    fn register(
        &self,
        fd: BorrowedFd<'_>,
        interest: Interest,
        callback: ReadyCallback,
    ) -> io::Result<()> {
        if self.fail_registrations.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "registration refused"));
        }

        let mut state = self.state.borrow_mut();
        let key = (fd.as_raw_fd(), interest);

        if state.armed.contains_key(&key) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{interest} registered twice"),
            ));
        }

        state.armed.insert(key, Some(callback));
        state.events.push(ReactorEvent::Registered(interest));

        Ok(())
    }

    fn deregister(&self, fd: BorrowedFd<'_>, interest: Interest) {
        let mut state = self.state.borrow_mut();
        let armed = state.armed.remove(&(fd.as_raw_fd(), interest)).is_some();

        state
            .events
            .push(ReactorEvent::Deregistered { interest, armed });
    }

    fn report_unhandled_error(&self, error: FatalError) {
        self.state.borrow_mut().reports.push(error);
    }
}

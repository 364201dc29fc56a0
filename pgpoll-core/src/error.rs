//! Types for working with errors produced by pgpoll.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;
use std::os::fd::RawFd;

/// A specialized `Result` type for pgpoll.
pub type Result<T, E = Error> = ::std::result::Result<T, E>;

/// Boxed error source carried by [`Error::Configuration`] and [`DriverError`].
pub type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Represents all the ways a method can fail within pgpoll.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error occurred while parsing a connection string, or a connection parameter
    /// was not one of the recognized keywords.
    #[error("error with configuration: {0}")]
    Configuration(#[source] BoxDynError),

    /// The connection was closed before, or while, the operation ran.
    #[error("attempted to communicate with a closed connection")]
    ConnectionClosed,

    /// Another operation is already waiting on this connection.
    ///
    /// Only one request may be in flight on a connection at a time. This is a
    /// programming error; the existing operation is left untouched.
    #[error("{operation}() called while another operation is already waiting on the connection")]
    OperationInProgress { operation: &'static str },

    /// Error reported by the underlying driver.
    ///
    /// The connection remains open and may be used for another operation.
    #[error("error returned from driver: {0}")]
    Driver(#[source] DriverError),

    /// The driver's poll step returned a status outside of the known readiness states.
    #[error("driver poll returned an unknown readiness state: {0}")]
    UnknownReadinessState(i32),

    /// Error registering interest with the reactor.
    #[error("error communicating with the reactor: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    #[doc(hidden)]
    #[inline]
    pub fn config(err: impl StdError + Send + Sync + 'static) -> Self {
        Error::Configuration(err.into())
    }

    /// Returns the driver error, if this is one.
    pub fn as_driver_error(&self) -> Option<&DriverError> {
        match self {
            Error::Driver(err) => Some(err),
            _ => None,
        }
    }

    /// Consumes `self` and returns the driver error, if this is one.
    pub fn into_driver_error(self) -> Option<DriverError> {
        match self {
            Error::Driver(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DriverError> for Error {
    #[inline]
    fn from(error: DriverError) -> Self {
        Error::Driver(error)
    }
}

/// The class of a [`DriverError`], following the DB-API exception hierarchy most
/// non-blocking drivers report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DriverErrorKind {
    Warning,
    Interface,
    Database,
    Data,
    Operational,
    Integrity,
    /// The driver lost track of its own state. Escalated as fatal when seen during polling.
    Internal,
    Programming,
    NotSupported,
}

impl DriverErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverErrorKind::Warning => "warning",
            DriverErrorKind::Interface => "interface error",
            DriverErrorKind::Database => "database error",
            DriverErrorKind::Data => "data error",
            DriverErrorKind::Operational => "operational error",
            DriverErrorKind::Integrity => "integrity error",
            DriverErrorKind::Internal => "internal error",
            DriverErrorKind::Programming => "programming error",
            DriverErrorKind::NotSupported => "not supported",
        }
    }
}

impl Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the wrapped driver, either raised from a call or returned as
/// the outcome of a poll step.
#[derive(Debug)]
pub struct DriverError {
    kind: DriverErrorKind,
    message: Cow<'static, str>,
    code: Option<String>,
    source: Option<BoxDynError>,
}

impl DriverError {
    pub fn new(kind: DriverErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        DriverError {
            kind,
            message: message.into(),
            code: None,
            source: None,
        }
    }

    /// Attach the (SQLSTATE) code for the error.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxDynError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    /// The primary, human-readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The (SQLSTATE) code for the error, if the driver supplied one.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub(crate) fn is_internal(&self) -> bool {
        self.kind == DriverErrorKind::Internal
    }
}

impl Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn StdError + 'static))
    }
}

/// An unrecoverable error on a connection.
///
/// Never returned to a caller: it is handed to [`Reactor::report_unhandled_error`]
/// and the connection is closed.
///
/// [`Reactor::report_unhandled_error`]: crate::reactor::Reactor::report_unhandled_error
#[derive(Debug, thiserror::Error)]
#[error("{message} (fd {descriptor}): {error}")]
pub struct FatalError {
    pub message: &'static str,
    #[source]
    pub error: Error,
    pub descriptor: RawFd,
}

// Format an error message as a `Configuration` error
macro_rules! err_config {
    ($($arg:tt)*) => {
        $crate::error::Error::Configuration(format!($($arg)*).into())
    };
}

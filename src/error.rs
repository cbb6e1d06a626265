//! Error types shared by the whole daemon.
//!
//! Device level failures are reported as [`HardwareError`], which the sysfs backend derives from
//! the errno of the failed access. Everything that aborts the process is an [`Error`] carrying an
//! [`ErrorKind`].

use failure::{Backtrace, Context, Fail};
use nix::errno::Errno;

use std::fmt::{self, Display};
use std::io;

/// Classified failure of a PWM channel or sensor access
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum HardwareError {
    #[fail(display = "permission denied")]
    PermissionDenied,
    #[fail(display = "device or resource busy")]
    ResourceBusy,
    #[fail(display = "invalid value")]
    InvalidValue,
    #[fail(display = "{}", _0)]
    Unknown(String),
}

impl From<io::Error> for HardwareError {
    fn from(error: io::Error) -> Self {
        match error.raw_os_error().map(Errno::from_i32) {
            Some(Errno::EACCES) | Some(Errno::EPERM) => HardwareError::PermissionDenied,
            Some(Errno::EBUSY) => HardwareError::ResourceBusy,
            Some(Errno::EINVAL) | Some(Errno::ERANGE) => HardwareError::InvalidValue,
            _ => match error.kind() {
                io::ErrorKind::PermissionDenied => HardwareError::PermissionDenied,
                io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                    HardwareError::InvalidValue
                }
                _ => HardwareError::Unknown(error.to_string()),
            },
        }
    }
}

#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ErrorKind {
    /// PWM channel access failed where it must not
    #[fail(display = "hardware: {}", _0)]
    Hardware(HardwareError),

    /// Invalid or contradictory options
    #[fail(display = "configuration: {}", _0)]
    Config(String),

    /// One-time fan initialization could not be completed
    #[fail(display = "startup: {}", _0)]
    Startup(String),

    /// Termination signals could not be hooked
    #[fail(display = "signal: {}", _0)]
    Signal(String),

    /// Standard input/output error
    #[fail(display = "io: {}", _0)]
    Io(String),
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let cause = self.inner.cause().map(|cause| cause.to_string());
        match cause {
            Some(cause) => write!(f, "{} ({})", self.inner, cause),
            None => Display::fmt(&self.inner, f),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.inner.get_context().clone()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}

impl From<HardwareError> for Error {
    fn from(error: HardwareError) -> Self {
        ErrorKind::Hardware(error).into()
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        ErrorKind::Io(error.to_string()).into()
    }
}

/// A specialized `Result` type bound to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

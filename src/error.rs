//! Error types for the NU801 driver
//!
//! Every fatal condition the driver can hit maps onto one of four kinds:
//! configuration, LED registration, GPIO acquisition, or runtime I/O.

use std::io;
use thiserror::Error;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad arguments, unknown device id, invalid catalog entry
    Config,
    /// uleds device creation failed
    Registration,
    /// GPIO lines could not be claimed
    Acquisition,
    /// Commit, read or poll failure in the serve loop
    RuntimeIo,
}

impl ErrorKind {
    /// Process exit status for a failure of this kind (sysexits.h)
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::Config => 78,
            ErrorKind::Registration | ErrorKind::Acquisition => 69,
            ErrorKind::RuntimeIo => 74,
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported device '{0}'")]
    UnknownDevice(String),

    #[error("invalid hardware profile '{id}': {reason}")]
    InvalidProfile { id: String, reason: String },

    #[error("failed to register LED '{name}'")]
    Registration {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to request lines from {chip}")]
    Acquisition {
        chip: String,
        #[source]
        source: io::Error,
    },

    #[error("GPIO lines already released")]
    Released,

    #[error("failed to commit GPIO line values")]
    Commit(#[source] io::Error),

    #[error("failed to read brightness of LED '{name}'")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("LED '{0}' was closed by the kernel")]
    Closed(String),

    #[error("failed to wait for LED events")]
    Poll(#[source] io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownDevice(_) | Error::InvalidProfile { .. } => ErrorKind::Config,
            Error::Registration { .. } => ErrorKind::Registration,
            Error::Acquisition { .. } => ErrorKind::Acquisition,
            Error::Released
            | Error::Commit(_)
            | Error::Read { .. }
            | Error::Closed(_)
            | Error::Poll(_) => ErrorKind::RuntimeIo,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

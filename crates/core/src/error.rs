//! Tagged result type for every fallible engine operation (spec §7).

use thiserror::Error;

/// The kind of failure behind an [`Error`], mirroring the wire-level error
/// channel that CLI/server collaborators map onto exit codes or protocol
/// error objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Invalid,
    Io,
    ParseFailure,
    Conflict,
    Cancelled,
    Timeout,
    Unsupported,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("parse failure: {0}")]
    ParseFailure(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("cancelled: {0}")]
    Cancelled(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Invalid(_) => ErrorKind::Invalid,
            Error::Io(_) => ErrorKind::Io,
            Error::ParseFailure(_) => ErrorKind::ParseFailure,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Unsupported(_) => ErrorKind::Unsupported,
        }
    }

    /// Exit code a CLI collaborator should surface for this error (spec §6).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound(_) => 3,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Invalid(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

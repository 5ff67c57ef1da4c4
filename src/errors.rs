use std::error::Error;
use std::fmt::{Display, Formatter};

/// Error kind that represents failures reported by the [`crate::Client`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum ErrorKind {
    /// No error occurred.
    NoError,
    /// The configured storage key is empty.
    InvalidStorageKey = 1100,
    /// The injected fetch function failed; the published snapshot was left untouched.
    FetchFailure = 1200,
    /// The flag value's type didn't match the requested primitive type.
    ValueTypeMismatch = 2000,
    /// A cached record could not be parsed; it is treated as a cache miss.
    InvalidCacheRecord = 2200,
    /// A debug panel override input could not be parsed; it is discarded.
    InvalidOverrideValue = 2300,
    /// A refetch was requested but no fetch function is configured for the client.
    FetchNotConfigured = 3300,
    /// The client initialization did not settle within the given wait time.
    InitTimedOut = 3400,
}

impl ErrorKind {
    pub(crate) fn as_u16(&self) -> u16 {
        *self as u16
    }
}

/// Error struct that holds the [`ErrorKind`] and message of the reported failure.
#[derive(Debug, PartialEq)]
pub struct ClientError {
    /// Error kind that represents failures reported by the [`crate::Client`].
    pub kind: ErrorKind,
    /// The text representation of the failure.
    pub message: String,
}

impl ClientError {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self { message, kind }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message.as_str())
    }
}

impl Error for ClientError {}

//! Index Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// An index parsing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Malformed records are never errors: they are dropped while parsing. The
/// only way a parse fails is when the underlying stream can't be read (which
/// includes a compressed stream that fails to decode).
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading (or decompressing) the index stream failed.
    #[display("I/O error reading index: {_0}")]
    Io(IoError),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::Interrupted)
    }
}

//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// Every variant is fatal: the run must not start with an invalid
/// configuration.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The layered sources could not be merged or deserialized.
    #[display("could not load configuration")]
    Load,
    #[display("configuration file not found: {}", _0.display())]
    FileNotFound(#[error(not(source))] PathBuf),
    #[display("not an existing directory: {}", _0.display())]
    PoolNotDirectory(#[error(not(source))] PathBuf),
    #[display("invalid mirror URL: {_0}")]
    InvalidMirror(#[error(not(source))] String),
    #[display("mirror should not end with /pool ({_0})")]
    MirrorEndsWithPool(#[error(not(source))] String),
    #[display("jobs must be between {} and {}, got {_0}", crate::Jobs::MIN, crate::Jobs::MAX)]
    JobsOutOfRange(#[error(not(source))] u32),
    #[display("unknown index format: {_0}")]
    IndexFormat(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

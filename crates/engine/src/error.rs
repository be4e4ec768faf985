//! Engine Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The cache database failed; the run cannot continue.
    #[display("cache error")]
    Cache,
    /// An index file became unreadable part-way through parsing.
    #[display("could not read index: {}", _0.display())]
    Index(#[error(not(source))] PathBuf),
    #[display("invalid dist root pattern: {_0}")]
    Pattern(#[error(not(source))] String),
    #[display("filesystem error: {}", _0.display())]
    Filesystem(#[error(not(source))] PathBuf),
    #[display("pool marker error: {}", _0.display())]
    Marker(#[error(not(source))] PathBuf),
    #[display("could not write output file: {}", _0.display())]
    Output(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

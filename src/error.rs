//! Application Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The configuration could not be loaded or is invalid; fix it and rerun.
    #[display("invalid configuration")]
    Config,
    #[display("could not prepare working directory: {}", _0.display())]
    WorkDir(#[error(not(source))] PathBuf),
    #[display("could not open cache database")]
    Cache,
    #[display("reconciliation failed")]
    Run,
}

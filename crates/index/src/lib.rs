//! Parsers for repository index files.
//!
//! Two line-oriented grammars are supported, both yielding the same
//! [`Entry`] triple of (relative path, size, hash):
//!
//! - **Binary lists** (`Packages`): one record per package, the pool file is
//!   named by the `Filename:` field.
//! - **Source lists** (`Sources`): one record per source package, the pool
//!   files are listed in the `Checksums-Sha256:` block relative to the
//!   record's `Directory:`.
//!
//! Parsing is lazy ([`IndexKind::entries`]) and never fails on malformed
//! content; broken records are dropped and logged at `debug` level. The
//! parsers know nothing about compression, callers hand them an already
//! decompressed [`BufRead`](std::io::BufRead).

mod arch;
pub mod error;
mod grammar;
mod kind;

pub use crate::arch::{ArchitectureFilter, EXCLUDED_ARCHITECTURES, is_excluded_architecture};
pub use crate::grammar::Entries;
pub use crate::kind::{IndexKind, parse};

/// A single file referenced by an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Path relative to the repository root (e.g. `pool/main/h/hello/hello_2.10-3_amd64.deb`).
    pub path: String,
    /// Expected size in bytes.
    pub size: u64,
    /// Digest as written in the index (MD5 for binary lists, SHA-256 for
    /// source lists).
    pub hash: Option<String>,
}
impl Entry {
    pub fn new(path: impl Into<String>, size: u64, hash: Option<String>) -> Self {
        Self { path: path.into(), size, hash }
    }
}

//! Compression format detection and decompression for index files.
//!
//! Repository indexes are published both uncompressed and in one or more
//! compressed variants (`Packages`, `Packages.gz`, `Packages.xz`...). This
//! crate wraps the relevant compression libraries behind a unified
//! [`Compression`] enum, providing:
//!
//! - **Format detection** from file extensions ([`Compression::from_path`]),
//!   where an unknown extension means "not an index we can read"
//! - **In-memory** compression ([`Compression::compress`]) for building
//!   index fixtures
//! - **Streaming** decompression via wrapped readers ([`Compression::wrap_reader`])
//!
//! Bzip2 and Gzip are always available. XZ is behind the `xz` feature flag.

mod construct;
pub mod error;
mod ops;
mod util;

/// A supported compression format.
///
/// Defaults to [`None`](Self::None) (uncompressed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Uncompressed
    #[default]
    None,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    #[cfg(feature = "xz")]
    Xz,
}

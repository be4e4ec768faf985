use crate::Compression;
use crate::error::{Error, ErrorKind};
use std::{path::Path, str::FromStr};

impl FromStr for Compression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "bz2" | "bzip2" => Ok(Compression::Bzip2),
            "gz" | "gzip" => Ok(Compression::Gzip),
            #[cfg(feature = "xz")]
            "xz" | "lzma" => Ok(Compression::Xz),
            #[cfg(not(feature = "xz"))]
            "xz" | "lzma" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Compression {
    /// Detect compression from a file extension.
    ///
    /// A path without an extension is uncompressed. Returns `None` when the
    /// extension is unknown, or names a format this build cannot decode, in
    /// which case the file should not be read as an index at all.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let Some(ext) = path.as_ref().extension() else {
            return Some(Compression::None);
        };
        match ext.to_str()?.to_lowercase().as_str() {
            "bz2" => Some(Compression::Bzip2),
            "gz" => Some(Compression::Gzip),
            #[cfg(feature = "xz")]
            "xz" => Some(Compression::Xz),
            _ => None,
        }
    }
}

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fmt;
use url::Url;

/// Base URL of the upstream mirror, pointing at the repository root (the
/// directory that contains `pool/` and `dists/`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mirror {
    url: Url,
}

impl Mirror {
    /// Parse and validate a mirror URL.
    ///
    /// A URL whose path ends in `/pool` is rejected: relative paths from the
    /// indexes already start with `pool/`, so the directory would be doubled.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).or_raise(|| ErrorKind::InvalidMirror(input.to_string()))?;
        if url.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidMirror(input.to_string()));
        }
        let mirror = Self { url };
        if mirror.trimmed_path().ends_with("/pool") {
            exn::bail!(ErrorKind::MirrorEndsWithPool(input.to_string()));
        }
        Ok(mirror)
    }

    /// URL path with at most one trailing slash removed.
    fn trimmed_path(&self) -> &str {
        let path = self.url.path();
        path.strip_suffix('/').unwrap_or(path)
    }

    /// Number of leading path segments the downloader must strip so that
    /// files land under the pool root with their relative path intact.
    pub fn cut_dirs(&self) -> usize {
        self.trimmed_path().matches('/').count()
    }

    /// Absolute URL of a path relative to the repository root.
    pub fn join(&self, relative: &str) -> String {
        let base = self.url.as_str();
        if base.ends_with('/') { format!("{base}{relative}") } else { format!("{base}/{relative}") }
    }
}

impl fmt::Display for Mirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

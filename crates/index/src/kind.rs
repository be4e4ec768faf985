use crate::error::Result;
use crate::grammar::Entries;
use crate::Entry;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io::BufRead;
use std::path::Path;
use tracing::instrument;

/// Which grammar an index file is written in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// `Packages` files (binary package lists).
    Packages,
    /// `Sources` files (source package lists).
    Sources,
}
impl IndexKind {
    /// Determine the grammar from the base filename, ignoring any
    /// (compression) extension: `Packages.gz` is a binary list, `Sources` is a
    /// source list, and anything else is not an index.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        match path.as_ref().file_stem()?.to_str()? {
            "Packages" => Some(Self::Packages),
            "Sources" => Some(Self::Sources),
            _ => None,
        }
    }

    /// Lazily parse an index, yielding entries in file order.
    pub fn entries<R: BufRead>(self, reader: R) -> Entries<R> {
        Entries::new(self, reader)
    }
}
impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Packages => "Packages",
            Self::Sources => "Sources",
        })
    }
}

/// Parse a whole index, handing every entry to `sink`.
///
/// Returns the number of entries emitted.
///
/// # Examples
///
/// ```
/// use mirrorcheck_index::{Entry, IndexKind, parse};
///
/// let index = b"Package: a\nFilename: a/b.deb\nSize: 10\nMD5sum: x\n";
/// let mut entries = Vec::new();
/// let count = parse(IndexKind::Packages, &index[..], |e| entries.push(e)).unwrap();
/// assert_eq!(count, 1);
/// assert_eq!(entries, vec![Entry::new("a/b.deb", 10, Some("x".to_string()))]);
/// ```
#[instrument(skip(reader, sink))]
pub fn parse<R: BufRead>(kind: IndexKind, reader: R, mut sink: impl FnMut(Entry)) -> Result<u64> {
    let mut count = 0;
    for entry in kind.entries(reader) {
        sink(entry?);
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dists/trixie/main/binary-amd64/Packages", Some(IndexKind::Packages))]
    #[case("dists/trixie/main/binary-amd64/Packages.gz", Some(IndexKind::Packages))]
    #[case("dists/trixie/main/source/Sources.xz", Some(IndexKind::Sources))]
    #[case("Sources", Some(IndexKind::Sources))]
    #[case("dists/trixie/main/binary-amd64/Release", None)]
    #[case("dists/trixie/main/i18n/Translation-en.bz2", None)]
    #[case("dists/trixie/main/binary-amd64/packages.gz", None)]
    #[case("dists/trixie/main/Contents-amd64.gz", None)]
    fn test_from_path(#[case] path: &str, #[case] expected: Option<IndexKind>) {
        assert_eq!(IndexKind::from_path(path), expected);
    }

    #[test]
    fn test_parse_counts_entries() {
        let index = b"Filename: a/b.deb\nSize: 10\nMD5sum: x\n\nFilename: a/c.deb\nSize: 20\nMD5sum: y\n";
        let mut seen = Vec::new();
        let count = parse(IndexKind::Packages, &index[..], |e| seen.push(e.path)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(seen, vec!["a/b.deb", "a/c.deb"]);
    }

    #[test]
    fn test_parse_compressed_stream() {
        use mirrorcheck_compress::Compression;
        use std::io::{BufReader, Cursor};

        let index = b"Directory: pool/main/a\nChecksums-Sha256:\n deadbeef 5 a_1.0.dsc\n";
        let compressed = Compression::Gzip.compress(index).unwrap();
        let reader = BufReader::new(Compression::Gzip.wrap_reader(Cursor::new(compressed)).unwrap());
        let mut entries = Vec::new();
        let count = parse(IndexKind::Sources, reader, |e| entries.push(e)).unwrap();
        assert_eq!(count, 1);
        assert_eq!(entries[0].path, "pool/main/a/a_1.0.dsc");
    }

    #[test]
    fn test_parse_empty() {
        let count = parse(IndexKind::Sources, &b""[..], |_| panic!("no entries expected")).unwrap();
        assert_eq!(count, 0);
    }
}

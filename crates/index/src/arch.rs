//! Architecture exclusion.
//!
//! Mirrors usually carry indexes for far more architectures than anyone
//! wants to download. Index files (and dist roots) whose path names one of
//! the excluded architectures are never ingested, which keeps the catalog
//! bounded to the architectures of interest.

use std::path::Path;

/// Architecture name fragments excluded by default.
///
/// Each fragment is matched as `-<fragment>` anywhere in a path, so `mips`
/// also covers `binary-mipsel` and `binary-mips64el`, and `kfreebsd` covers
/// both `kfreebsd-amd64` and `kfreebsd-i386`.
pub const EXCLUDED_ARCHITECTURES: &[&str] = &[
    "armhf",
    "armel",
    "arm64",
    "hurd-i386",
    "kfreebsd",
    "mips",
    "powerpc",
    "ppc64el",
    "s390x",
];

/// A set of architecture fragments to exclude.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchitectureFilter {
    tags: Vec<String>,
}
impl Default for ArchitectureFilter {
    fn default() -> Self {
        Self::new(EXCLUDED_ARCHITECTURES.iter().copied())
    }
}
impl ArchitectureFilter {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = tags.into_iter().map(Into::into).filter(|t: &String| !t.is_empty()).collect();
        Self { tags }
    }

    /// A filter that excludes nothing.
    pub fn none() -> Self {
        Self { tags: Vec::new() }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the first excluded fragment found in `path`, if any.
    pub fn matched(&self, path: impl AsRef<Path>) -> Option<&str> {
        let path = path.as_ref().to_string_lossy();
        self.tags.iter().find(|tag| path.contains(&format!("-{tag}"))).map(String::as_str)
    }

    /// Returns `true` if `path` names an excluded architecture.
    pub fn is_excluded(&self, path: impl AsRef<Path>) -> bool {
        self.matched(path).is_some()
    }
}

/// Returns `true` if `path` names one of the [`EXCLUDED_ARCHITECTURES`].
///
/// # Examples
///
/// ```
/// use mirrorcheck_index::is_excluded_architecture;
///
/// assert!(is_excluded_architecture("dists/trixie/main/binary-armhf/Packages.gz"));
/// assert!(is_excluded_architecture("dists/trixie/main/binary-mips64el/Packages"));
/// assert!(!is_excluded_architecture("dists/trixie/main/binary-amd64/Packages.gz"));
/// ```
pub fn is_excluded_architecture(path: impl AsRef<Path>) -> bool {
    ArchitectureFilter::default().is_excluded(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("dists/trixie/main/binary-armhf/Packages.gz", Some("armhf"))]
    #[case("dists/trixie/main/binary-armel/Packages", Some("armel"))]
    #[case("dists/trixie/main/binary-arm64/Packages", Some("arm64"))]
    #[case("dists/trixie/main/binary-hurd-i386/Packages", Some("hurd-i386"))]
    #[case("dists/squeeze/main/binary-kfreebsd-amd64/Packages", Some("kfreebsd"))]
    #[case("dists/trixie/main/binary-mips/Packages", Some("mips"))]
    #[case("dists/trixie/main/binary-mipsel/Packages", Some("mips"))]
    #[case("dists/trixie/main/binary-mips64el/Packages", Some("mips"))]
    #[case("dists/trixie/main/binary-powerpc/Packages", Some("powerpc"))]
    #[case("dists/trixie/main/binary-ppc64el/Packages", Some("ppc64el"))]
    #[case("dists/trixie/main/binary-s390x/Packages", Some("s390x"))]
    #[case("/srv/debian-armhf/dists", Some("armhf"))]
    #[case("dists/trixie/main/binary-amd64/Packages.gz", None)]
    #[case("dists/trixie/main/binary-i386/Packages.gz", None)]
    #[case("dists/trixie/main/source/Sources.gz", None)]
    #[case("dists/trixie/main/binary-all/Packages", None)]
    // Only matched after a dash.
    #[case("/srv/armhf/dists/trixie/main/binary-amd64/Packages", None)]
    fn test_default_filter(#[case] path: &str, #[case] expected: Option<&str>) {
        let filter = ArchitectureFilter::default();
        assert_eq!(filter.matched(path), expected);
        assert_eq!(is_excluded_architecture(path), expected.is_some());
    }

    #[test]
    fn test_custom_filter() {
        let filter = ArchitectureFilter::new(["i386", ""]);
        assert_eq!(filter.tags(), ["i386"]);
        assert!(filter.is_excluded("dists/trixie/main/binary-i386/Packages"));
        assert!(filter.is_excluded("dists/trixie/main/binary-hurd-i386/Packages"));
        assert!(!filter.is_excluded("dists/trixie/main/binary-armhf/Packages"));
    }

    #[test]
    fn test_none_excludes_nothing() {
        assert!(!ArchitectureFilter::none().is_excluded("dists/trixie/main/binary-armhf/Packages"));
    }
}

//! Finding index files under dist roots.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use globset::GlobBuilder;
use mirrorcheck_index::ArchitectureFilter;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Expand a dist root pattern into the existing paths it matches, sorted.
///
/// A pattern without glob metacharacters is returned as-is if the path
/// exists. Wildcards never match across a path separator.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    if !pattern.contains(GLOB_META) {
        return Ok(if path.exists() { vec![path.to_path_buf()] } else { Vec::new() });
    }
    let glob = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .or_raise(|| ErrorKind::Pattern(pattern.to_string()))?
        .compile_matcher();

    // Walk from the deepest directory that has no wildcard in it, exactly as
    // deep as the pattern has components left.
    let components: Vec<Component> = path.components().collect();
    let literal = components
        .iter()
        .take_while(|c| !c.as_os_str().to_string_lossy().contains(GLOB_META))
        .count();
    let base: PathBuf = components[..literal].iter().collect();
    let depth = components.len() - literal;
    let relative = base.as_os_str().is_empty();
    let start = if relative { PathBuf::from(".") } else { base };

    let mut matches: Vec<PathBuf> = WalkDir::new(&start)
        .min_depth(depth)
        .max_depth(depth)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.into_path()),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable path while expanding {pattern}");
                None
            },
        })
        .map(|p| if relative { p.strip_prefix(".").map(Path::to_path_buf).unwrap_or(p) } else { p })
        .filter(|p| glob.is_match(p))
        .collect();
    matches.sort();
    Ok(matches)
}

/// Turn a user-supplied dist root into the directory to search, if any.
///
/// A directory that is not itself called `dists` but contains one is
/// descended into, so a mirror root works as well as its `dists/`. Roots that
/// are not directories, or whose path names an excluded architecture, are
/// skipped.
pub fn resolve_dist_root(path: &Path, architectures: &ArchitectureFilter) -> Option<PathBuf> {
    if !path.is_dir() {
        tracing::debug!(path = %path.display(), "not an existing dir");
        return None;
    }
    let mut root: PathBuf = path.components().filter(|c| !matches!(c, Component::CurDir)).collect();
    if root.as_os_str().is_empty() {
        root = PathBuf::from(".");
    }
    if root.file_name().is_none_or(|name| name != "dists") && root.join("dists").is_dir() {
        root.push("dists");
    }
    if let Some(tag) = architectures.matched(&root) {
        tracing::debug!(path = %root.display(), tag, "dist root ignored");
        return None;
    }
    Some(root)
}

/// Every non-directory entry below the real (non-symlinked) subdirectories
/// of a dist root, in a stable order. Files directly inside the root are not
/// considered.
pub fn index_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(root).or_raise(|| ErrorKind::Filesystem(root.to_path_buf()))? {
        let entry = entry.or_raise(|| ErrorKind::Filesystem(root.to_path_buf()))?;
        let file_type = entry.file_type().or_raise(|| ErrorKind::Filesystem(entry.path()))?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }
    subdirs.sort();

    let mut files = Vec::new();
    for dir in subdirs {
        tracing::trace!(dir = %dir.display(), "analyzing dir");
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            match entry {
                Ok(entry) if !entry.file_type().is_dir() => files.push(entry.into_path()),
                Ok(_) => {},
                Err(e) => tracing::debug!(error = %e, "skipping unreadable path"),
            }
        }
    }
    Ok(files)
}

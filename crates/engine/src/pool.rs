//! Pool scanning.
//!
//! The pool can be consulted two ways. With a scan, every file under
//! `<root>/pool` is listed once (or loaded from the cache when the previous
//! listing is still trusted) and lookups are map hits. Without one, each
//! lookup stats the file on demand, and excess files cannot be searched for.

use crate::error::{ErrorKind, Result};
use crate::marker::PoolMarker;
use async_stream::stream;
use exn::{OptionExt, ResultExt};
use futures::{Stream, StreamExt};
use mirrorcheck_cache::{PoolEntry, Repository};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use time::UtcDateTime;
use tokio::fs::{self, DirEntry};
use tracing::instrument;

enum WalkEntry {
    File(PoolEntry),
    Descend(PathBuf),
    Skip,
}

/// List every regular file below `<root>/pool`, with paths relative to
/// `root` (so they start with `pool/`).
///
/// Symlinked directories are not descended into; symlinked files are listed
/// with the size of their target. A missing `pool` directory lists nothing.
pub fn walk(root: &Path) -> impl Stream<Item = Result<PoolEntry>> + '_ {
    let mut stack = vec![root.join("pool")];
    stream! {
        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    yield Err::<PoolEntry, _>(e).or_raise(|| ErrorKind::Filesystem(current.clone()));
                    continue;
                },
            };
            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err::<PoolEntry, _>(e).or_raise(|| ErrorKind::Filesystem(current.clone()));
                        break;
                    },
                };
                match process_entry(root, entry).await {
                    Ok(WalkEntry::File(file)) => yield Ok(file),
                    Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                    Ok(WalkEntry::Skip) => {},
                    Err(e) => yield Err(e),
                }
            }
        }
    }
}

async fn process_entry(root: &Path, entry: DirEntry) -> Result<WalkEntry> {
    let path = entry.path();
    let file_type = entry.file_type().await.or_raise(|| ErrorKind::Filesystem(path.clone()))?;
    if file_type.is_dir() {
        return Ok(WalkEntry::Descend(path));
    }
    // Follows symlinks, unlike the directory entry's own metadata.
    let metadata = match fs::metadata(&path).await {
        Ok(metadata) => metadata,
        // Note: silently drop what is most likely a broken symlink.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(WalkEntry::Skip),
        Err(e) => return Err(e).or_raise(|| ErrorKind::Filesystem(path)),
    };
    if !metadata.is_file() {
        return Ok(WalkEntry::Skip);
    }
    let relative = path.strip_prefix(root).or_raise(|| ErrorKind::Filesystem(path.clone()))?;
    let relative = relative.to_str().ok_or_raise(|| ErrorKind::Filesystem(path.clone()))?;
    Ok(WalkEntry::File(PoolEntry::new(relative, metadata.len())))
}

/// Where pool sizes come from during reconciliation.
#[derive(Debug)]
pub enum PoolIndex {
    /// A full listing, from a fresh scan or the cache.
    Listed(HashMap<String, u64>),
    /// Files are stat'ed on demand below this pool root.
    Live(PathBuf),
}

impl PoolIndex {
    /// Size of the file at a root-relative path, or `None` if it is absent.
    pub async fn size_of(&self, relative: &str) -> Result<Option<u64>> {
        match self {
            PoolIndex::Listed(files) => Ok(files.get(relative).copied()),
            PoolIndex::Live(root) => {
                let path = root.join(relative);
                match fs::metadata(&path).await {
                    Ok(metadata) => Ok(Some(metadata.len())),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e).or_raise(|| ErrorKind::Filesystem(path)),
                }
            },
        }
    }

    /// Whether a full listing is available, which excess search requires.
    pub fn is_listed(&self) -> bool {
        matches!(self, PoolIndex::Listed(_))
    }

    /// Number of listed files; `None` for on-demand lookups.
    pub fn len(&self) -> Option<usize> {
        match self {
            PoolIndex::Listed(files) => Some(files.len()),
            PoolIndex::Live(_) => None,
        }
    }
}

/// How a listed pool was obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolSource {
    /// The previous scan was still trusted and loaded from the cache.
    Cache,
    /// The pool directory was walked.
    Scan,
    /// No listing; sizes are looked up on demand.
    Live,
}

/// Decides between loading, rescanning and on-demand lookups.
pub struct PoolScanner<'a> {
    repo: &'a Repository,
    marker: &'a PoolMarker,
}

impl<'a> PoolScanner<'a> {
    pub fn new(repo: &'a Repository, marker: &'a PoolMarker) -> Self {
        Self { repo, marker }
    }

    /// Whether the cached listing for `root` can be used instead of a walk.
    ///
    /// It can if the pool table is not empty and the recorded scan of this
    /// root is no older than the root's marker.
    pub async fn is_cache_current(&self, root: &Path, now: UtcDateTime) -> Result<bool> {
        if self.repo.count_pool().await.or_raise(|| ErrorKind::Cache)? == 0 {
            tracing::debug!("pool db is empty");
            return Ok(false);
        }
        let Some(scanned) = self.repo.pool_scanned_at(root).await.or_raise(|| ErrorKind::Cache)? else {
            tracing::debug!("pool was never scanned at this root");
            return Ok(false);
        };
        let marker = self.marker.get(root, now)?;
        let current = marker <= scanned;
        tracing::debug!(%marker, %scanned, current, "previous pool scan");
        Ok(current)
    }

    /// Produce the pool index for a run.
    ///
    /// Without `scan` nothing is read up front. With it, the cached listing is
    /// loaded if still current, otherwise the pool is walked and the cache
    /// replaced along with its scan time.
    #[instrument(level = "debug", skip(self), fields(root = %root.display()))]
    pub async fn open(&self, root: &Path, scan: bool, now: UtcDateTime) -> Result<(PoolIndex, PoolSource)> {
        if !scan {
            return Ok((PoolIndex::Live(root.to_path_buf()), PoolSource::Live));
        }
        if self.is_cache_current(root, now).await? {
            let files = self.repo.load_pool().await.or_raise(|| ErrorKind::Cache)?;
            return Ok((PoolIndex::Listed(files), PoolSource::Cache));
        }
        let files = self.rescan(root, now).await?;
        Ok((PoolIndex::Listed(files), PoolSource::Scan))
    }

    /// Walk the pool and replace the cached listing.
    pub async fn rescan(&self, root: &Path, now: UtcDateTime) -> Result<HashMap<String, u64>> {
        let mut writer = self.repo.begin_pool_scan().await.or_raise(|| ErrorKind::Cache)?;
        let mut files = HashMap::new();
        let mut entries = std::pin::pin!(walk(root));
        while let Some(entry) = entries.next().await {
            let entry = entry?;
            files.insert(entry.path.clone(), entry.size);
            writer.push(entry).await.or_raise(|| ErrorKind::Cache)?;
        }
        let stamp = self.marker.ensure(root, now)?;
        let count = writer.finish(root, stamp).await.or_raise(|| ErrorKind::Cache)?;
        tracing::info!(count, "pool scanned");
        Ok(files)
    }
}

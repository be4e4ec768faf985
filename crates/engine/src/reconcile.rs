//! Missing and excess sets.

use crate::error::{ErrorKind, Result};
use crate::pool::PoolIndex;
use exn::ResultExt;
use futures::StreamExt;
use mirrorcheck_cache::{Catalog, CatalogId, PoolEntry, Repository};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// File listing missing paths, in the working directory.
pub const MISSING_FILE: &str = "missing";
/// File listing excess paths, in the working directory.
pub const EXCESS_FILE: &str = "excess";

/// Paths the active catalogs expect but the pool lacks (or has at the wrong size).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Missing {
    /// Sorted, without duplicates.
    pub paths: Vec<String>,
    /// Catalogs with at least one record that failed to match, sorted by path.
    pub catalogs: Vec<Catalog>,
}

/// Pool files that no cached catalog references.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Excess {
    /// Sorted by path.
    pub entries: Vec<PoolEntry>,
    pub bytes: u64,
}

/// Compare every record of the active catalogs against the pool.
///
/// A record is satisfied when the pool holds a file at its path with exactly
/// its size. Anything else makes the path missing and the record's catalog
/// responsible.
#[instrument(level = "debug", skip_all, fields(catalogs = active.len()))]
pub async fn find_missing(repo: &Repository, active: &[CatalogId], pool: &PoolIndex) -> Result<Missing> {
    let mut missing = BTreeSet::new();
    let mut responsible = BTreeSet::new();
    // On-demand lookups are memoized; several catalogs often share a path.
    let mut seen: HashMap<String, Option<u64>> = HashMap::new();
    {
        let mut records = std::pin::pin!(repo.stream_packages(active).or_raise(|| ErrorKind::Cache)?);
        while let Some(record) = records.next().await {
            let record = record.or_raise(|| ErrorKind::Cache)?;
            let size = match pool {
                PoolIndex::Listed(_) => pool.size_of(&record.path).await?,
                PoolIndex::Live(_) => match seen.get(&record.path) {
                    Some(size) => *size,
                    None => {
                        let size = pool.size_of(&record.path).await?;
                        seen.insert(record.path.clone(), size);
                        size
                    },
                },
            };
            match size {
                Some(size) if size == record.size => continue,
                Some(size) => tracing::trace!(path = %record.path, expected = record.size, size, "size mismatch"),
                None => tracing::trace!(path = %record.path, expected = record.size, "missing"),
            }
            responsible.insert(record.catalog);
            missing.insert(record.path);
        }
    }
    let ids: Vec<CatalogId> = responsible.into_iter().collect();
    let catalogs = if ids.is_empty() { Vec::new() } else { repo.list_catalogs(&ids).await.or_raise(|| ErrorKind::Cache)? };
    Ok(Missing { paths: missing.into_iter().collect(), catalogs })
}

/// Pool files absent from every cached catalog, not just the active ones.
///
/// Returns `None` when the pool was not listed, since excess files can only
/// be found from a listing.
#[instrument(level = "debug", skip_all)]
pub async fn find_excess(repo: &Repository, pool: &PoolIndex) -> Result<Option<Excess>> {
    if !pool.is_listed() {
        return Ok(None);
    }
    let entries = repo.list_excess().await.or_raise(|| ErrorKind::Cache)?;
    let bytes = entries.iter().map(|e| e.size).sum();
    Ok(Some(Excess { entries, bytes }))
}

/// Write one path per line, replacing the file.
pub fn write_list<'a>(path: &Path, lines: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let file = File::create(path).or_raise(|| ErrorKind::Output(path.to_path_buf()))?;
    let mut out = BufWriter::new(file);
    for line in lines {
        writeln!(out, "{line}").or_raise(|| ErrorKind::Output(path.to_path_buf()))?;
    }
    out.flush().or_raise(|| ErrorKind::Output(path.to_path_buf()))
}

/// Remove a previous output file, if there is one.
pub fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).or_raise(|| ErrorKind::Output(path.to_path_buf())),
    }
}

/// Persist the missing set as `<work_dir>/missing`.
pub fn write_missing(work_dir: &Path, missing: &Missing) -> Result<PathBuf> {
    let path = work_dir.join(MISSING_FILE);
    write_list(&path, missing.paths.iter().map(String::as_str))?;
    Ok(path)
}

/// Replace `<work_dir>/excess`: removed first, then rewritten only if excess
/// files were searched for.
pub fn write_excess(work_dir: &Path, excess: Option<&Excess>) -> Result<Option<PathBuf>> {
    let path = work_dir.join(EXCESS_FILE);
    remove_stale(&path)?;
    let Some(excess) = excess else {
        return Ok(None);
    };
    write_list(&path, excess.entries.iter().map(|e| e.path.as_str()))?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorcheck_cache::{Database, Signature};
    use mirrorcheck_index::Entry;
    use time::macros::utc_datetime;

    async fn ingest(repo: &Repository, path: &str, records: &[(&str, u64)]) -> Catalog {
        let signature = Signature::new(utc_datetime!(2026-01-01 00:00), 1);
        let mut writer = repo.begin_catalog(path, signature).await.unwrap();
        for (name, size) in records {
            writer.push(Entry::new(*name, *size, Some(format!("{name}-hash")))).await.unwrap();
        }
        writer.finish().await.unwrap()
    }

    fn listed(files: &[(&str, u64)]) -> PoolIndex {
        PoolIndex::Listed(files.iter().map(|(p, s)| (p.to_string(), *s)).collect())
    }

    #[tokio::test]
    async fn test_missing_absent_file() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let catalog = ingest(&repo, "/m/Packages", &[("p1", 10), ("p2", 20)]).await;
        let missing = find_missing(&repo, &[catalog.id], &listed(&[("p1", 10)])).await.unwrap();
        assert_eq!(missing.paths, vec!["p2".to_string()]);
        assert_eq!(missing.catalogs, vec![catalog]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_size_mismatch() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let catalog = ingest(&repo, "/m/Packages", &[("p1", 10)]).await;
        let missing = find_missing(&repo, &[catalog.id], &listed(&[("p1", 99)])).await.unwrap();
        assert_eq!(missing.paths, vec!["p1".to_string()]);
        assert_eq!(missing.catalogs.len(), 1);
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_is_deduplicated_and_scoped() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let b = ingest(&repo, "/m/b/Packages", &[("shared", 5), ("p1", 1)]).await;
        let a = ingest(&repo, "/m/a/Packages", &[("shared", 5)]).await;
        let c = ingest(&repo, "/m/c/Packages", &[("inactive", 5)]).await;
        let ok = ingest(&repo, "/m/d/Packages", &[("p1", 1)]).await;
        let pool = listed(&[("p1", 1)]);

        let missing = find_missing(&repo, &[b.id, a.id, ok.id], &pool).await.unwrap();
        assert_eq!(missing.paths, vec!["shared".to_string()]);
        let paths: Vec<_> = missing.catalogs.iter().map(|c| c.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("/m/a/Packages"), PathBuf::from("/m/b/Packages")]);

        let everything = find_missing(&repo, &[a.id, b.id, c.id, ok.id], &pool).await.unwrap();
        assert_eq!(everything.paths, vec!["inactive".to_string(), "shared".to_string()]);
        db.close().await;
    }

    #[tokio::test]
    async fn test_nothing_missing() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let catalog = ingest(&repo, "/m/Packages", &[("p1", 10)]).await;
        let missing = find_missing(&repo, &[catalog.id], &listed(&[("p1", 10), ("p2", 3)])).await.unwrap();
        assert_eq!(missing, Missing::default());
        assert_eq!(find_missing(&repo, &[], &listed(&[])).await.unwrap(), Missing::default());
        db.close().await;
    }

    #[tokio::test]
    async fn test_missing_with_live_lookups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pool/a")).unwrap();
        std::fs::write(dir.path().join("pool/a/ok.deb"), [0u8; 4]).unwrap();
        std::fs::write(dir.path().join("pool/a/short.deb"), [0u8; 2]).unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        let x = ingest(&repo, "/m/x/Packages", &[("pool/a/ok.deb", 4), ("pool/a/short.deb", 4)]).await;
        let y = ingest(&repo, "/m/y/Packages", &[("pool/a/ok.deb", 4), ("pool/a/gone.deb", 1)]).await;
        let pool = PoolIndex::Live(dir.path().to_path_buf());
        let missing = find_missing(&repo, &[x.id, y.id], &pool).await.unwrap();
        assert_eq!(missing.paths, vec!["pool/a/gone.deb".to_string(), "pool/a/short.deb".to_string()]);
        assert_eq!(missing.catalogs.len(), 2);
        db.close().await;
    }

    #[tokio::test]
    async fn test_excess() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        ingest(&repo, "/m/Packages", &[("p1", 1), ("p2", 2)]).await;
        let mut writer = repo.begin_pool_scan().await.unwrap();
        for (path, size) in [("p1", 1), ("p2", 2), ("p3", 30)] {
            writer.push(PoolEntry::new(path, size)).await.unwrap();
        }
        writer.finish("/m", utc_datetime!(2026-01-01 00:00)).await.unwrap();
        let pool = PoolIndex::Listed(repo.load_pool().await.unwrap());

        let excess = find_excess(&repo, &pool).await.unwrap().unwrap();
        assert_eq!(excess, Excess { entries: vec![PoolEntry::new("p3", 30)], bytes: 30 });
        assert_eq!(find_excess(&repo, &PoolIndex::Live(PathBuf::from("/m"))).await.unwrap(), None);
        db.close().await;
    }

    #[test]
    fn test_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Missing { paths: vec!["pool/a".into(), "pool/b".into()], catalogs: Vec::new() };
        let path = write_missing(dir.path(), &missing).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "pool/a\npool/b\n");

        let excess = Excess { entries: vec![PoolEntry::new("pool/z", 3)], bytes: 3 };
        let path = write_excess(dir.path(), Some(&excess)).unwrap().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "pool/z\n");
        // Not searched this time: the stale list goes away.
        assert_eq!(write_excess(dir.path(), None).unwrap(), None);
        assert!(!path.exists());
    }
}

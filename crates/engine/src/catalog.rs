//! Incremental ingestion of index files into the catalog cache.
//!
//! Each index file is identified by its absolute path and stamped with its
//! modification time and size. A file whose stamp matches a completed catalog
//! is a cache hit and is not read past its first byte; anything else replaces
//! the cached catalog inside a single transaction.

use crate::discover::index_candidates;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use mirrorcheck_cache::{Catalog, CatalogId, Repository, Signature};
use mirrorcheck_compress::Compression;
use mirrorcheck_index::{ArchitectureFilter, IndexKind};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::instrument;

/// Why a candidate file was not ingested.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Skip {
    /// The base filename is neither `Packages` nor `Sources`.
    Name,
    /// The extension is unknown or its format is not enabled.
    Format,
    /// The path names an excluded architecture.
    Architecture(String),
    /// The file decompresses to nothing.
    Empty,
    /// The file could not be opened, or its first bytes could not be decoded.
    Unreadable,
}
impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::Name => f.write_str("not an index"),
            Skip::Format => f.write_str("unsupported format"),
            Skip::Architecture(tag) => write!(f, "excluded architecture ({tag})"),
            Skip::Empty => f.write_str("empty"),
            Skip::Unreadable => f.write_str("unreadable"),
        }
    }
}

/// What happened to a single candidate file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum IngestOutcome {
    /// Unchanged since it was last parsed; the cached catalog was reused.
    Cached(Catalog),
    /// Parsed, replacing any stale catalog for the same path.
    Parsed(Catalog),
    Skipped(Skip),
}

/// Counters over every candidate offered to a [`CatalogBuilder`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct IngestStats {
    pub cached: u64,
    pub parsed: u64,
    pub skipped: u64,
    /// Package records written by parsed catalogs.
    pub records: u64,
}

/// Drives index parsing into the cache and collects the active catalog set.
pub struct CatalogBuilder<'a> {
    repo: &'a Repository,
    architectures: &'a ArchitectureFilter,
    formats: &'a [Compression],
    active: BTreeSet<CatalogId>,
    stats: IngestStats,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(repo: &'a Repository, architectures: &'a ArchitectureFilter, formats: &'a [Compression]) -> Self {
        Self { repo, architectures, formats, active: BTreeSet::new(), stats: IngestStats::default() }
    }

    /// Catalogs ingested or confirmed unchanged so far, in id order.
    pub fn active(&self) -> Vec<CatalogId> {
        self.active.iter().copied().collect()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Ingest every index file found below a resolved dist root.
    pub async fn ingest_tree(&mut self, root: &Path) -> Result<()> {
        for path in index_candidates(root)? {
            self.ingest_file(&path).await?;
        }
        Ok(())
    }

    /// Ingest a single index file.
    ///
    /// Skips are part of the outcome, not errors. Errors mean the cache
    /// failed, or the file broke down after its first bytes decoded fine.
    #[instrument(level = "debug", skip(self), fields(path = %path.display()))]
    pub async fn ingest_file(&mut self, path: &Path) -> Result<IngestOutcome> {
        let outcome = self.ingest(path).await?;
        match &outcome {
            IngestOutcome::Cached(catalog) => {
                tracing::debug!(id = %catalog.id, count = catalog.count, "already parsed");
                self.stats.cached += 1;
                self.active.insert(catalog.id);
            },
            IngestOutcome::Parsed(catalog) => {
                tracing::info!(id = %catalog.id, count = catalog.count, "entries added");
                self.stats.parsed += 1;
                self.stats.records += catalog.count;
                self.active.insert(catalog.id);
            },
            IngestOutcome::Skipped(reason) => {
                tracing::debug!(%reason, "file ignored");
                self.stats.skipped += 1;
            },
        }
        Ok(outcome)
    }

    async fn ingest(&self, path: &Path) -> Result<IngestOutcome> {
        let Some(kind) = IndexKind::from_path(path) else {
            return Ok(IngestOutcome::Skipped(Skip::Name));
        };
        let Some(compression) = Compression::from_path(path).filter(|c| self.formats.contains(c)) else {
            return Ok(IngestOutcome::Skipped(Skip::Format));
        };
        if let Some(tag) = self.architectures.matched(path) {
            return Ok(IngestOutcome::Skipped(Skip::Architecture(tag.to_string())));
        }
        let path = std::path::absolute(path).or_raise(|| ErrorKind::Filesystem(path.to_path_buf()))?;
        tracing::trace!(%kind, %compression, "reading index");
        let opened = File::open(&path).and_then(|file| Ok((Signature::of(&file.metadata()?)?, file)));
        let (signature, file) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::debug!(error = %e, "could not open index");
                return Ok(IngestOutcome::Skipped(Skip::Unreadable));
            },
        };
        let mut reader = match compression.wrap_reader(file) {
            Ok(reader) => BufReader::new(reader),
            Err(e) => {
                tracing::debug!(error = ?e, "could not decode index");
                return Ok(IngestOutcome::Skipped(Skip::Unreadable));
            },
        };
        match reader.fill_buf().map(|buf| buf.is_empty()) {
            Ok(false) => {},
            Ok(true) => return Ok(IngestOutcome::Skipped(Skip::Empty)),
            Err(e) => {
                tracing::debug!(error = %e, "could not decode index");
                return Ok(IngestOutcome::Skipped(Skip::Unreadable));
            },
        }

        let cached = self.repo.get_catalog(&path).await.or_raise(|| ErrorKind::Cache)?;
        if let Some(catalog) = cached
            && catalog.is_current(&signature)
        {
            return Ok(IngestOutcome::Cached(catalog));
        }

        let mut writer = self.repo.begin_catalog(&path, signature).await.or_raise(|| ErrorKind::Cache)?;
        for entry in kind.entries(reader) {
            let entry = entry.or_raise(|| ErrorKind::Index(path.clone()))?;
            writer.push(entry).await.or_raise(|| ErrorKind::Cache)?;
        }
        let catalog = writer.finish().await.or_raise(|| ErrorKind::Cache)?;
        Ok(IngestOutcome::Parsed(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorcheck_cache::Database;
    use std::fs;
    use std::time::{Duration, SystemTime};

    const PACKAGES: &str = "Package: a\nFilename: pool/main/a/a.deb\nSize: 10\nMD5sum: x\n\n\
                            Package: c\nFilename: pool/main/c/c.deb\nSize: 20\nMD5sum: y\n";
    const FORMATS: &[Compression] = &[Compression::None, Compression::Gzip];

    struct Fixture {
        dir: tempfile::TempDir,
        db: Database,
        repo: Repository,
        filter: ArchitectureFilter,
    }

    async fn fixture() -> Fixture {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        Fixture { dir: tempfile::tempdir().unwrap(), db, repo, filter: ArchitectureFilter::default() }
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[tokio::test]
    async fn test_parse_then_cache_hit() {
        let fx = fixture().await;
        let path = fx.dir.path().join("dists/sid/main/binary-amd64/Packages");
        write(&path, PACKAGES.as_bytes());

        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        let IngestOutcome::Parsed(first) = builder.ingest_file(&path).await.unwrap() else {
            panic!("expected a parse");
        };
        assert_eq!(first.count, 2);

        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        let IngestOutcome::Cached(second) = builder.ingest_file(&path).await.unwrap() else {
            panic!("expected a cache hit");
        };
        assert_eq!(first, second);
        assert_eq!(builder.stats(), IngestStats { cached: 1, ..Default::default() });
        assert_eq!(builder.active(), vec![first.id]);
        assert_eq!(fx.repo.list_packages(first.id).await.unwrap().len(), 2);
        fx.db.close().await;
    }

    #[tokio::test]
    async fn test_changed_signature_reparses_once() {
        let fx = fixture().await;
        let path = fx.dir.path().join("dists/sid/main/binary-amd64/Packages");
        write(&path, PACKAGES.as_bytes());
        set_mtime(&path, 1_000);

        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        let IngestOutcome::Parsed(first) = builder.ingest_file(&path).await.unwrap() else {
            panic!("expected a parse");
        };

        // Same size, new modification time.
        write(&path, PACKAGES.replace("Size: 10", "Size: 11").as_bytes());
        set_mtime(&path, 2_000);
        let IngestOutcome::Parsed(second) = builder.ingest_file(&path).await.unwrap() else {
            panic!("expected a re-parse");
        };
        assert_ne!(first.id, second.id);
        assert!(fx.repo.list_packages(first.id).await.unwrap().is_empty());
        let sizes: Vec<_> = fx.repo.list_packages(second.id).await.unwrap().into_iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![11, 20]);

        assert!(matches!(builder.ingest_file(&path).await.unwrap(), IngestOutcome::Cached(_)));
        assert_eq!(builder.stats(), IngestStats { cached: 1, parsed: 2, skipped: 0, records: 4 });
        assert_eq!(fx.repo.list_catalog_ids().await.unwrap(), vec![second.id]);
        fx.db.close().await;
    }

    #[tokio::test]
    async fn test_gzip_sources() {
        let fx = fixture().await;
        let sources = "Package: a\nDirectory: pool/main/a\nChecksums-Sha256:\n deadbeef 5 a_1.0.dsc\n";
        let path = fx.dir.path().join("dists/sid/main/source/Sources.gz");
        write(&path, &Compression::Gzip.compress(sources.as_bytes()).unwrap());

        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        let IngestOutcome::Parsed(catalog) = builder.ingest_file(&path).await.unwrap() else {
            panic!("expected a parse");
        };
        let packages = fx.repo.list_packages(catalog.id).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].path, "pool/main/a/a_1.0.dsc");
        assert_eq!(packages[0].hash.as_deref(), Some("deadbeef"));
        fx.db.close().await;
    }

    #[tokio::test]
    async fn test_skips() {
        let fx = fixture().await;
        let root = fx.dir.path();
        let cases = [
            ("dists/sid/Release", PACKAGES.as_bytes().to_vec(), Skip::Name),
            ("dists/sid/main/binary-amd64/Packages.zst", PACKAGES.as_bytes().to_vec(), Skip::Format),
            ("dists/sid/main/binary-amd64/Packages.bz2", PACKAGES.as_bytes().to_vec(), Skip::Format),
            ("dists/sid/main/binary-armhf/Packages", PACKAGES.as_bytes().to_vec(), Skip::Architecture("armhf".into())),
            ("dists/sid/main/binary-mipsel/Packages", PACKAGES.as_bytes().to_vec(), Skip::Architecture("mips".into())),
            (
                "dists/sid/main/source-mips/Sources",
                b"Directory: pool/main/a\nChecksums-Sha256:\n deadbeef 5 a_1.0.dsc\n".to_vec(),
                Skip::Architecture("mips".into()),
            ),
            ("dists/sid/main/binary-i386/Packages", Vec::new(), Skip::Empty),
            ("dists/sid/main/binary-amd64/Packages.gz", Compression::Gzip.compress(b"").unwrap(), Skip::Empty),
            ("dists/sid/main/source/Sources.gz", b"not gzip at all".to_vec(), Skip::Unreadable),
        ];
        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        for (name, content, expected) in cases {
            write(&root.join(name), &content);
            assert_eq!(builder.ingest_file(&root.join(name)).await.unwrap(), IngestOutcome::Skipped(expected), "{name}");
        }
        let missing = root.join("dists/sid/main/binary-amd64/Packages.missing/Packages");
        assert_eq!(builder.ingest_file(&missing).await.unwrap(), IngestOutcome::Skipped(Skip::Unreadable));
        assert!(builder.active().is_empty());
        assert!(fx.repo.list_catalog_ids().await.unwrap().is_empty());
        fx.db.close().await;
    }

    #[tokio::test]
    async fn test_ingest_tree() {
        let fx = fixture().await;
        let root = fx.dir.path().join("dists");
        write(&root.join("sid/main/binary-amd64/Packages"), PACKAGES.as_bytes());
        write(&root.join("sid/main/binary-amd64/Packages.gz"), &Compression::Gzip.compress(PACKAGES.as_bytes()).unwrap());
        write(&root.join("sid/main/binary-arm64/Packages"), PACKAGES.as_bytes());
        write(&root.join("sid/Release"), b"Origin: Debian\n");

        let mut builder = CatalogBuilder::new(&fx.repo, &fx.filter, FORMATS);
        builder.ingest_tree(&root).await.unwrap();
        assert_eq!(builder.stats(), IngestStats { cached: 0, parsed: 2, skipped: 2, records: 4 });
        assert_eq!(builder.active().len(), 2);
        let totals = fx.repo.totals(&builder.active()).await.unwrap();
        assert_eq!((totals.files, totals.unique), (4, 2));
        fx.db.close().await;
    }
}

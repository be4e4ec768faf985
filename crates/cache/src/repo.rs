//! Repository for catalogs, their package records, and the pool table.
//!
//! Catalog ingestion and pool scans are both written through a writer that
//! owns a transaction: a writer that is dropped without being finished rolls
//! back, so a half-parsed index or an interrupted walk never becomes visible.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{
    Catalog, CatalogId, CatalogRow, NewCatalogRow, PackageRecord, PackageRow, PoolEntry, PoolRow, Signature, Totals,
    size_from_row, timestamp_from_row, timestamp_to_row,
};
use exn::{OptionExt, ResultExt};
use futures::{Stream, StreamExt};
use mirrorcheck_index::Entry;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::HashMap;
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;

/// Rows buffered before a multi-row insert is flushed.
pub const BATCH_SIZE: usize = 100;

/// Repository for managing catalogs, package records and pool entries.
///
/// # Relationships
///
/// - A catalog owns its package records; deleting the catalog cascades.
/// - Pool entries are independent of catalogs. They are matched to package
///   records by relative path only.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    fn sqlx_hates_paths(path: impl AsRef<Path>) -> Result<String> {
        Ok(path.as_ref().to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string())
    }

    /// Catalog ids are passed to SQLite as a single JSON array and expanded
    /// with `json_each()`, so any number of ids fits in one bound parameter.
    fn id_list(ids: &[CatalogId]) -> Result<String> {
        serde_json::to_string(&ids.iter().map(|id| id.0).collect::<Vec<_>>())
            .or_raise(|| ErrorKind::InvalidData("catalog ids"))
    }

    // =========================================================================
    // Catalogs
    // =========================================================================

    /// Get the cached catalog for an index file path, if any.
    pub async fn get_catalog(&self, path: impl AsRef<Path>) -> Result<Option<Catalog>> {
        let row: Option<CatalogRow> = sqlx::query_as(include_str!("../queries/get_catalog_by_filename.sql"))
            .bind(Self::sqlx_hates_paths(path)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Catalog::try_from).transpose()
    }

    /// Start (re)ingesting an index file.
    ///
    /// Any catalog previously stored for the same path is deleted along with
    /// its package records, inside the same transaction the new records are
    /// written in. Nothing changes until [`CatalogWriter::finish`] commits.
    #[instrument(level = "debug", skip(self), fields(path = %path.as_ref().display()))]
    pub async fn begin_catalog(&self, path: impl AsRef<Path>, signature: Signature) -> Result<CatalogWriter> {
        let row = NewCatalogRow::new(path.as_ref(), &signature)?;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let deleted = sqlx::query(include_str!("../queries/delete_catalogs_by_filename.sql"))
            .bind(&row.filename)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .rows_affected();
        if deleted > 0 {
            tracing::debug!(deleted, "replacing stale catalog");
        }
        let id = sqlx::query(include_str!("../queries/insert_catalog.sql"))
            .bind(&row.filename)
            .bind(row.timestamp)
            .bind(row.size)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?
            .last_insert_rowid();
        Ok(CatalogWriter {
            tx,
            id: CatalogId(id),
            path: path.as_ref().to_path_buf(),
            signature,
            pending: Vec::with_capacity(BATCH_SIZE),
            count: 0,
        })
    }

    /// Ids of every completed catalog in the cache, from any run.
    pub async fn list_catalog_ids(&self) -> Result<Vec<CatalogId>> {
        let ids: Vec<i64> = sqlx::query_scalar(include_str!("../queries/list_catalog_ids.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(ids.into_iter().map(CatalogId).collect())
    }

    /// The catalogs with the given ids, ordered by path.
    pub async fn list_catalogs(&self, ids: &[CatalogId]) -> Result<Vec<Catalog>> {
        let rows: Vec<CatalogRow> = sqlx::query_as(include_str!("../queries/list_catalogs_by_ids.sql"))
            .bind(Self::id_list(ids)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Catalog::try_from).collect()
    }

    /// Sum of package records and number of distinct checksums over the given
    /// catalogs.
    pub async fn totals(&self, ids: &[CatalogId]) -> Result<Totals> {
        let ids = Self::id_list(ids)?;
        let (files, unique): (i64, i64) = sqlx::query_as(include_str!("../queries/count_totals_by_ids.sql"))
            .bind(&ids)
            .bind(&ids)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Totals { files: size_from_row(files)?, unique: size_from_row(unique)? })
    }

    /// Package records of a single catalog, in ingestion order.
    pub async fn list_packages(&self, id: CatalogId) -> Result<Vec<PackageRecord>> {
        let rows: Vec<PackageRow> = sqlx::query_as(include_str!("../queries/list_packages_by_catalog.sql"))
            .bind(id.0)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(PackageRecord::try_from).collect()
    }

    /// Stream every package record belonging to the given catalogs.
    ///
    /// Records are not deduplicated: a path referenced by several catalogs is
    /// yielded once per catalog. The stream holds the connection until it is
    /// dropped.
    pub fn stream_packages<'a>(
        &'a self,
        ids: &[CatalogId],
    ) -> Result<impl Stream<Item = Result<PackageRecord>> + use<'a>> {
        let stream = sqlx::query_as::<_, PackageRow>(include_str!("../queries/list_packages_by_ids.sql"))
            .bind(Self::id_list(ids)?)
            .fetch(&self.pool)
            .map(|row| row.or_raise(|| ErrorKind::Database).and_then(PackageRecord::try_from));
        Ok(stream)
    }

    // =========================================================================
    // Pool
    // =========================================================================

    /// Number of entries currently in the pool table.
    pub async fn count_pool(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_pool.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        size_from_row(count)
    }

    /// When the pool table was last accepted as a scan of the given pool root.
    pub async fn pool_scanned_at(&self, root: impl AsRef<Path>) -> Result<Option<UtcDateTime>> {
        let nanos: Option<i64> = sqlx::query_scalar(include_str!("../queries/get_pool_scanned.sql"))
            .bind(Self::sqlx_hates_paths(root)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        nanos.map(timestamp_from_row).transpose()
    }

    /// Load the whole pool table as a map of relative path to size.
    #[instrument(level = "debug", skip(self))]
    pub async fn load_pool(&self) -> Result<HashMap<String, u64>> {
        let rows: Vec<PoolRow> = sqlx::query_as(include_str!("../queries/list_pool.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(|row| Ok((row.filename, size_from_row(row.size)?))).collect()
    }

    /// Start replacing the pool table with a fresh scan.
    ///
    /// Both the pool table and every scan timestamp are cleared immediately
    /// within the writer's transaction; the previous contents stay visible to
    /// other connections until [`PoolWriter::finish`] commits.
    pub async fn begin_pool_scan(&self) -> Result<PoolWriter> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_pool.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        sqlx::query(include_str!("../queries/clear_pool_scanned.sql"))
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(PoolWriter { tx, pending: Vec::with_capacity(BATCH_SIZE), count: 0 })
    }

    /// Pool entries whose path no catalog in the cache references.
    ///
    /// Every cached catalog counts, not just the ones of the current run.
    #[instrument(level = "debug", skip(self))]
    pub async fn list_excess(&self) -> Result<Vec<PoolEntry>> {
        let rows: Vec<PoolRow> = sqlx::query_as(include_str!("../queries/list_excess.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(PoolEntry::try_from).collect()
    }
}

/// Transaction writing one catalog and its package records.
pub struct CatalogWriter {
    tx: Transaction<'static, Sqlite>,
    id: CatalogId,
    path: std::path::PathBuf,
    signature: Signature,
    pending: Vec<PackageRow>,
    count: u64,
}
impl CatalogWriter {
    pub fn id(&self) -> CatalogId {
        self.id
    }

    /// Records accepted so far, flushed or not.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub async fn push(&mut self, entry: Entry) -> Result<()> {
        self.pending.push(PackageRow::new(self.id, entry)?);
        self.count += 1;
        if self.pending.len() >= BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut query = QueryBuilder::<Sqlite>::new("INSERT INTO package (catalog_id, filename, size, hash) ");
        query.push_values(self.pending.drain(..), |mut row, package| {
            row.push_bind(package.catalog_id)
                .push_bind(package.filename)
                .push_bind(package.size)
                .push_bind(package.hash);
        });
        query.build().execute(&mut *self.tx).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Mark the catalog complete with its record count and commit.
    pub async fn finish(mut self) -> Result<Catalog> {
        self.flush().await?;
        let count = i64::try_from(self.count).or_raise(|| ErrorKind::InvalidData("count"))?;
        sqlx::query(include_str!("../queries/complete_catalog.sql"))
            .bind(count)
            .bind(self.id.0)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(Catalog { id: self.id, path: self.path, signature: self.signature, done: true, count: self.count })
    }
}

/// Transaction replacing the pool table.
pub struct PoolWriter {
    tx: Transaction<'static, Sqlite>,
    pending: Vec<PoolRow>,
    count: u64,
}
impl PoolWriter {
    /// Entries accepted so far, flushed or not.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub async fn push(&mut self, entry: PoolEntry) -> Result<()> {
        self.pending.push(PoolRow::try_from(entry)?);
        self.count += 1;
        if self.pending.len() >= BATCH_SIZE {
            self.flush().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut query = QueryBuilder::<Sqlite>::new("INSERT INTO pool (filename, size) ");
        query.push_values(self.pending.drain(..), |mut row, entry| {
            row.push_bind(entry.filename).push_bind(entry.size);
        });
        query.build().execute(&mut *self.tx).await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Record the scan time for the pool root and commit.
    pub async fn finish(mut self, root: impl AsRef<Path>, scanned_at: UtcDateTime) -> Result<u64> {
        self.flush().await?;
        sqlx::query(include_str!("../queries/insert_pool_scanned.sql"))
            .bind(Repository::sqlx_hates_paths(root)?)
            .bind(timestamp_to_row(scanned_at)?)
            .execute(&mut *self.tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        self.tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(self.count)
    }
}

//! The cache database file and its single connection.

use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Handle on the cache database.
///
/// A run reads and writes sequentially, so there is exactly one connection.
/// Whoever holds it (a catalog or pool writer, or a package stream) must be
/// done with it before the next query; [`Repository`](crate::Repository)
/// methods borrow it in turn.
#[derive(Debug, Clone)]
pub struct Database {
    conn: SqlitePool,
}

impl Database {
    async fn open(options: SqliteConnectOptions) -> Result<Self> {
        let conn = SqlitePoolOptions::new()
            .max_connections(1)
            // Never recycle the connection mid-run; an in-memory database
            // would be lost with it.
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        MIGRATOR.run(&conn).await.or_raise(|| ErrorKind::Migration)?;
        Ok(Self { conn })
    }

    /// Open (or create) `mirror.db` at the given path and bring its schema up
    /// to date.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let options = Self::options().filename(path.as_ref()).create_if_missing(true);
        Self::open(options).await
    }

    /// A throwaway database, for tests in this and dependent crates.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::open(Self::options().filename(":memory:")).await
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            // Deleting a catalog removes its package rows.
            .foreign_keys(true)
            // The cache can always be rebuilt from the indexes and the pool.
            .synchronous(SqliteSynchronous::Normal)
            // A second run on the same working directory waits for the
            // current catalog transaction instead of failing outright.
            .busy_timeout(Duration::from_millis(1500))
            .pragma("cache_size", "-16384")
            .pragma("temp_store", "memory")
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.conn
    }

    /// Close the connection once the run is over.
    pub async fn close(&self) {
        self.conn.close().await;
    }
}

//! SQLite cache of mirror catalogs and the pool.
//!
//! The cache is never the source of truth. Index files and the pool directory
//! are; the database only spares a run from re-parsing unchanged indexes and
//! re-walking an unchanged pool. Deleting it costs time, never correctness.
//!
//! # Architecture
//! The cache stores three kinds of rows:
//! - **Catalogs**: one per ingested index file, keyed by path and stamped with
//!   the file's modification time and size. A catalog whose stamp no longer
//!   matches the file on disk is stale and gets replaced wholesale.
//! - **Packages**: every file a catalog references, with its expected size.
//! - **Pool entries**: every file found by the most recent pool scan, plus one
//!   scan timestamp per pool root deciding whether that scan is still trusted.

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Catalog, CatalogId, PackageRecord, PoolEntry, Signature, Totals};
pub use crate::repo::{BATCH_SIZE, CatalogWriter, PoolWriter, Repository};

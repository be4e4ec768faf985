use super::{size_from_row, size_to_row};
use crate::error::Error;

/// A regular file found under the pool directory.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PoolEntry {
    /// Path relative to the pool root, always starting with `pool/`.
    pub path: String,
    pub size: u64,
}
impl PoolEntry {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self { path: path.into(), size }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PoolRow {
    pub filename: String,
    pub size: i64,
}
impl TryFrom<PoolEntry> for PoolRow {
    type Error = Error;
    fn try_from(entry: PoolEntry) -> Result<Self, Self::Error> {
        Ok(Self { size: size_to_row(entry.size)?, filename: entry.path })
    }
}
impl TryFrom<PoolRow> for PoolEntry {
    type Error = Error;
    fn try_from(row: PoolRow) -> Result<Self, Self::Error> {
        Ok(Self { path: row.filename, size: size_from_row(row.size)? })
    }
}

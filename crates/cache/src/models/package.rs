use super::{size_from_row, size_to_row};
use crate::CatalogId;
use crate::error::Error;
use mirrorcheck_index::Entry;

/// A file referenced by a cached catalog.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageRecord {
    pub catalog: CatalogId,
    /// Path relative to the pool root, e.g. `pool/main/h/hello/hello_2.10-3_amd64.deb`.
    pub path: String,
    pub size: u64,
    pub hash: Option<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct PackageRow {
    pub catalog_id: i64,
    pub filename: String,
    pub size: i64,
    pub hash: Option<String>,
}
impl PackageRow {
    pub fn new(catalog: CatalogId, entry: Entry) -> Result<Self, Error> {
        Ok(Self {
            catalog_id: catalog.0,
            size: size_to_row(entry.size)?,
            filename: entry.path,
            hash: entry.hash,
        })
    }
}
impl TryFrom<PackageRow> for PackageRecord {
    type Error = Error;
    fn try_from(row: PackageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            catalog: CatalogId(row.catalog_id),
            path: row.filename,
            size: size_from_row(row.size)?,
            hash: row.hash,
        })
    }
}

use super::{size_from_row, size_to_row, timestamp_from_row, timestamp_to_row};
use crate::error::{Error, ErrorKind};
use exn::OptionExt;
use std::fmt;
use std::path::PathBuf;
use time::UtcDateTime;

/// Primary key of an ingested catalog.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CatalogId(pub(crate) i64);
impl CatalogId {
    pub fn get(self) -> i64 {
        self.0
    }
}
impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an index file looked like when it was parsed.
///
/// Two signatures are equal only if both the modification time (to the
/// nanosecond) and the size agree. Anything else means the file changed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Signature {
    pub modified: UtcDateTime,
    pub size: u64,
}
impl Signature {
    pub fn new(modified: impl Into<UtcDateTime>, size: u64) -> Self {
        Self { modified: modified.into(), size }
    }

    /// Read the signature of a file on disk.
    pub fn of(metadata: &std::fs::Metadata) -> std::io::Result<Self> {
        Ok(Self::new(metadata.modified()?, metadata.len()))
    }
}

/// A cached index file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Catalog {
    pub id: CatalogId,
    pub path: PathBuf,
    pub signature: Signature,
    /// Whether every record of the file made it into the cache. Only completed
    /// catalogs are ever returned by the repository.
    pub done: bool,
    /// Number of package records stored for this catalog.
    pub count: u64,
}
impl Catalog {
    /// A catalog is reusable when it completed and the file has not changed.
    pub fn is_current(&self, signature: &Signature) -> bool {
        self.done && self.signature == *signature
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CatalogRow {
    pub catalog_id: i64,
    pub filename: String,
    pub timestamp: i64,
    pub size: i64,
    pub done: bool,
    pub count: Option<i64>,
}
impl TryFrom<CatalogRow> for Catalog {
    type Error = Error;
    fn try_from(row: CatalogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CatalogId(row.catalog_id),
            path: PathBuf::from(row.filename),
            signature: Signature {
                modified: timestamp_from_row(row.timestamp)?,
                size: size_from_row(row.size)?,
            },
            done: row.done,
            count: row.count.map(size_from_row).transpose()?.unwrap_or_default(),
        })
    }
}

/// Column values for a new catalog row, before the database assigns its id.
pub(crate) struct NewCatalogRow {
    pub filename: String,
    pub timestamp: i64,
    pub size: i64,
}
impl NewCatalogRow {
    pub fn new(path: &std::path::Path, signature: &Signature) -> Result<Self, Error> {
        Ok(Self {
            filename: path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            timestamp: timestamp_to_row(signature.modified)?,
            size: size_to_row(signature.size)?,
        })
    }
}

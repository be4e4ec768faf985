mod catalog;
mod package;
mod pool;

pub(crate) use self::catalog::{CatalogRow, NewCatalogRow};
pub use self::catalog::{Catalog, CatalogId, Signature};
pub(crate) use self::package::PackageRow;
pub use self::package::PackageRecord;
pub(crate) use self::pool::PoolRow;
pub use self::pool::PoolEntry;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;

/// Aggregate counts over a set of catalogs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Totals {
    /// Package records summed over every catalog.
    pub files: u64,
    /// Distinct checksums among those records.
    pub unique: u64,
}

pub(crate) fn size_to_row(size: u64) -> Result<i64> {
    i64::try_from(size).or_raise(|| ErrorKind::InvalidData("size"))
}

pub(crate) fn size_from_row(size: i64) -> Result<u64> {
    u64::try_from(size).or_raise(|| ErrorKind::InvalidData("size"))
}

pub(crate) fn timestamp_to_row(at: UtcDateTime) -> Result<i64> {
    i64::try_from(at.unix_timestamp_nanos()).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

pub(crate) fn timestamp_from_row(nanos: i64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos(i128::from(nanos)).or_raise(|| ErrorKind::InvalidData("timestamp"))
}

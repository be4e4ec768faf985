//! The pool marker file (`pools.json`).
//!
//! The marker maps each pool root to the time its contents were last known to
//! change, as Unix seconds. A cached pool scan is trusted only if it is at
//! least as recent as the marker. Tools that update the pool (a sync job, for
//! instance) bump the pool's entry to force the next run to rescan; if the
//! entry is absent, the first scan records one.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use time::UtcDateTime;

/// File name of the marker inside the working directory.
pub const MARKER_FILE: &str = "pools.json";

type Entries = BTreeMap<String, f64>;

/// Handle on a `pools.json` file.
#[derive(Clone, Debug)]
pub struct PoolMarker {
    file: PathBuf,
}

impl PoolMarker {
    pub fn new(work_dir: impl AsRef<Path>) -> Self {
        Self { file: work_dir.as_ref().join(MARKER_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    fn key(pool: &Path) -> String {
        pool.to_string_lossy().into_owned()
    }

    fn read(&self) -> Result<Entries> {
        match std::fs::read(&self.file) {
            Ok(bytes) => serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Marker(self.file.clone())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e).or_raise(|| ErrorKind::Marker(self.file.clone())),
        }
    }

    fn write(&self, entries: &Entries) -> Result<()> {
        let bytes = serde_json::to_vec(entries).or_raise(|| ErrorKind::Marker(self.file.clone()))?;
        let partial = self.file.with_extension("json.partial");
        std::fs::write(&partial, bytes).or_raise(|| ErrorKind::Marker(partial.clone()))?;
        std::fs::rename(&partial, &self.file).or_raise(|| ErrorKind::Marker(self.file.clone()))
    }

    /// The stored marker for a pool; zero counts as unset, both when reading
    /// and when recording, so a zeroed entry forces a rescan that stamps it.
    fn stored(entries: &Entries, pool: &Path) -> Result<Option<UtcDateTime>> {
        match entries.get(&Self::key(pool)) {
            Some(&secs) if secs != 0.0 => Ok(Some(from_seconds(secs)?)),
            _ => Ok(None),
        }
    }

    /// The marker time for a pool, or `now` if none has been recorded.
    pub fn get(&self, pool: &Path, now: UtcDateTime) -> Result<UtcDateTime> {
        Ok(Self::stored(&self.read()?, pool)?.unwrap_or(now))
    }

    /// The marker time for a pool, recording `now` first if none exists.
    pub fn ensure(&self, pool: &Path, now: UtcDateTime) -> Result<UtcDateTime> {
        let mut entries = self.read()?;
        if let Some(stored) = Self::stored(&entries, pool)? {
            return Ok(stored);
        }
        let secs = to_seconds(now);
        entries.insert(Self::key(pool), secs);
        self.write(&entries)?;
        tracing::debug!(pool = %pool.display(), secs, "recorded pool marker");
        // Hand back the value as it will be read next time.
        from_seconds(secs)
    }
}

fn to_seconds(at: UtcDateTime) -> f64 {
    at.unix_timestamp_nanos() as f64 / 1e9
}

fn from_seconds(secs: f64) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp_nanos((secs * 1e9) as i128).or_raise(|| ErrorKind::Marker(PathBuf::from(MARKER_FILE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::utc_datetime;

    const NOW: UtcDateTime = utc_datetime!(2026-03-01 12:00);
    const LATER: UtcDateTime = utc_datetime!(2026-03-02 12:00);

    #[test]
    fn test_unset_marker_defaults_to_now_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = PoolMarker::new(dir.path());
        assert_eq!(marker.get(Path::new("/srv/debian"), NOW).unwrap(), NOW);
        assert!(!marker.path().exists());
    }

    #[test]
    fn test_ensure_persists_once() {
        let dir = tempfile::tempdir().unwrap();
        let marker = PoolMarker::new(dir.path());
        let pool = Path::new("/srv/debian");
        let first = marker.ensure(pool, NOW).unwrap();
        assert_eq!(first, NOW);
        assert_eq!(marker.ensure(pool, LATER).unwrap(), NOW);
        assert_eq!(marker.get(pool, LATER).unwrap(), NOW);
        // Other pools are independent.
        assert_eq!(marker.get(Path::new("/srv/ubuntu"), LATER).unwrap(), LATER);
    }

    #[test]
    fn test_zero_is_unset() {
        let dir = tempfile::tempdir().unwrap();
        let marker = PoolMarker::new(dir.path());
        std::fs::write(marker.path(), br#"{"/srv/debian": 0}"#).unwrap();
        let pool = Path::new("/srv/debian");
        assert_eq!(marker.get(pool, NOW).unwrap(), NOW);
        assert_eq!(marker.ensure(pool, NOW).unwrap(), NOW);
        assert_eq!(marker.get(pool, LATER).unwrap(), NOW);
    }

    #[test]
    fn test_reads_fractional_seconds_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        let marker = PoolMarker::new(dir.path());
        std::fs::write(marker.path(), br#"{"debian": 1772366400.5, "other": 1}"#).unwrap();
        let at = marker.get(Path::new("debian"), LATER).unwrap();
        assert_eq!(at, utc_datetime!(2026-03-01 12:00:00.5));
    }

    #[test]
    fn test_corrupt_marker_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let marker = PoolMarker::new(dir.path());
        std::fs::write(marker.path(), b"not json").unwrap();
        let err = marker.get(Path::new("debian"), NOW).unwrap_err();
        assert!(matches!(*err, ErrorKind::Marker(_)));
    }
}

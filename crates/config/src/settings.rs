use crate::error::{ErrorKind, Result};
use crate::{CatalogScope, Config, Jobs, Mirror};
use exn::ResultExt;
use mirrorcheck_compress::Compression;
use mirrorcheck_index::ArchitectureFilter;
use std::path::{Component, Path, PathBuf};

/// Validated configuration for a single run.
#[derive(Clone, Debug)]
pub struct Settings {
    pub dists: Vec<String>,
    pub dist_files: Vec<PathBuf>,
    /// Normalized pool root; the directory that contains `pool/`.
    pub pool: PathBuf,
    pub mirror: Mirror,
    pub jobs: Jobs,
    pub work_dir: PathBuf,
    pub scan_pool: bool,
    pub catalogs: CatalogScope,
    pub architectures: ArchitectureFilter,
    pub index_formats: Vec<Compression>,
}

impl Config {
    /// Check the configuration and resolve it into [`Settings`].
    ///
    /// Fails if the pool root is not an existing directory, the mirror URL is
    /// unusable, the job count is out of range, or an index format is unknown.
    pub fn validate(self) -> Result<Settings> {
        if !self.pool.is_dir() {
            exn::bail!(ErrorKind::PoolNotDirectory(self.pool));
        }
        let pool = normalize_pool(&self.pool);
        tracing::debug!(pool = %pool.display(), "pool root");
        let mirror = Mirror::parse(&self.mirror)?;
        let jobs = Jobs::try_from(self.jobs)?;
        let index_formats = self
            .index_formats
            .iter()
            .map(|f| f.parse::<Compression>().or_raise(|| ErrorKind::IndexFormat(f.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Settings {
            dists: self.dists,
            dist_files: self.dist_files,
            pool,
            mirror,
            jobs,
            work_dir: self.work_dir,
            scan_pool: self.scan_pool,
            catalogs: self.catalogs,
            architectures: ArchitectureFilter::new(self.exclude_architectures),
            index_formats,
        })
    }
}

/// Lexically normalize a pool path and strip a trailing `pool` component, so
/// that both `/srv/debian` and `/srv/debian/pool/` mean the pool root
/// `/srv/debian`.
fn normalize_pool(path: &Path) -> PathBuf {
    let normal: PathBuf = path.components().filter(|c| !matches!(c, Component::CurDir)).collect();
    let normal = if normal.as_os_str().is_empty() { PathBuf::from(".") } else { normal };
    if normal.file_name().is_some_and(|name| name == "pool") {
        match normal.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    } else {
        normal
    }
}

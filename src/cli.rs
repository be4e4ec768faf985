//! Command-line arguments.

use clap::Parser;
use mirrorcheck_config::{CatalogScope, Overrides};
use std::path::PathBuf;

/// Find the files a package mirror pool is missing or holds in excess, and
/// write the scripts that fix it.
#[derive(Parser, Debug)]
#[command(name = "mirrorcheck", version, about)]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Dist root to search for index files; glob patterns are expanded
    #[arg(short, long = "dists", value_name = "PATH", num_args = 1..)]
    pub dists: Vec<String>,

    /// Index file to read, named explicitly
    #[arg(short = 'f', long = "dists-file", value_name = "FILE", num_args = 1..)]
    pub dist_files: Vec<PathBuf>,

    /// Pool root, the directory containing pool/
    #[arg(short, long, value_name = "PATH")]
    pub pool: Option<PathBuf>,

    /// Base URL of the upstream mirror
    #[arg(short, long, value_name = "URL")]
    pub mirror: Option<String>,

    /// Number of parallel download jobs (1-20)
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<u32>,

    /// Working directory for the cache and every output file
    #[arg(short = 't', long = "tmp-dir", visible_alias = "work-dir", value_name = "PATH")]
    pub work_dir: Option<PathBuf>,

    /// Scan the pool and search for files in excess
    #[arg(short, long = "scan")]
    pub scan_pool: bool,

    /// Reconcile against every cached catalog, not only this run's
    #[arg(long = "all-catalogs", visible_alias = "dists-db")]
    pub all_catalogs: bool,
}

impl Args {
    /// Default log level when `RUST_LOG` is not set.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// The flags that were given, as the top configuration layer.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            dists: self.dists.clone(),
            dist_files: self.dist_files.clone(),
            pool: self.pool.clone(),
            mirror: self.mirror.clone(),
            jobs: self.jobs,
            work_dir: self.work_dir.clone(),
            scan_pool: self.scan_pool.then_some(true),
            catalogs: self.all_catalogs.then_some(CatalogScope::All),
        }
    }
}

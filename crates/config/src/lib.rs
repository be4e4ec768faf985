//! Layered configuration for mirrorcheck.
//!
//! Sources are merged lowest to highest priority:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `config.toml` in the platform configuration directory
//! 3. An explicit configuration file (TOML, YAML or JSON, by extension)
//! 4. Environment variables prefixed `MIRRORCHECK_` (e.g. `MIRRORCHECK_JOBS=4`)
//! 5. Command-line flags ([`Overrides`])
//!
//! The merged [`Config`] is raw user input. [`Config::validate`] checks it and
//! produces the [`Settings`] the rest of the program runs on.

pub mod error;
mod jobs;
mod mirror;
mod settings;

pub use crate::jobs::Jobs;
pub use crate::mirror::Mirror;
pub use crate::settings::Settings;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use mirrorcheck_index::EXCLUDED_ARCHITECTURES;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read into the configuration.
pub const ENV_PREFIX: &str = "MIRRORCHECK_";

/// Which catalogs reconciliation runs against.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogScope {
    /// Only catalogs ingested (or confirmed unchanged) during this run.
    #[default]
    Run,
    /// Every catalog in the cache, including ones from earlier runs.
    All,
}

/// Raw configuration, as merged from every source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dist roots to search for index files. Glob patterns are expanded.
    pub dists: Vec<String>,
    /// Index files named explicitly.
    pub dist_files: Vec<PathBuf>,
    /// Pool root: the directory containing `pool/`. A path ending in `pool`
    /// is accepted and normalized to its parent.
    pub pool: PathBuf,
    /// Base URL of the upstream mirror.
    pub mirror: String,
    /// Number of parallel download jobs to plan.
    pub jobs: u32,
    /// Where the cache database, the pool marker and every output file live.
    pub work_dir: PathBuf,
    /// Scan the pool directory (or reuse a previous scan) and search for
    /// excess files.
    pub scan_pool: bool,
    pub catalogs: CatalogScope,
    /// Architecture name fragments whose indexes are never ingested.
    pub exclude_architectures: Vec<String>,
    /// Compression formats accepted for index files.
    pub index_formats: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dists: Vec::new(),
            dist_files: Vec::new(),
            pool: PathBuf::from("debian"),
            mirror: "http://ftp.fr.debian.org/debian/".to_string(),
            jobs: Jobs::MIN,
            work_dir: PathBuf::from(".tmp"),
            scan_pool: false,
            catalogs: CatalogScope::Run,
            exclude_architectures: EXCLUDED_ARCHITECTURES.iter().map(ToString::to_string).collect(),
            index_formats: vec!["none".to_string(), "gzip".to_string()],
        }
    }
}

/// Values given on the command line. Unset fields leave lower layers alone.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dists: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dist_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_pool: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalogs: Option<CatalogScope>,
}

impl Config {
    /// Location of the per-user configuration file, if the platform has one.
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mirrorcheck").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Merge every configuration source and deserialize the result.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::figment(Self::user_config_path().as_deref(), file, overrides)?
            .extract()
            .or_raise(|| ErrorKind::Load)
    }

    fn figment(user: Option<&Path>, file: Option<&Path>, overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(user) = user {
            tracing::debug!(path = %user.display(), "reading user configuration");
            figment = figment.merge(Toml::file(user));
        }
        if let Some(file) = file {
            if !file.is_file() {
                exn::bail!(ErrorKind::FileNotFound(file.to_path_buf()));
            }
            let ext = file.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
            figment = match ext.as_deref() {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)).merge(Serialized::defaults(overrides)))
    }
}

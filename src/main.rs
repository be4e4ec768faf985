mod cli;
mod error;

use crate::cli::Args;
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use mirrorcheck_cache::{CatalogId, Database, Repository};
use mirrorcheck_config::{CatalogScope, Config, Settings};
use mirrorcheck_engine::discover::{expand_pattern, resolve_dist_root};
use mirrorcheck_engine::reconcile::{write_excess, write_missing};
use mirrorcheck_engine::{CatalogBuilder, Planner, PoolMarker, PoolScanner, PoolSource, find_excess, find_missing};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use time::UtcDateTime;
use tracing_subscriber::EnvFilter;

/// Cache database, in the working directory.
const DATABASE_FILE: &str = "mirror.db";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    tracing::debug!(?args, "arguments parsed");

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(args: &Args) -> Result<()> {
    let settings = Config::load(args.config.as_deref(), &args.overrides())
        .or_raise(|| ErrorKind::Config)?
        .validate()
        .or_raise(|| ErrorKind::Config)?;

    let work_dir = std::path::absolute(&settings.work_dir).or_raise(|| ErrorKind::WorkDir(settings.work_dir.clone()))?;
    std::fs::create_dir_all(&work_dir).or_raise(|| ErrorKind::WorkDir(work_dir.clone()))?;
    let invocation_dir = std::env::current_dir().or_raise(|| ErrorKind::WorkDir(PathBuf::from(".")))?;
    tracing::info!(work_dir = %work_dir.display(), "working directory");

    let db = Database::connect(work_dir.join(DATABASE_FILE)).await.or_raise(|| ErrorKind::Cache)?;
    let result = reconcile(&settings, &db, &work_dir, &invocation_dir).await;
    db.close().await;
    result
}

async fn reconcile(settings: &Settings, db: &Database, work_dir: &Path, invocation_dir: &Path) -> Result<()> {
    let repo = Repository::from(db);
    let active = ingest(settings, &repo).await?;

    let totals = repo.totals(&active).await.or_raise(|| ErrorKind::Run)?;
    println!("Total: {} file(s), {} unique", totals.files, totals.unique);

    let marker = PoolMarker::new(work_dir);
    let (pool, source) = PoolScanner::new(&repo, &marker)
        .open(&settings.pool, settings.scan_pool, UtcDateTime::now())
        .await
        .or_raise(|| ErrorKind::Run)?;
    match source {
        PoolSource::Cache => println!("Loading pool {}", settings.pool.display()),
        PoolSource::Scan => println!("Scanning pool…"),
        PoolSource::Live => {},
    }
    if let Some(count) = pool.len() {
        println!("Pool: {count} file(s) listed");
    }

    println!("Searching for missing files…");
    let missing = find_missing(&repo, &active, &pool).await.or_raise(|| ErrorKind::Run)?;
    if missing.paths.is_empty() {
        println!("All files listed are present");
    } else {
        println!("Missing: {} file(s) from listed in:", missing.paths.len());
        for catalog in &missing.catalogs {
            println!("  {}", catalog.path.display());
        }
    }
    let file = write_missing(work_dir, &missing).or_raise(|| ErrorKind::Run)?;
    tracing::info!(file = %file.display(), "missing list written");

    let excess = find_excess(&repo, &pool).await.or_raise(|| ErrorKind::Run)?;
    match &excess {
        None => println!("Files in excess not searched"),
        Some(excess) if excess.entries.is_empty() => println!("No file in excess"),
        Some(excess) => println!("Excess: {} file(s) for {} byte(s)", excess.entries.len(), excess.bytes),
    }
    write_excess(work_dir, excess.as_ref()).or_raise(|| ErrorKind::Run)?;

    let planner = Planner {
        work_dir,
        pool: &settings.pool,
        mirror: &settings.mirror,
        jobs: settings.jobs,
        invocation_dir,
    };
    if missing.paths.is_empty() {
        tracing::info!("no url to download");
    }
    let (script, jobs) = planner.write_download(&missing.paths).or_raise(|| ErrorKind::Run)?;
    tracing::debug!(jobs = jobs.len(), "download jobs planned");
    println!("Writing download commands into {}", script.display());
    let script = planner.write_clean().or_raise(|| ErrorKind::Run)?;
    println!("Writing cleaning commands into {}", script.display());
    Ok(())
}

/// Bring every configured index file into the cache and return the catalogs
/// to reconcile against.
async fn ingest(settings: &Settings, repo: &Repository) -> Result<Vec<CatalogId>> {
    let mut builder = CatalogBuilder::new(repo, &settings.architectures, &settings.index_formats);
    for pattern in &settings.dists {
        tracing::info!(pattern, "dist root");
        for path in expand_pattern(pattern).or_raise(|| ErrorKind::Run)? {
            let Some(root) = resolve_dist_root(&path, &settings.architectures) else {
                continue;
            };
            println!("Finding files from {}", root.display());
            builder.ingest_tree(&root).await.or_raise(|| ErrorKind::Run)?;
        }
    }
    for file in &settings.dist_files {
        if !file.is_file() {
            tracing::info!(path = %file.display(), "not an existing file");
            continue;
        }
        builder.ingest_file(file).await.or_raise(|| ErrorKind::Run)?;
    }
    let stats = builder.stats();
    tracing::info!(
        cached = stats.cached,
        parsed = stats.parsed,
        skipped = stats.skipped,
        records = stats.records,
        "catalogs ingested"
    );

    match settings.catalogs {
        CatalogScope::Run => Ok(builder.active()),
        CatalogScope::All => {
            let ids = repo.list_catalog_ids().await.or_raise(|| ErrorKind::Run)?;
            tracing::debug!(?ids, "reconciling against every cached catalog");
            Ok(ids)
        },
    }
}

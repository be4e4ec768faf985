//! A full run over a temporary mirror: ingest, scan, reconcile, plan.

use mirrorcheck_cache::{Database, Repository};
use mirrorcheck_compress::Compression;
use mirrorcheck_config::{Jobs, Mirror};
use mirrorcheck_engine::discover::{expand_pattern, resolve_dist_root};
use mirrorcheck_engine::{
    CatalogBuilder, IngestStats, Planner, PoolMarker, PoolScanner, PoolSource, find_excess, find_missing, reconcile,
};
use mirrorcheck_index::ArchitectureFilter;
use std::fs;
use std::path::Path;
use time::macros::utc_datetime;

const PACKAGES: &str = "\
Package: hello
Version: 2.10-3
Filename: pool/main/h/hello/hello_2.10-3_amd64.deb
Size: 10
MD5sum: 11111111111111111111111111111111

Package: world
Filename: pool/main/w/world/world_1.0_amd64.deb
Size: 20
MD5sum: 22222222222222222222222222222222

Package: broken
Size: 30
";

const SOURCES: &str = "\
Package: hello
Directory: pool/main/h/hello
Files:
 33333333333333333333333333333333 7 hello_2.10-3.dsc
Checksums-Sha256:
 4444444444444444444444444444444444444444444444444444444444444444 7 hello_2.10-3.dsc
 5555555555555555555555555555555555555555555555555555555555555555 40 hello_2.10.orig.tar.gz
";

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn mirror(root: &Path) {
    let dists = root.join("dists/trixie/main");
    write(&dists.join("binary-amd64/Packages.gz"), &Compression::Gzip.compress(PACKAGES.as_bytes()).unwrap());
    write(&dists.join("binary-armhf/Packages"), b"Filename: pool/main/a/arm/arm.deb\nSize: 1\n");
    write(&dists.join("source/Sources"), SOURCES.as_bytes());
    write(&root.join("dists/trixie/Release"), b"Origin: Debian\n");

    write(&root.join("pool/main/h/hello/hello_2.10-3_amd64.deb"), &[0; 10]);
    // Present but truncated.
    write(&root.join("pool/main/h/hello/hello_2.10.orig.tar.gz"), &[0; 39]);
    write(&root.join("pool/main/h/hello/hello_2.10-3.dsc"), &[0; 7]);
    // Referenced by nothing.
    write(&root.join("pool/main/o/old/old_0.1_amd64.deb"), &[0; 100]);
}

#[tokio::test]
async fn test_full_run() {
    let mirror_dir = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let root = mirror_dir.path();
    mirror(root);

    let db = Database::connect(work.path().join("mirror.db")).await.unwrap();
    let repo = Repository::from(&db);
    let filter = ArchitectureFilter::default();
    let formats = [Compression::None, Compression::Gzip];

    // Ingest, giving the mirror root rather than its dists directory.
    let mut builder = CatalogBuilder::new(&repo, &filter, &formats);
    for path in expand_pattern(root.to_str().unwrap()).unwrap() {
        let dists = resolve_dist_root(&path, &filter).unwrap();
        assert!(dists.ends_with("dists"));
        builder.ingest_tree(&dists).await.unwrap();
    }
    assert_eq!(builder.stats(), IngestStats { cached: 0, parsed: 2, skipped: 2, records: 4 });
    let active = builder.active();
    let totals = repo.totals(&active).await.unwrap();
    assert_eq!((totals.files, totals.unique), (4, 4));

    // Scan and reconcile.
    let marker = PoolMarker::new(work.path());
    let scanner = PoolScanner::new(&repo, &marker);
    let (pool, source) = scanner.open(root, true, utc_datetime!(2026-03-01 00:00)).await.unwrap();
    assert_eq!(source, PoolSource::Scan);
    assert_eq!(pool.len(), Some(4));

    let missing = find_missing(&repo, &active, &pool).await.unwrap();
    assert_eq!(
        missing.paths,
        vec!["pool/main/h/hello/hello_2.10.orig.tar.gz".to_string(), "pool/main/w/world/world_1.0_amd64.deb".to_string()]
    );
    let responsible: Vec<String> =
        missing.catalogs.iter().map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(responsible, vec!["Packages.gz", "Sources"]);

    let excess = find_excess(&repo, &pool).await.unwrap().unwrap();
    assert_eq!(excess.entries.len(), 1);
    assert_eq!(excess.entries[0].path, "pool/main/o/old/old_0.1_amd64.deb");
    assert_eq!(excess.bytes, 100);

    reconcile::write_missing(work.path(), &missing).unwrap();
    reconcile::write_excess(work.path(), Some(&excess)).unwrap();

    // Plan.
    let mirror = Mirror::parse("http://deb.example/debian/").unwrap();
    let planner = Planner {
        work_dir: work.path(),
        pool: root,
        mirror: &mirror,
        jobs: Jobs::try_from(4).unwrap(),
        invocation_dir: work.path(),
    };
    let (script, jobs) = planner.write_download(&missing.paths).unwrap();
    assert_eq!(jobs.len(), 2);
    let script = fs::read_to_string(script).unwrap();
    assert_eq!(script.matches(" &\n").count(), 2);
    assert!(script.contains("--cut-dirs=1"));
    assert_eq!(
        fs::read_to_string(&jobs[1].urls).unwrap(),
        "http://deb.example/debian/pool/main/w/world/world_1.0_amd64.deb\n"
    );
    planner.write_clean().unwrap();
    assert_eq!(fs::read_to_string(work.path().join("excess")).unwrap(), "pool/main/o/old/old_0.1_amd64.deb\n");

    // A second run changes nothing and parses nothing.
    let mut again = CatalogBuilder::new(&repo, &filter, &formats);
    again.ingest_tree(&root.join("dists")).await.unwrap();
    assert_eq!(again.stats(), IngestStats { cached: 2, parsed: 0, skipped: 2, records: 0 });
    assert_eq!(again.active(), active);
    let (_, source) = scanner.open(root, true, utc_datetime!(2026-03-02 00:00)).await.unwrap();
    assert_eq!(source, PoolSource::Cache);
    db.close().await;
}

//! Download and cleanup plans.
//!
//! Missing paths are split into balanced, contiguous chunks, one per job.
//! Each job gets a URL list (`url.<k>`) and one line in `wget_cmd.sh`, which
//! starts every job in the background and waits for all of them. Excess files
//! get `clean.sh`, which deletes them from the pool root.

use crate::error::{ErrorKind, Result};
use crate::reconcile::EXCESS_FILE;
use exn::ResultExt;
use mirrorcheck_config::{Jobs, Mirror};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DOWNLOAD_SCRIPT: &str = "wget_cmd.sh";
pub const CLEAN_SCRIPT: &str = "clean.sh";

/// Split `items` into at most `jobs` contiguous chunks whose sizes differ by
/// at most one, larger chunks first. Empty chunks are omitted. Jobs are not
/// filled to `ceil(len / jobs)` leaving a short last one: 5 items over 4 jobs
/// give 2, 1, 1, 1 rather than 2, 2, 1.
///
/// ```
/// use mirrorcheck_config::Jobs;
/// use mirrorcheck_engine::plan::partition;
///
/// let items: Vec<u32> = (0..25).collect();
/// let sizes: Vec<usize> = partition(&items, Jobs::try_from(4).unwrap()).iter().map(|c| c.len()).collect();
/// assert_eq!(sizes, [7, 6, 6, 6]);
/// ```
pub fn partition<T>(items: &[T], jobs: Jobs) -> Vec<&[T]> {
    let jobs = jobs.get();
    let (base, extra) = (items.len() / jobs, items.len() % jobs);
    let mut chunks = Vec::with_capacity(jobs);
    let mut rest = items;
    for k in 0..jobs {
        let len = base + usize::from(k < extra);
        if len == 0 {
            break;
        }
        let (chunk, tail) = rest.split_at(len);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

/// One planned download job.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    /// 1-based.
    pub number: usize,
    pub urls: PathBuf,
    pub log: PathBuf,
    pub count: usize,
}

/// Everything needed to write the scripts of a run.
pub struct Planner<'a> {
    /// Where scripts and job files are written. Should be absolute, since the
    /// scripts refer to it after changing directory.
    pub work_dir: &'a Path,
    /// Pool root, as passed to the downloader.
    pub pool: &'a Path,
    pub mirror: &'a Mirror,
    pub jobs: Jobs,
    /// Directory the scripts change into before doing anything.
    pub invocation_dir: &'a Path,
}

impl Planner<'_> {
    fn header(&self, out: &mut impl Write, root: bool) -> std::io::Result<()> {
        writeln!(out, "#! /bin/bash")?;
        if root {
            writeln!(out, "#root {}", self.pool.display())?;
        }
        writeln!(out)?;
        writeln!(out, "cd {}", shell_word(self.invocation_dir))?;
        writeln!(out)
    }

    /// Write `url.<k>` for each job and the download script launching them.
    pub fn write_download(&self, missing: &[String]) -> Result<(PathBuf, Vec<Job>)> {
        let script = self.work_dir.join(DOWNLOAD_SCRIPT);
        let cut = self.mirror.cut_dirs();
        tracing::debug!(mirror = %self.mirror, cut, jobs = %self.jobs, "planning downloads");
        let mut out = create(&script)?;
        self.header(&mut out, true).or_raise(|| ErrorKind::Output(script.clone()))?;

        let mut jobs = Vec::new();
        for (k, chunk) in partition(missing, self.jobs).into_iter().enumerate() {
            let number = k + 1;
            let urls = self.work_dir.join(format!("url.{number}"));
            let log = self.work_dir.join(format!("log.{number}"));
            tracing::debug!(job = number, count = chunk.len(), "writing url file");
            let mut list = create(&urls)?;
            for path in chunk {
                writeln!(list, "{}", self.mirror.join(path)).or_raise(|| ErrorKind::Output(urls.clone()))?;
            }
            list.flush().or_raise(|| ErrorKind::Output(urls.clone()))?;
            writeln!(
                out,
                "wget -nv -x -nH -P {} --cut-dirs={cut} -i {} -o {} &",
                shell_word(self.pool),
                shell_word(&urls),
                shell_word(&log),
            )
            .or_raise(|| ErrorKind::Output(script.clone()))?;
            jobs.push(Job { number, urls, log, count: chunk.len() });
        }
        writeln!(out, "wait").or_raise(|| ErrorKind::Output(script.clone()))?;
        out.flush().or_raise(|| ErrorKind::Output(script.clone()))?;
        drop(out);
        make_executable(&script)?;
        Ok((script, jobs))
    }

    /// Write the script deleting every file listed in `excess` from the pool.
    pub fn write_clean(&self) -> Result<PathBuf> {
        let script = self.work_dir.join(CLEAN_SCRIPT);
        let excess = self.work_dir.join(EXCESS_FILE);
        let pool = shell_word(self.pool);
        let mut out = create(&script)?;
        (|| -> std::io::Result<()> {
            self.header(&mut out, false)?;
            writeln!(out, "cat {} | (cd {pool} ; xargs rm -f)", shell_word(&excess))?;
            writeln!(out)?;
            writeln!(out, "# find {pool} -type d -empty -exec rmdir {{}} \\;")?;
            out.flush()
        })()
        .or_raise(|| ErrorKind::Output(script.clone()))?;
        drop(out);
        make_executable(&script)?;
        Ok(script)
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path).or_raise(|| ErrorKind::Output(path.to_path_buf()))?))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).or_raise(|| ErrorKind::Output(path.to_path_buf()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Quote a path for the shell, leaving plain ones untouched.
fn shell_word(path: &Path) -> String {
    let text = path.to_string_lossy();
    let plain = !text.is_empty()
        && text.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ',' | ':' | '@' | '%'));
    if plain { text.into_owned() } else { format!("'{}'", text.replace('\'', r"'\''")) }
}

//! Filesystem utilities.
//!
//! The async operations here run on an [`FsExecutor`] so that preparing a
//! port never blocks the scheduler on disk I/O. Relocations are expressed
//! relative to an explicit root (`whence`), and every path is checked to lie
//! beneath that root before anything is touched.
//!
//! Batches are not transactional: if the third file of a move fails, the
//! first two stay moved.

use std::borrow::Cow;
use std::fs::{self, File, FileTimes};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use glob::glob;
use tempfile::TempDir;

use crate::util::errors::{FsError, RelocateOp};
use crate::util::executor::FsExecutor;

/// Recursively delete a directory and everything under it.
pub async fn remove_tree(exec: &FsExecutor, path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    exec.run(move || {
        tracing::debug!("Remove tree [{}]", path.display());
        fs::remove_dir_all(&path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))
    })
    .await
}

/// Delete each listed file. Directories and missing paths are errors.
pub async fn remove_files(exec: &FsExecutor, files: Vec<PathBuf>) -> Result<()> {
    exec.run(move || -> Result<()> {
        for file in &files {
            let meta = match fs::symlink_metadata(file) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(FsError::NotFound { path: file.clone() }.into());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to stat: {}", file.display()))
                }
            };
            if meta.is_dir() {
                return Err(FsError::IsDirectory { path: file.clone() }.into());
            }

            tracing::debug!("Remove [{}]", file.display());
            fs::remove_file(file)
                .with_context(|| format!("failed to remove file: {}", file.display()))?;
        }
        Ok(())
    })
    .await
}

/// Move `files` into `into`, preserving each file's path relative to `whence`.
///
/// Directories in `files` only have their counterpart created; regular files
/// are renamed into place.
pub async fn move_files(
    exec: &FsExecutor,
    into: &Path,
    files: Vec<PathBuf>,
    whence: &Path,
) -> Result<()> {
    let into = into.to_path_buf();
    let whence = whence.to_path_buf();
    exec.run(move || relocate(RelocateOp::Move, &into, &files, &whence))
        .await
}

/// Copy `files` into `into`, preserving each file's path relative to `whence`.
///
/// Content, permissions and timestamps are copied; sources are left in place.
pub async fn copy_files(
    exec: &FsExecutor,
    into: &Path,
    files: Vec<PathBuf>,
    whence: &Path,
) -> Result<()> {
    let into = into.to_path_buf();
    let whence = whence.to_path_buf();
    exec.run(move || relocate(RelocateOp::Copy, &into, &files, &whence))
        .await
}

/// Rename a single file or directory.
pub async fn rename(exec: &FsExecutor, from: &Path, to: &Path) -> Result<()> {
    let from = from.to_path_buf();
    let to = to.to_path_buf();
    exec.run(move || {
        tracing::debug!("Rename [{}] \n  to [{}]", from.display(), to.display());
        fs::rename(&from, &to).with_context(|| {
            format!("failed to rename {} to {}", from.display(), to.display())
        })
    })
    .await
}

/// Rewrite each file in place through `transform`.
///
/// The new content goes to a fresh temporary file next to the original, which
/// is then renamed over it, so readers see either the old or the new content.
/// If the transform fails the original is untouched and the temporary file is
/// removed.
pub async fn filter_file_contents<F>(
    exec: &FsExecutor,
    files: Vec<PathBuf>,
    transform: F,
) -> Result<()>
where
    F: Fn(&mut dyn BufRead, &mut dyn Write) -> io::Result<()> + Send + 'static,
{
    exec.run(move || -> Result<()> {
        for input_path in &files {
            filter_one(input_path, &transform)?;
        }
        Ok(())
    })
    .await
}

fn filter_one<F>(input_path: &Path, transform: &F) -> Result<()>
where
    F: Fn(&mut dyn BufRead, &mut dyn Write) -> io::Result<()>,
{
    let dir = input_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let input = File::open(input_path)
        .with_context(|| format!("failed to open file: {}", input_path.display()))?;
    let mut reader = BufReader::new(input);

    let tmp = tempfile::Builder::new()
        .prefix(".sdist-filter-")
        .tempfile_in(dir)
        .with_context(|| format!("failed to create temporary file in {}", dir.display()))?;

    {
        let mut writer = BufWriter::new(tmp.as_file());
        transform(&mut reader, &mut writer)
            .with_context(|| format!("failed to filter {}", input_path.display()))?;
        writer
            .flush()
            .with_context(|| format!("failed to flush filtered {}", input_path.display()))?;
    }
    drop(reader);

    let tmp_path = tmp.path().to_path_buf();
    tmp.persist(input_path).map_err(|e| {
        anyhow::Error::new(e.error).context(format!(
            "failed to replace {} with {}",
            input_path.display(),
            tmp_path.display()
        ))
    })?;

    tracing::debug!("Filtered {} (via {})", input_path.display(), tmp_path.display());
    Ok(())
}

/// Build a stream transform from a per-line function.
///
/// Lines are passed with their trailing newline. Returning `None` drops the line.
pub fn map_lines<F>(f: F) -> impl Fn(&mut dyn BufRead, &mut dyn Write) -> io::Result<()> + Send + 'static
where
    F: for<'a> Fn(&'a str) -> Option<Cow<'a, str>> + Send + 'static,
{
    move |input: &mut dyn BufRead, output: &mut dyn Write| {
        let mut line = String::new();
        loop {
            line.clear();
            if input.read_line(&mut line)? == 0 {
                break;
            }
            if let Some(out) = f(&line) {
                output.write_all(out.as_bytes())?;
            }
        }
        Ok(())
    }
}

/// Remove every top-level entry of `root` whose name is not in `keep`.
pub async fn prune_root(exec: &FsExecutor, root: &Path, keep: &[&str]) -> Result<()> {
    let root = root.to_path_buf();
    let keep: Vec<String> = keep.iter().map(|s| s.to_string()).collect();
    exec.run(move || -> Result<()> {
        let entries = fs::read_dir(&root)
            .with_context(|| format!("failed to read directory: {}", root.display()))?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            if keep.iter().any(|k| name.to_str() == Some(k.as_str())) {
                continue;
            }

            let path = entry.path();
            tracing::debug!("Prune [{}]", path.display());
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
            .with_context(|| format!("failed to prune {}", path.display()))?;
        }
        Ok(())
    })
    .await
}

/// [`glob_paths`] on a worker.
pub async fn glob_files(exec: &FsExecutor, base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let (base, pattern) = (base.to_path_buf(), pattern.to_string());
    exec.run(move || glob_paths(&base, &pattern)).await
}

pub async fn exists(exec: &FsExecutor, path: &Path) -> bool {
    let path = path.to_path_buf();
    exec.run(move || path.exists()).await
}

/// [`ensure_dir`] on a worker.
pub async fn create_dir_all(exec: &FsExecutor, path: &Path) -> Result<()> {
    let path = path.to_path_buf();
    exec.run(move || ensure_dir(&path)).await
}

/// Create a scratch directory under the system temp dir, removed on drop.
pub async fn scratch_dir(exec: &FsExecutor, prefix: &str) -> Result<TempDir> {
    let prefix = prefix.to_string();
    exec.run(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir()
            .with_context(|| format!("failed to create {}* scratch directory", prefix))
    })
    .await
}

/// Expand a glob pattern relative to `base`. Matches directories and files.
pub fn glob_paths(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full_pattern = base.join(pattern);
    let pattern_str = full_pattern.to_string_lossy();

    let mut results = Vec::new();
    for entry in glob(&pattern_str).with_context(|| format!("invalid glob pattern: {}", pattern))? {
        match entry {
            Ok(path) => results.push(path),
            Err(e) => {
                tracing::warn!("glob error: {}", e);
            }
        }
    }

    results.sort();
    Ok(results)
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Compute `path` relative to `whence`, failing if it is not beneath it.
pub fn contained_relative_path(op: RelocateOp, path: &Path, whence: &Path) -> Result<PathBuf, FsError> {
    let containment = || FsError::Containment {
        op,
        path: path.to_path_buf(),
        whence: whence.to_path_buf(),
    };

    let relpath = pathdiff::diff_paths(path, whence).ok_or_else(containment)?;
    if relpath
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
    {
        return Err(containment());
    }
    Ok(relpath)
}

fn relocate(op: RelocateOp, into: &Path, files: &[PathBuf], whence: &Path) -> Result<()> {
    for src_path in files {
        let relpath = contained_relative_path(op, src_path, whence)?;
        let dest_path = into.join(&relpath);

        if src_path.is_dir() {
            ensure_dir(&dest_path)?;
            continue;
        }

        if let Some(parent) = dest_path.parent() {
            ensure_dir(parent)?;
        }

        match op {
            RelocateOp::Move => {
                tracing::debug!("Move [{}] \n  to [{}]", src_path.display(), dest_path.display());
                fs::rename(src_path, &dest_path).with_context(|| {
                    format!(
                        "failed to move {} into {}",
                        src_path.display(),
                        into.display()
                    )
                })?;
            }
            RelocateOp::Copy => {
                tracing::debug!("Copy [{}] \n  to [{}]", src_path.display(), dest_path.display());
                copy_with_times(src_path, &dest_path).with_context(|| {
                    format!(
                        "failed to copy {} into {}",
                        src_path.display(),
                        into.display()
                    )
                })?;
            }
        }
    }
    Ok(())
}

/// Copy content and permissions, then carry over access/modification times.
fn copy_with_times(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst)?;

    let meta = fs::metadata(src)?;
    let times = FileTimes::new()
        .set_accessed(meta.accessed()?)
        .set_modified(meta.modified()?);
    File::options().write(true).open(dst)?.set_times(times)
}

//! Archive source - zip releases downloaded over HTTP.
//!
//! The body is streamed to disk so peak memory does not depend on archive
//! size. Members are then pulled out by name.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tempfile::TempDir;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::util::errors::FetchError;
use crate::util::fs::{ensure_dir, scratch_dir};
use crate::util::hash::sha256_file;
use crate::util::FsExecutor;

/// A downloaded archive, removed together with its directory on drop.
#[derive(Debug)]
pub struct DownloadedArchive {
    _dir: TempDir,
    path: PathBuf,
    sha256: String,
}

impl DownloadedArchive {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hex SHA-256 of the archive as downloaded.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }
}

/// Download `url` into a fresh temporary directory.
///
/// A non-success status is an error. Response frames are gathered into
/// `chunk_size` buffers, and each full buffer is written by the executor.
pub async fn download(
    http: &reqwest::Client,
    exec: &FsExecutor,
    url: &str,
    chunk_size: usize,
) -> Result<DownloadedArchive> {
    let dir = scratch_dir(exec, "sdist-archive-").await?;
    download_into(http, exec, url, chunk_size, dir).await
}

async fn download_into(
    http: &reqwest::Client,
    exec: &FsExecutor,
    url: &str,
    chunk_size: usize,
    dir: TempDir,
) -> Result<DownloadedArchive> {
    let path = dir.path().join("archive.zip");

    tracing::info!("Downloading {}", url);

    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to download {}", url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status,
        }
        .into());
    }

    let create_path = path.clone();
    let mut out = exec
        .run(move || File::create(&create_path))
        .await
        .with_context(|| format!("failed to create {}", path.display()))?;

    let chunk_size = chunk_size.max(1);
    let mut pending = Vec::with_capacity(chunk_size);
    let mut body = response.bytes_stream();
    let mut total = 0usize;

    while let Some(frame) = body.next().await {
        let frame = frame.with_context(|| format!("failed to read response body from {}", url))?;
        total += frame.len();

        let mut rest = &frame[..];
        while !rest.is_empty() {
            let take = (chunk_size - pending.len()).min(rest.len());
            pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if pending.len() == chunk_size {
                let chunk = std::mem::replace(&mut pending, Vec::with_capacity(chunk_size));
                out = write_chunk(exec, out, chunk, &path).await?;
            }
        }
    }
    if !pending.is_empty() {
        out = write_chunk(exec, out, pending, &path).await?;
    }
    exec.run(move || drop(out)).await;

    let hash_path = path.clone();
    let sha256 = exec.run(move || sha256_file(&hash_path)).await?;
    tracing::info!("Downloaded {} ({} bytes, sha256 {})", url, total, sha256);

    Ok(DownloadedArchive {
        _dir: dir,
        path,
        sha256,
    })
}

async fn write_chunk(exec: &FsExecutor, mut out: File, chunk: Vec<u8>, path: &Path) -> Result<File> {
    exec.run(move || -> io::Result<File> {
        out.write_all(&chunk)?;
        Ok(out)
    })
    .await
    .with_context(|| format!("failed to write {}", path.display()))
}

/// Extract `top_dir/<member>` for each member into `dest_dir/<member>`,
/// with `prefix` written ahead of each member's content.
pub async fn extract_members(
    exec: &FsExecutor,
    archive: &Path,
    top_dir: &str,
    members: &[&str],
    dest_dir: &Path,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    let archive = archive.to_path_buf();
    let top_dir = top_dir.to_string();
    let members: Vec<String> = members.iter().map(|m| m.to_string()).collect();
    let dest_dir = dest_dir.to_path_buf();
    let prefix = prefix.to_string();

    exec.run(move || -> Result<Vec<PathBuf>> {
        let file = File::open(&archive)
            .with_context(|| format!("failed to open archive {}", archive.display()))?;
        let mut zip = ZipArchive::new(file)
            .with_context(|| format!("not a zip archive: {}", archive.display()))?;

        ensure_dir(&dest_dir)?;
        let mut written = Vec::with_capacity(members.len());
        for member in &members {
            let name = format!("{}/{}", top_dir, member);
            let mut entry = match zip.by_name(&name) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => {
                    return Err(FetchError::MissingMember {
                        archive: archive.clone(),
                        member: name,
                    }
                    .into());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to read {} from archive", name))
                }
            };

            let mut content = Vec::with_capacity(prefix.len() + entry.size() as usize);
            content.extend_from_slice(prefix.as_bytes());
            entry
                .read_to_end(&mut content)
                .with_context(|| format!("failed to read {} from archive", name))?;

            let dest = dest_dir.join(member);
            tracing::debug!("Extract [{}] \n  to [{}]", name, dest.display());
            std::fs::write(&dest, &content)
                .with_context(|| format!("failed to write file: {}", dest.display()))?;
            written.push(dest);
        }
        Ok(written)
    })
    .await
}
